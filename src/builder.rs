//! Build operations.
//!
//! # Operations
//!
//! | operation            | clean | force | generate | minify |
//! |----------------------|-------|-------|----------|--------|
//! | `prepare`            | yes   | yes   | yes      |        |
//! | `refresh_metadata`   |       | yes   |          |        |
//! | `generate(force)`    | yes   | arg   | yes      |        |
//! | `publish`            | yes   | yes   | yes      | yes    |
//!
//! Every operation assembles a fresh pipeline with a fresh
//! [`BuildContext`], so no parsed data survives from one build to the next.
//! `clean` only wipes the destination when `force` is set as well; an
//! incremental build keeps the output of unchanged files.

use crate::{
    config::{DeployOptions, SiteConfig},
    log,
    pipeline::{
        BuildContext, BuildFlags, Collaborators, FileSet, Pipeline, PropagateIncludes, ReadSource,
        assets::CopyAssets,
        changed::{DetectChanges, RecordSnapshot},
        data::{JsonToFiles, LoadMetadata},
        external::ExternalContent,
        include::ExpandIncludes,
        layout::EvalLayouts,
        metainfo::BuildMetainfo,
        minify::MinifyHtml,
        write::{CleanDestination, WriteDestination},
    },
};
use anyhow::Result;
use std::{fs, io::ErrorKind, path::Path, time::Instant};

/// Output entries that must not be published.
const INTERNAL_DATA_DIR: &str = "data";

pub struct SiteBuilder {
    config: SiteConfig,
    collaborators: Collaborators,
}

impl SiteBuilder {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            collaborators: Collaborators::default(),
        }
    }

    /// Plug rendering stages into the pipeline.
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Replace the configuration, e.g. after the config file changed.
    pub fn set_config(&mut self, config: SiteConfig) {
        self.config = config;
    }

    /// Clean full build including the metainfo index.
    pub fn prepare(&mut self) -> Result<FileSet> {
        self.build(&BuildFlags {
            clean: true,
            force: true,
            generate: true,
            ..Default::default()
        })
    }

    /// Recompute dependencies and the metainfo index without rendering.
    pub fn refresh_metadata(&mut self) -> Result<FileSet> {
        self.build(&BuildFlags {
            force: true,
            ..Default::default()
        })
    }

    /// Render the site. Without `force` only changed files are rendered.
    ///
    /// The destination is wiped only for a forced build. An incremental
    /// build keeps the output of unchanged files, which are no longer in the
    /// file set and would not be written again.
    pub fn generate(&mut self, force: bool) -> Result<FileSet> {
        log!("build"; "generate, force = {force}");
        self.build(&BuildFlags {
            clean: true,
            force,
            generate: true,
            ..Default::default()
        })
    }

    /// Minified production build.
    ///
    /// On success the metainfo index and the raw `data` directory are removed
    /// from the output. Removal failures are only logged. A failed build is
    /// returned as is, without cleanup.
    pub fn publish(&mut self, deploy: DeployOptions) -> Result<FileSet> {
        let files = self.build(&BuildFlags {
            clean: true,
            force: true,
            generate: true,
            minify: true,
            deploy: Some(deploy),
        })?;

        remove_internal_output(&self.config);
        Ok(files)
    }

    /// Run one build with the given gates.
    pub fn build(&mut self, flags: &BuildFlags) -> Result<FileSet> {
        let timer = Instant::now();
        let config = &self.config;
        let ctx = BuildContext::new(config, flags);
        let slots = &mut self.collaborators;

        if flags.generate && slots.layouts.is_some() {
            let engine = config.build.template_engine;
            log!("build"; "layouts: {engine:?} templates matching {}", engine.layout_pattern());
        }

        let pipeline = Pipeline::new()
            .stage_if(flags.clean && flags.force, CleanDestination)
            .stage(ReadSource)
            .stage(LoadMetadata)
            .stage_if(flags.generate, CopyAssets::theme(&ctx))
            .stage_if(flags.generate, CopyAssets::site(&ctx))
            .stage_if(flags.generate, CopyAssets::widgets(&ctx))
            .stage(PropagateIncludes)
            .stage(RecordSnapshot)
            .stage_if(!flags.force, DetectChanges)
            .slot_if(flags.generate, slots.markdown.as_deref_mut())
            .stage(ExpandIncludes)
            .stage(JsonToFiles)
            .stage(ExternalContent)
            .slot_if(true, slots.permalinks.as_deref_mut())
            .stage(EvalLayouts)
            .stage_if(flags.force, BuildMetainfo)
            .slot_if(flags.generate, slots.in_place.as_deref_mut())
            .slot_if(flags.generate, slots.layouts.as_deref_mut())
            .stage_if(flags.minify, MinifyHtml)
            .stage_if(flags.generate, WriteDestination);

        let mut files = FileSet::new();
        pipeline.run(&mut files, &ctx)?;

        log!(
            "build";
            "done in {}ms, {} files, {} data files parsed",
            timer.elapsed().as_millis(),
            files.len(),
            ctx.cache().len()
        );
        Ok(files)
    }
}

/// Remove the metainfo index and the `data` directory from the output.
fn remove_internal_output(config: &SiteConfig) {
    let targets = [
        config.metainfo_output(),
        config.build.output.join(INTERNAL_DATA_DIR),
    ];
    for target in targets {
        if let Err(err) = remove_path(&target) {
            log!("publish"; "unable to remove {}: {err}", target.display());
        }
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

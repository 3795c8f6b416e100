//! Build pipeline: ordered stages over one shared [`FileSet`].
//!
//! # Stage order
//!
//! ```text
//!  #  stage                         gate
//!  1  clean destination             clean && force
//!  2  read source tree
//!  3  load site metadata
//!  4  copy theme/site assets,       generate
//!     widgets
//!  5  propagate include times
//!     record freshness
//!  6  change detection              !force
//!  7  markdown*                     generate
//!  8  include expansion
//!  9  data-driven pages
//! 10  external content
//! 11  permalinks*
//! 12  evaluate layouts
//! 13  metainfo index                force
//! 14  in-place partials*, layouts*  generate
//! 15  minify                        minify
//! 16  write destination             generate
//!
//!  * collaborator slot, skipped when empty
//! ```
//!
//! Each stage runs to completion before the next starts. The first failing
//! stage aborts the build; nothing is rolled back.

pub mod assets;
pub mod cache;
pub mod changed;
pub mod data;
pub mod deps;
pub mod error;
pub mod external;
pub mod file;
pub mod include;
pub mod layout;
pub mod metainfo;
pub mod minify;
pub mod write;

pub use cache::DataCache;
pub use changed::Snapshot;
pub use error::DataError;
pub use file::{FileEntry, FileSet};

use crate::{config::DeployOptions, config::SiteConfig, log};
use anyhow::{Context, Result};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use serde_json::{Map, Value};
use std::{path::Path, time::Instant};

// ============================================================================
// Flags & Context
// ============================================================================

/// Stage gates of one build operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildFlags {
    /// Wipe the destination first. Only honoured together with `force`.
    pub clean: bool,
    /// Skip change detection and rebuild the metainfo index.
    pub force: bool,
    /// Render and write output.
    pub generate: bool,
    pub minify: bool,
    /// Publish options handed to layout collaborators.
    pub deploy: Option<DeployOptions>,
}

/// Everything a stage may read besides the file set.
///
/// Created fresh for every build, which also gives every build its own
/// [`DataCache`].
pub struct BuildContext<'a> {
    pub config: &'a SiteConfig,
    pub flags: &'a BuildFlags,
    cache: Mutex<DataCache>,
    site_metadata: RwLock<Map<String, Value>>,
    snapshot: Mutex<Option<Snapshot>>,
}

impl<'a> BuildContext<'a> {
    pub fn new(config: &'a SiteConfig, flags: &'a BuildFlags) -> Self {
        Self {
            config,
            flags,
            cache: Mutex::new(DataCache::new()),
            site_metadata: RwLock::new(Map::new()),
            snapshot: Mutex::new(None),
        }
    }

    /// Content source root.
    pub fn source(&self) -> &Path {
        &self.config.build.source
    }

    /// Output root.
    pub fn destination(&self) -> &Path {
        &self.config.build.output
    }

    pub fn deploy(&self) -> Option<&DeployOptions> {
        self.flags.deploy.as_ref()
    }

    pub fn cache(&self) -> MutexGuard<'_, DataCache> {
        self.cache.lock()
    }

    /// Site-wide metadata loaded from `[build.metadata]` files.
    pub fn site_metadata(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.site_metadata.read()
    }

    pub fn set_site_metadata(&self, name: &str, value: Value) {
        self.site_metadata.write().insert(name.to_owned(), value);
    }

    /// Freshness snapshot to persist once output is written.
    pub fn record_snapshot(&self, snapshot: Snapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    pub fn take_snapshot(&self) -> Option<Snapshot> {
        self.snapshot.lock().take()
    }
}

// ============================================================================
// Stage
// ============================================================================

/// One transformation over the file set.
pub trait Stage {
    fn name(&self) -> &str;

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()>;
}

impl<S: Stage + ?Sized> Stage for &mut S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        (**self).run(files, ctx)
    }
}

/// Stages provided by the embedding application.
///
/// Rendering is not done here: markdown conversion, permalinks and template
/// engines plug in through these slots. Empty slots are skipped.
#[derive(Default)]
pub struct Collaborators {
    pub markdown: Option<Box<dyn Stage + Send>>,
    pub permalinks: Option<Box<dyn Stage + Send>>,
    pub in_place: Option<Box<dyn Stage + Send>>,
    pub layouts: Option<Box<dyn Stage + Send>>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered list of stages.
#[derive(Default)]
pub struct Pipeline<'s> {
    stages: Vec<Box<dyn Stage + 's>>,
}

impl<'s> Pipeline<'s> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn stage(mut self, stage: impl Stage + 's) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append `stage` only when `gate` holds.
    pub fn stage_if(self, gate: bool, stage: impl Stage + 's) -> Self {
        if gate { self.stage(stage) } else { self }
    }

    /// Append a collaborator slot when `gate` holds and the slot is filled.
    pub fn slot_if(self, gate: bool, slot: Option<&'s mut (dyn Stage + Send + 'static)>) -> Self {
        match slot {
            Some(stage) if gate => self.stage(stage),
            _ => self,
        }
    }

    /// Stage names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage in order, logging start time and duration of each.
    pub fn run(self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        for mut stage in self.stages {
            let started = chrono::Local::now().format("%H:%M:%S%.3f");
            let timer = Instant::now();

            stage
                .run(files, ctx)
                .with_context(|| format!("stage `{}` failed", stage.name()))?;

            log!("stage"; "{} : {started} - {}ms", stage.name(), timer.elapsed().as_millis());
        }
        Ok(())
    }
}

// ============================================================================
// Small built-in stages
// ============================================================================

/// Read the source tree into the (empty) file set.
pub struct ReadSource;

impl Stage for ReadSource {
    fn name(&self) -> &str {
        "read source"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let read = file::read_tree(ctx.source())?;
        log!("build"; "read {} files from {}", read.len(), ctx.source().display());
        files.extend(read);
        Ok(())
    }
}

/// Lift include groups to their newest modification time.
pub struct PropagateIncludes;

impl Stage for PropagateIncludes {
    fn name(&self) -> &str {
        "check dependencies"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        deps::propagate(files, ctx.config.build.includes.matching);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Push(&'static str);

    impl Stage for Push {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&mut self, files: &mut FileSet, _: &BuildContext) -> Result<()> {
            // every stage sees what the previous ones wrote
            let seen = files.len();
            let mut entry = FileEntry::new(self.0);
            entry.front_matter.insert("seen".into(), seen.into());
            files.insert(self.0.to_owned(), entry);
            Ok(())
        }
    }

    struct Fail;

    impl Stage for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn run(&mut self, _: &mut FileSet, _: &BuildContext) -> Result<()> {
            bail!("boom")
        }
    }

    #[test]
    fn test_pipeline_runs_in_order() {
        let config = SiteConfig::default();
        let flags = BuildFlags::default();
        let ctx = BuildContext::new(&config, &flags);
        let mut files = FileSet::new();

        Pipeline::new()
            .stage(Push("a"))
            .stage(Push("b"))
            .stage(Push("c"))
            .run(&mut files, &ctx)
            .unwrap();

        assert_eq!(files["a"].front_matter["seen"], 0);
        assert_eq!(files["b"].front_matter["seen"], 1);
        assert_eq!(files["c"].front_matter["seen"], 2);
    }

    #[test]
    fn test_pipeline_gates() {
        let mut slot: Box<dyn Stage + Send> = Box::new(Push("slot"));
        let pipeline = Pipeline::new()
            .stage_if(true, Push("on"))
            .stage_if(false, Push("off"))
            .slot_if(true, Some(slot.as_mut()))
            .slot_if(true, None);

        assert_eq!(pipeline.names(), vec!["on", "slot"]);
    }

    #[test]
    fn test_pipeline_aborts_on_failure() {
        let config = SiteConfig::default();
        let flags = BuildFlags::default();
        let ctx = BuildContext::new(&config, &flags);
        let mut files = FileSet::new();

        let err = Pipeline::new()
            .stage(Push("a"))
            .stage(Fail)
            .stage(Push("never"))
            .run(&mut files, &ctx)
            .unwrap_err();

        assert!(err.to_string().contains("fail"));
        assert!(files.contains_key("a"));
        assert!(!files.contains_key("never"));
    }

    #[test]
    fn test_context_state() {
        let config = SiteConfig::default();
        let flags = BuildFlags::default();
        let ctx = BuildContext::new(&config, &flags);

        ctx.set_site_metadata("menu", serde_json::json!({"items": []}));
        assert!(ctx.site_metadata().contains_key("menu"));

        assert!(ctx.take_snapshot().is_none());
        ctx.record_snapshot(Snapshot::default());
        assert!(ctx.take_snapshot().is_some());
        assert!(ctx.take_snapshot().is_none());
    }
}

//! Template asset copying.
//!
//! Theme assets, site assets and widgets are copied straight into the
//! output directory; they never enter the file set.

use super::{BuildContext, FileSet, Stage};
use crate::log;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Copy a directory tree to `<output>/<dest>`.
pub struct CopyAssets {
    label: &'static str,
    src: PathBuf,
    dest: PathBuf,
}

impl CopyAssets {
    pub fn new(label: &'static str, src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            label,
            src: src.into(),
            dest: dest.into(),
        }
    }

    /// `<theme>/assets` → `assets`
    pub fn theme(ctx: &BuildContext) -> Self {
        Self::new("copy template assets", ctx.config.theme_assets(), "assets")
    }

    /// `<assets>` → `assets`
    pub fn site(ctx: &BuildContext) -> Self {
        Self::new("copy site assets", &ctx.config.build.assets, "assets")
    }

    /// `<theme>/../widgets` → `assets/widgets`
    pub fn widgets(ctx: &BuildContext) -> Self {
        Self::new("copy widgets", ctx.config.widgets(), "assets/widgets")
    }
}

impl Stage for CopyAssets {
    fn name(&self) -> &str {
        self.label
    }

    fn run(&mut self, _files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        if !self.src.is_dir() {
            log!("warn"; "{}: {} not found, skipping", self.label, self.src.display());
            return Ok(());
        }

        let dest = ctx.destination().join(&self.dest);
        log!("build"; "copydir from {} to {}", self.src.display(), dest.display());
        let copied = copy_dir(&self.src, &dest)?;
        log!("build"; "copydir done, {copied} files");
        Ok(())
    }
}

/// Copy every file below `src` into `dest` in parallel, skipping files whose
/// copy is already newer. Returns the number of files copied.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<usize> {
    let files = collect_all_files(src);

    files
        .par_iter()
        .map(|path| -> Result<usize> {
            let rel = path.strip_prefix(src).unwrap_or(path);
            let target = dest.join(rel);
            if is_up_to_date(path, &target) {
                return Ok(0);
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &target).with_context(|| {
                format!("Failed to copy {} to {}", path.display(), target.display())
            })?;
            Ok(1)
        })
        .sum()
}

fn collect_all_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(|e| e.into_path())
        .collect()
}

/// Destination exists and is not older than the source.
fn is_up_to_date(src: &Path, dst: &Path) -> bool {
    let (Ok(src_meta), Ok(dst_meta)) = (src.metadata(), dst.metadata()) else {
        return false;
    };
    match (src_meta.modified(), dst_meta.modified()) {
        (Ok(src_time), Ok(dst_time)) => dst_time >= src_time && src_meta.len() == dst_meta.len(),
        _ => false,
    }
}

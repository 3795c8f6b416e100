//! Destination stages: clean before, write after.

use super::{BuildContext, DataError, FileSet, Stage};
use crate::log;
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

/// Remove and recreate the output directory.
pub struct CleanDestination;

impl Stage for CleanDestination {
    fn name(&self) -> &str {
        "clean destination"
    }

    fn run(&mut self, _files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let output = ctx.destination();
        if output.exists() {
            fs::remove_dir_all(output).with_context(|| {
                format!("Failed to clear output directory: {}", output.display())
            })?;
        }
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        Ok(())
    }
}

/// Write every entry to `<output>/<path>` and persist the freshness snapshot.
pub struct WriteDestination;

impl Stage for WriteDestination {
    fn name(&self) -> &str {
        "write files"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let output = ctx.destination();

        for entry in files.values() {
            let target = output_path(output, &entry.path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &entry.contents)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }
        log!("build"; "wrote {} files to {}", files.len(), output.display());

        if let Some(snapshot) = ctx.take_snapshot() {
            snapshot.save(&ctx.config.build.snapshot)?;
        }
        Ok(())
    }
}

/// Join an entry path onto the output root, refusing paths that escape it.
fn output_path(output: &Path, path: &str) -> Result<PathBuf, DataError> {
    let rel = Path::new(path.trim_start_matches('/'));
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || rel.as_os_str().is_empty() {
        return Err(DataError::UnsafePath(path.to_owned()));
    }
    Ok(output.join(rel))
}

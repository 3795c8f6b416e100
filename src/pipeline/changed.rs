//! Change detection against the previous build.
//!
//! After a successful write the modification time of every source key is
//! saved to the snapshot file. The next incremental build drops entries that
//! are not newer than their recorded time, so later stages only see changed
//! files. Include groups are propagated before this runs, which keeps a page
//! whose included part changed in the set.

use super::{BuildContext, FileSet, Stage};
use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

/// Key → modification time (ms since epoch) of one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken, RFC 3339.
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub files: BTreeMap<String, u64>,
}

impl Snapshot {
    /// Record the current time of every entry.
    pub fn record(files: &FileSet) -> Self {
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            files: files
                .iter()
                .map(|(key, entry)| (key.clone(), entry.modified_ms()))
                .collect(),
        }
    }

    /// Load a snapshot. A missing or unreadable file gives an empty one,
    /// which makes every file count as changed.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                log!("warn"; "unable to read snapshot {}: {err}", path.display());
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|err| {
            log!("warn"; "ignoring corrupt snapshot {}: {err}", path.display());
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))
    }

    /// True when `key` was recorded with a time at or after `modified_ms`.
    pub fn is_fresh(&self, key: &str, modified_ms: u64) -> bool {
        self.files.get(key).is_some_and(|&seen| modified_ms <= seen)
    }
}

/// Remember the freshness of every entry for the write stage.
pub struct RecordSnapshot;

impl Stage for RecordSnapshot {
    fn name(&self) -> &str {
        "record freshness"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        ctx.record_snapshot(Snapshot::record(files));
        Ok(())
    }
}

/// Drop entries unchanged since the last snapshot.
pub struct DetectChanges;

impl Stage for DetectChanges {
    fn name(&self) -> &str {
        "detect changes"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let previous = Snapshot::load(&ctx.config.build.snapshot);
        let total = files.len();

        files.retain(|key, entry| !previous.is_fresh(key, entry.modified_ms()));
        log!("build"; "{} of {total} files changed", files.len());
        Ok(())
    }
}

//! File system watcher for the development server.
//!
//! Monitors the source tree, theme layouts/partials/assets, widgets, site
//! assets, in-place partials and the config file. Any relevant change
//! triggers a full rebuild.
//!
//! # Rebuild serialization
//!
//! ```text
//! notify events ──▶ Debouncer (pending set) ──▶ rebuild ──▶ on_build(result)
//!                        ▲                         │
//!                        └── events queued in the ─┘
//!                            channel while building
//! ```
//!
//! Rebuilds run on the watcher thread itself, so two builds never overlap.
//! Events that arrive during a build wait in the channel and land in the
//! debouncer's pending set afterwards, collapsing into one follow-up build.

use crate::{
    builder::SiteBuilder,
    config::SiteConfig,
    log,
    pipeline::FileSet,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Format path as relative to root for log display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// A watched location and whether it is a directory.
#[derive(Debug, Clone, PartialEq)]
struct WatchTarget {
    path: PathBuf,
    is_dir: bool,
}

/// Everything a rebuild depends on.
fn watch_targets(config: &SiteConfig) -> Vec<WatchTarget> {
    let dirs = [
        config.build.source.clone(),
        config.theme_layouts(),
        config.theme_partials(),
        config.theme_assets(),
        config.widgets(),
        config.build.assets.clone(),
        config.build.partials.clone(),
        config.build.metainfo.dir.clone(),
    ];

    let mut targets: Vec<_> = dirs
        .into_iter()
        .map(|path| WatchTarget { path, is_dir: true })
        .collect();
    targets.push(WatchTarget {
        path: config.config_path.clone(),
        is_dir: false,
    });
    targets
}

/// Changes to build products never trigger a rebuild.
fn is_build_output(path: &Path, config: &SiteConfig) -> bool {
    path.starts_with(&config.build.output) || path == config.build.snapshot
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events into one pending rebuild.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    delay: Duration,
}

impl Debouncer {
    fn new(delay: Duration) -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            delay,
        }
    }

    fn add(&mut self, event: Event, config: &SiteConfig) {
        for path in event.paths {
            if !is_temp_file(&path) && !is_build_output(&path, config) {
                self.pending.insert(path);
                self.last_event = Some(Instant::now());
            }
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.delay)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            self.delay
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Rebuild the whole site and hand the result to `on_build`.
///
/// A changed config file is reloaded first; a config that fails to load is
/// reported and the previous one is kept.
fn rebuild(
    builder: &mut SiteBuilder,
    paths: &[PathBuf],
    on_build: &mut impl FnMut(Result<FileSet>),
) {
    let config = builder.config();
    let root = config.get_root().to_path_buf();
    let config_changed = paths.iter().any(|p| p == &config.config_path);

    let trigger = paths
        .iter()
        .map(|p| rel_path(p, &root))
        .collect::<Vec<_>>()
        .join(", ");
    log!("watch"; "{trigger} changed, rebuilding...");

    if config_changed {
        match reload_config(config) {
            Ok(reloaded) => builder.set_config(reloaded),
            Err(err) => log!("watch"; "config reload failed, keeping previous: {err:#}"),
        }
    }

    on_build(builder.generate(true));
}

fn reload_config(current: &SiteConfig) -> Result<SiteConfig> {
    let mut config = SiteConfig::from_path(&current.config_path)?;
    config.config_path = current.config_path.clone();
    config.serve = current.serve.clone();
    config.resolve_paths(current.get_root());
    config.validate()?;
    Ok(config)
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let root = config.get_root();
    let mut watched = Vec::new();

    for target in watch_targets(config) {
        if !target.path.exists() {
            continue;
        }
        let mode = if target.is_dir {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&target.path, mode)
            .with_context(|| format!("Failed to watch {}", target.path.display()))?;

        let suffix = if target.is_dir { "/" } else { "" };
        watched.push(format!("{}{suffix}", rel_path(&target.path, root)));
    }

    log!("watch"; "watching {}", watched.join(", "));
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the site sources and rebuild on change until the channel closes.
///
/// Blocks the calling thread. Every rebuild result goes to `on_build`.
pub fn watch_for_changes_blocking(
    builder: &mut SiteBuilder,
    mut on_build: impl FnMut(Result<FileSet>),
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, builder.config())?;

    let delay = Duration::from_millis(builder.config().serve.debounce_ms);
    let mut debouncer = Debouncer::new(delay);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event, builder.config()),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let paths = debouncer.take();
                rebuild(builder, &paths, &mut on_build);
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}

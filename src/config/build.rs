//! `[build]` section configuration.
//!
//! Contains source/output paths, theme location and the settings of the
//! include, external content, metadata and metainfo stages.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

// ============================================================================
// Enums
// ============================================================================

/// How an include fragment is matched against file keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeMatch {
    /// Exact or path-suffix match on component boundaries (default).
    #[default]
    Path,
    /// First key containing the fragment anywhere.
    Substring,
}

/// Template engine handed to layout collaborators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
    /// Handlebars, layouts matching `*.html` (default).
    #[default]
    Hbs,
    /// Pug, layouts matching `*.pug`.
    Pug,
}

impl TemplateEngine {
    /// Glob of layout files for this engine.
    pub const fn layout_pattern(self) -> &'static str {
        match self {
            Self::Hbs => "*.html",
            Self::Pug => "*.pug",
        }
    }
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in kiln.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// source = "src"
/// output = "build"
/// theme = "themes/cleanui"
///
/// [build.metainfo]
/// include_only = ["menu", "practice"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Content source directory.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Structured data folder (json-to-files sources, external content).
    #[serde(default = "defaults::build::data")]
    #[educe(Default = defaults::build::data())]
    pub data: PathBuf,

    /// Site assets copied to `<output>/assets`.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// In-place partials directory.
    #[serde(default = "defaults::build::partials")]
    #[educe(Default = defaults::build::partials())]
    pub partials: PathBuf,

    /// Theme directory holding `layouts/`, `partials/` and `assets/`.
    #[serde(default = "defaults::build::theme")]
    #[educe(Default = defaults::build::theme())]
    pub theme: PathBuf,

    /// Template engine used by layout collaborators.
    #[serde(default)]
    pub template_engine: TemplateEngine,

    /// Freshness snapshot of the previous build.
    #[serde(default = "defaults::build::snapshot")]
    #[educe(Default = defaults::build::snapshot())]
    pub snapshot: PathBuf,

    /// Metainfo index settings.
    #[serde(default)]
    pub metainfo: MetainfoConfig,

    /// Include handling.
    #[serde(default)]
    pub includes: IncludesConfig,

    /// External content lookups.
    #[serde(default)]
    pub external: ExternalConfig,

    /// Site metadata files, name → path relative to the source directory.
    #[serde(default = "defaults::build::metadata::files")]
    #[educe(Default = defaults::build::metadata::files())]
    pub metadata: BTreeMap<String, PathBuf>,
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.metainfo]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct MetainfoConfig {
    /// Directory of per-group `<name>.json` records.
    #[serde(default = "defaults::build::metainfo::dir")]
    #[educe(Default = defaults::build::metainfo::dir())]
    pub dir: PathBuf,

    /// Index file name inside the output directory.
    #[serde(default = "defaults::build::metainfo::output")]
    #[educe(Default = defaults::build::metainfo::output())]
    pub output: PathBuf,

    /// Groups listed even when no page anchors them.
    #[serde(default = "defaults::build::metainfo::include_only")]
    #[educe(Default = defaults::build::metainfo::include_only())]
    pub include_only: Vec<String>,
}

/// `[build.includes]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct IncludesConfig {
    /// Fragment matching policy.
    #[serde(default = "defaults::build::includes::matching")]
    #[educe(Default = defaults::build::includes::matching())]
    pub matching: IncludeMatch,

    /// Drop included files from the output once inlined.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub delete_partials: bool,
}

/// `[build.external]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ExternalConfig {
    /// `data` field holding the content path pattern.
    #[serde(default = "defaults::build::external::pattern_field")]
    #[educe(Default = defaults::build::external::pattern_field())]
    pub pattern_field: String,

    /// `data` field receiving the file content.
    #[serde(default = "defaults::build::external::content_field")]
    #[educe(Default = defaults::build::external::content_field())]
    pub content_field: String,
}

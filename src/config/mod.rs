//! Site configuration management for `kiln.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `[build]`   | Source/output paths, theme, metainfo, includes     |
//! | `[serve]`   | Development server (port, interface, watch)        |
//! | `[deploy]`  | Options handed to layouts by `publish`             |
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "src"
//! output = "build"
//! theme = "themes/cleanui"
//!
//! [build.metainfo]
//! include_only = ["menu", "practice"]
//!
//! [serve]
//! port = 5277
//! ```
//!
//! All paths are relative to the project root until [`SiteConfig::resolve_paths`]
//! turns them into absolute ones.

mod build;
pub mod defaults;
mod deploy;
mod error;
mod serve;

pub use build::{IncludeMatch, TemplateEngine};
pub use deploy::DeployOptions;
pub use error::ConfigError;

use build::BuildConfig;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing kiln.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Publish options
    #[serde(default)]
    pub deploy: DeployOptions,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the config file named on the command line, falling back to
    /// defaults when it does not exist, and apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli, &root);
        config.config_path = normalize_path(&config_path);
        config.validate()?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli, root: &Path) {
        update_option(&mut self.build.output, cli.output.as_ref());

        if let Commands::Serve { interface, port } = &cli.command {
            update_option(&mut self.serve.interface, interface.as_ref());
            update_option(&mut self.serve.port, port.as_ref());
        }
        if let Commands::Publish {
            base_url: Some(url),
        } = &cli.command
        {
            self.deploy.base_url = Some(url.clone());
        }

        self.resolve_paths(root);
    }

    /// Make every configured path absolute relative to `root`.
    ///
    /// The theme path may start with `~`. Metadata file paths stay relative to
    /// the source directory and the metainfo output relative to the output
    /// directory.
    pub fn resolve_paths(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.set_root(&root);

        let build = &mut self.build;
        build.source = normalize_path(&root.join(&build.source));
        build.output = normalize_path(&root.join(&build.output));
        build.data = normalize_path(&root.join(&build.data));
        build.assets = normalize_path(&root.join(&build.assets));
        build.partials = normalize_path(&root.join(&build.partials));
        build.snapshot = normalize_path(&root.join(&build.snapshot));
        build.metainfo.dir = normalize_path(&root.join(&build.metainfo.dir));

        let theme = shellexpand::tilde(&build.theme.to_string_lossy()).into_owned();
        build.theme = normalize_path(&root.join(theme));
    }

    /// `<theme>/layouts`
    pub fn theme_layouts(&self) -> PathBuf {
        self.build.theme.join("layouts")
    }

    /// `<theme>/partials`
    pub fn theme_partials(&self) -> PathBuf {
        self.build.theme.join("partials")
    }

    /// `<theme>/assets`
    pub fn theme_assets(&self) -> PathBuf {
        self.build.theme.join("assets")
    }

    /// Widgets live next to the theme: `<theme>/../widgets`.
    pub fn widgets(&self) -> PathBuf {
        self.build
            .theme
            .parent()
            .map_or_else(|| self.build.theme.join("../widgets"), |p| p.join("widgets"))
    }

    /// Absolute path of the metainfo index.
    pub fn metainfo_output(&self) -> PathBuf {
        self.build.output.join(&self.build.metainfo.output)
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        let build = &self.build;

        if !build.source.is_dir() {
            bail!(ConfigError::MissingDir {
                field: "[build.source]",
                path: build.source.clone(),
            });
        }

        if build.output == build.source || build.source.starts_with(&build.output) {
            bail!(ConfigError::Validation(
                "[build.output] must not contain [build.source]".into()
            ));
        }

        if build.metainfo.output.is_absolute() {
            bail!(ConfigError::Validation(
                "[build.metainfo.output] must be relative to [build.output]".into()
            ));
        }

        if build.external.pattern_field == build.external.content_field {
            bail!(ConfigError::Validation(
                "[build.external] pattern_field and content_field must differ".into()
            ));
        }

        if let Some(base_url) = &self.deploy.base_url
            && !base_url.starts_with("http")
        {
            bail!(ConfigError::Validation(
                "[deploy.base_url] must start with http:// or https://".into()
            ));
        }

        Ok(())
    }
}

/// Update config option if CLI value is provided
fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
    if let Some(option) = cli_option {
        *config_option = option.clone();
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn site_with_source() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        dir
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = SiteConfig::from_str("[build\nsource = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let result = SiteConfig::from_str("[base]\ntitle = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_get_root_default() {
        let config = SiteConfig::default();
        assert_eq!(config.get_root(), Path::new("./"));
    }

    #[test]
    fn test_resolve_paths() {
        let dir = site_with_source();
        let mut config = SiteConfig::default();
        config.resolve_paths(dir.path());

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.get_root(), root);
        assert_eq!(config.build.source, root.join("src"));
        assert_eq!(config.build.output, root.join("build"));
        assert_eq!(config.build.metainfo.dir, root.join("metainfo"));
        assert_eq!(config.metainfo_output(), root.join("build/metainfo.json"));
        assert_eq!(config.theme_layouts(), root.join("themes/cleanui/layouts"));
        assert_eq!(config.widgets(), root.join("themes/widgets"));
    }

    #[test]
    fn test_validate_missing_source() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.resolve_paths(dir.path());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[build.source]"));
    }

    #[test]
    fn test_validate_output_inside_source() {
        let dir = site_with_source();
        let mut config = SiteConfig::from_str("[build]\noutput = \".\"").unwrap();
        config.resolve_paths(dir.path());

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_same_external_fields() {
        let dir = site_with_source();
        let mut config = SiteConfig::from_str(
            "[build.external]\npattern_field = \"body\"\ncontent_field = \"body\"",
        )
        .unwrap();
        config.resolve_paths(dir.path());

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = site_with_source();
        fs::write(dir.path().join("kiln.toml"), "[serve]\nport = 4000\n").unwrap();
        let root = dir.path().to_string_lossy().into_owned();

        let cli = Cli::try_parse_from(["sitekiln", "-r", &root, "serve", "-p", "9000"]).unwrap();
        let config = SiteConfig::load(&cli).unwrap();

        assert_eq!(config.serve.port, 9000);
        assert!(config.config_path.ends_with("kiln.toml"));
    }

    #[test]
    fn test_load_publish_base_url() {
        let dir = site_with_source();
        let root = dir.path().to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "sitekiln",
            "-r",
            &root,
            "publish",
            "--base-url",
            "ftp://example.com",
        ])
        .unwrap();

        assert!(SiteConfig::load(&cli).is_err());
    }
}

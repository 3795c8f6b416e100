//! Command-line interface definitions.
//!
//! A thin front end over [`SiteBuilder`](crate::builder::SiteBuilder): each
//! subcommand maps to one build operation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sitekiln static site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file name (default: kiln.toml)
    #[arg(short = 'C', long, default_value = "kiln.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Clean full build, including the metainfo index
    Prepare,

    /// Refresh metainfo.json without rendering content
    Metainfo,

    /// Build the site; only changed files are rendered unless forced
    Generate {
        /// Bypass change detection and rebuild every file
        #[arg(short, long)]
        force: bool,
    },

    /// Minified production build without internal build metadata
    Publish {
        /// Base URL handed to layout collaborators
        #[arg(long = "base-url")]
        base_url: Option<String>,
    },

    /// Serve the output directory and rebuild on change
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,
    },
}

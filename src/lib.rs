//! # sitekiln
//!
//! Build pipeline core of a static site generator. Content files flow
//! through a fixed sequence of stages over one in-memory [`FileSet`]:
//! include dependencies keep freshness consistent for change detection,
//! `:token` patterns produce data-driven paths and layouts, and page
//! metadata is aggregated into a site-wide `metainfo.json`.
//!
//! Rendering (markdown, template engines, permalinks) is left to
//! [`Collaborators`] plugged into named pipeline slots.
//!
//! | Module | Role |
//! |--------|------|
//! | [`builder`] | `prepare`, `refresh_metadata`, `generate`, `publish` |
//! | [`pipeline`] | stage trait, build context and the built-in stages |
//! | [`serve`] / [`watch`] | development server with serialized rebuilds |
//! | [`config`] | `kiln.toml` loading and validation |
//! | [`utils`] | `:token` resolution and slugs |
//!
//! [`FileSet`]: pipeline::FileSet
//! [`Collaborators`]: pipeline::Collaborators

pub mod builder;
pub mod cli;
pub mod config;
pub mod logger;
pub mod pipeline;
pub mod serve;
pub mod utils;
pub mod watch;

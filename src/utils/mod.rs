//! Utility modules for the build pipeline.

pub mod params;
pub mod slug;

//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn source() -> PathBuf {
        "src".into()
    }

    pub fn output() -> PathBuf {
        "build".into()
    }

    pub fn data() -> PathBuf {
        "src/data".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn partials() -> PathBuf {
        "inplacePartials".into()
    }

    pub fn theme() -> PathBuf {
        "themes/cleanui".into()
    }

    pub fn snapshot() -> PathBuf {
        ".sitekiln-snapshot.json".into()
    }

    pub mod metainfo {
        use std::path::PathBuf;

        pub fn dir() -> PathBuf {
            "metainfo".into()
        }

        pub fn output() -> PathBuf {
            "metainfo.json".into()
        }

        pub fn include_only() -> Vec<String> {
            vec!["menu".into(), "practice".into()]
        }
    }

    pub mod includes {
        use super::super::super::IncludeMatch;

        pub fn matching() -> IncludeMatch {
            IncludeMatch::default()
        }
    }

    pub mod external {
        pub fn pattern_field() -> String {
            "htmlExternalContent".into()
        }

        pub fn content_field() -> String {
            "htmlContent".into()
        }
    }

    pub mod metadata {
        use std::{collections::BTreeMap, path::PathBuf};

        pub fn files() -> BTreeMap<String, PathBuf> {
            ["practice", "menu", "contents", "reviews"]
                .into_iter()
                .map(|name| (name.to_owned(), PathBuf::from(format!("data/{name}.json"))))
                .collect()
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5277
    }

    pub fn debounce_ms() -> u64 {
        300
    }
}

// ============================================================================
// [deploy] Section Defaults
// ============================================================================

pub mod deploy {
    pub fn base_url() -> Option<String> {
        None
    }
}

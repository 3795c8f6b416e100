//! Errors raised while reading source files and structured data.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reading content or data files.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error when reading `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid JSON in `{}`", .0.display())]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("invalid front matter in `{0}`")]
    FrontMatter(String, #[source] serde_yaml::Error),

    #[error("`{0}` lies outside the output directory")]
    UnsafePath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_display() {
        let err = DataError::Io(
            PathBuf::from("src/data/menu.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("src/data/menu.json"));

        let err = DataError::UnsafePath("../etc/passwd".into());
        assert!(err.to_string().contains("../etc/passwd"));
    }
}

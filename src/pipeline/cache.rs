//! Per-build cache of parsed JSON data files.
//!
//! Several stages read the same data file (site metadata, data-driven pages,
//! metainfo records). Each build owns one [`DataCache`]; it is created with
//! the [`BuildContext`](super::BuildContext) and dropped with it, so a build
//! never sees JSON parsed by an earlier one.

use super::error::DataError;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug, Default)]
pub struct DataCache {
    entries: FxHashMap<PathBuf, Option<Arc<Value>>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON file, reusing an earlier parse from this build.
    ///
    /// Returns `Ok(None)` when the file does not exist. Other I/O failures
    /// and malformed JSON are errors.
    pub fn load_json(&mut self, path: &Path) -> Result<Option<Arc<Value>>, DataError> {
        if let Some(cached) = self.entries.get(path) {
            return Ok(cached.clone());
        }

        let value = match fs::read_to_string(path) {
            Ok(content) => {
                let value: Value = serde_json::from_str(&content)
                    .map_err(|err| DataError::Json(path.to_path_buf(), err))?;
                Some(Arc::new(value))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(DataError::Io(path.to_path_buf(), err)),
        };

        self.entries.insert(path.to_path_buf(), value.clone());
        Ok(value)
    }

    /// Number of files looked up so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("menu.json");
        fs::write(&path, r#"{"items": [1, 2]}"#).unwrap();

        let mut cache = DataCache::new();
        let value = cache.load_json(&path).unwrap().unwrap();
        assert_eq!(*value, json!({"items": [1, 2]}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_load_json_reuses_parse_within_build() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("menu.json");
        fs::write(&path, r#"{"v": 1}"#).unwrap();

        let mut cache = DataCache::new();
        let first = cache.load_json(&path).unwrap().unwrap();

        fs::write(&path, r#"{"v": 2}"#).unwrap();
        let second = cache.load_json(&path).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // a new build scope sees the new content
        let mut fresh = DataCache::new();
        assert_eq!(*fresh.load_json(&path).unwrap().unwrap(), json!({"v": 2}));
    }

    #[test]
    fn test_load_json_missing() {
        let dir = TempDir::new().unwrap();
        let mut cache = DataCache::new();
        assert!(cache.load_json(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn test_load_json_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let mut cache = DataCache::new();
        assert!(matches!(cache.load_json(&path), Err(DataError::Json(..))));
    }
}

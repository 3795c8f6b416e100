//! In-memory file model shared by all stages.
//!
//! A [`FileSet`] maps repository-relative source keys (`/` separated) to
//! [`FileEntry`] values. Reading the source tree splits off YAML front matter
//! and lifts the keys the pipeline understands into typed fields; everything
//! else stays in [`FileEntry::front_matter`].

use super::error::DataError;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};
use walkdir::WalkDir;

/// Files never read into the set.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

pub type FileSet = BTreeMap<String, FileEntry>;

#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Output path, rewritten by path stages. Starts out equal to the key.
    pub path: String,
    /// Freshness marker. Stages only ever move it forward.
    pub modified_at: SystemTime,
    /// Body without front matter.
    pub contents: Vec<u8>,
    /// Include name → fragment naming another file.
    pub includes: BTreeMap<String, String>,
    pub layout: Option<String>,
    /// `layout` is a `:token` pattern evaluated against this file.
    pub eval_layout: bool,
    pub collections: Vec<String>,
    pub title: Option<String>,
    /// `sb_metainfo`: this page anchors a metainfo group.
    pub metainfo_key: Option<String>,
    /// `sb_plainHtml`: list this page in the flat page index.
    pub plain_html: bool,
    pub data: Value,
    /// Remaining front matter fields.
    pub front_matter: Map<String, Value>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            modified_at: UNIX_EPOCH,
            contents: Vec::new(),
            includes: BTreeMap::new(),
            layout: None,
            eval_layout: false,
            collections: Vec::new(),
            title: None,
            metainfo_key: None,
            plain_html: false,
            data: Value::Null,
            front_matter: Map::new(),
        }
    }

    /// Parse raw file bytes, splitting off front matter when present.
    pub fn parse(key: &str, raw: Vec<u8>, modified_at: SystemTime) -> Result<Self, DataError> {
        let mut entry = Self::new(key);
        entry.modified_at = modified_at;

        let Some((yaml, body)) = split_front_matter(&raw) else {
            entry.contents = raw;
            return Ok(entry);
        };

        let matter: Value =
            serde_yaml::from_str(yaml).map_err(|err| DataError::FrontMatter(key.to_owned(), err))?;
        entry.contents = body.to_vec();

        if let Value::Object(map) = matter {
            entry.apply_front_matter(map);
        }
        Ok(entry)
    }

    /// Move recognised keys into typed fields, keep the rest.
    fn apply_front_matter(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            match (key.as_str(), value) {
                ("include", Value::Object(includes)) => {
                    self.includes = includes
                        .into_iter()
                        .filter_map(|(name, frag)| match frag {
                            Value::String(frag) => Some((name, frag)),
                            _ => None,
                        })
                        .collect();
                }
                ("layout", Value::String(layout)) => self.layout = Some(layout),
                ("eval_layout", Value::Bool(flag)) => self.eval_layout = flag,
                ("collection", Value::String(name)) => self.collections = vec![name],
                ("collection", Value::Array(names)) => {
                    self.collections = names
                        .into_iter()
                        .filter_map(|name| match name {
                            Value::String(name) => Some(name),
                            _ => None,
                        })
                        .collect();
                }
                ("title", Value::String(title)) => self.title = Some(title),
                ("sb_metainfo", Value::String(name)) => self.metainfo_key = Some(name),
                ("sb_plainHtml", Value::Bool(flag)) => self.plain_html = flag,
                ("data", data) => self.data = data,
                (other, value) => {
                    self.front_matter.insert(other.to_owned(), value);
                }
            }
        }
    }

    /// JSON view of the entry used for `:token` lookups.
    ///
    /// Front matter fields at the top level, plus `path`, `title`, `layout`,
    /// `collection` and `data`.
    pub fn context(&self) -> Value {
        let mut map = self.front_matter.clone();
        map.insert("path".into(), Value::String(self.path.clone()));
        if let Some(title) = &self.title {
            map.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(layout) = &self.layout {
            map.insert("layout".into(), Value::String(layout.clone()));
        }
        if !self.collections.is_empty() {
            let names = self.collections.iter().cloned().map(Value::String).collect();
            map.insert("collection".into(), Value::Array(names));
        }
        if !self.data.is_null() {
            map.insert("data".into(), self.data.clone());
        }
        Value::Object(map)
    }

    /// Modification time in milliseconds since the epoch.
    pub fn modified_ms(&self) -> u64 {
        to_millis(self.modified_at)
    }
}

pub fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Split `---\n<yaml>\n---\n<body>`. Returns `None` when the file does not
/// start with a front matter fence or is not UTF-8.
fn split_front_matter(raw: &[u8]) -> Option<(&str, &[u8])> {
    let text = std::str::from_utf8(raw).ok()?;
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body_start = text.len() - rest.len() + offset + line.len();
            return Some((yaml, &raw[body_start..]));
        }
        offset += line.len();
    }
    None
}

/// Read every file below `source` into a [`FileSet`].
///
/// Hidden files and directories are skipped.
pub fn read_tree(source: &Path) -> Result<FileSet> {
    let mut files = FileSet::new();

    let walker = WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if IGNORED_FILES.contains(&name.as_ref()) {
            continue;
        }

        let path = entry.path();
        let key = path
            .strip_prefix(source)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let raw = fs::read(path).map_err(|err| DataError::Io(path.to_path_buf(), err))?;
        let modified_at = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .unwrap_or(UNIX_EPOCH);

        let file = FileEntry::parse(&key, raw, modified_at)?;
        files.insert(key, file);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_without_front_matter() {
        let entry = FileEntry::parse("a.md", b"# Hello".to_vec(), UNIX_EPOCH).unwrap();
        assert_eq!(entry.contents, b"# Hello");
        assert!(entry.front_matter.is_empty());
        assert_eq!(entry.path, "a.md");
    }

    #[test]
    fn test_parse_recognised_keys() {
        let raw = b"---
title: Home
layout: page.html
collection: services
sb_metainfo: menu
sb_plainHtml: true
include:
  intro: parts/intro.md
data:
  slug: home
custom: 1
---
body
"
        .to_vec();
        let entry = FileEntry::parse("index.md", raw, UNIX_EPOCH).unwrap();

        assert_eq!(entry.title.as_deref(), Some("Home"));
        assert_eq!(entry.layout.as_deref(), Some("page.html"));
        assert_eq!(entry.collections, vec!["services"]);
        assert_eq!(entry.metainfo_key.as_deref(), Some("menu"));
        assert!(entry.plain_html);
        assert_eq!(entry.includes.get("intro").map(String::as_str), Some("parts/intro.md"));
        assert_eq!(entry.data, json!({"slug": "home"}));
        assert_eq!(entry.front_matter.get("custom"), Some(&json!(1)));
        assert_eq!(entry.contents, b"body\n");
    }

    #[test]
    fn test_parse_collection_list() {
        let raw = b"---\ncollection: [a, b]\n---\n".to_vec();
        let entry = FileEntry::parse("x.md", raw, UNIX_EPOCH).unwrap();
        assert_eq!(entry.collections, vec!["a", "b"]);
        assert!(entry.contents.is_empty());
    }

    #[test]
    fn test_parse_crlf_front_matter() {
        let raw = b"---\r\ntitle: Win\r\n---\r\nbody".to_vec();
        let entry = FileEntry::parse("x.md", raw, UNIX_EPOCH).unwrap();
        assert_eq!(entry.title.as_deref(), Some("Win"));
        assert_eq!(entry.contents, b"body");
    }

    #[test]
    fn test_parse_unterminated_fence_is_body() {
        let raw = b"---\ntitle: x\nno end".to_vec();
        let entry = FileEntry::parse("x.md", raw.clone(), UNIX_EPOCH).unwrap();
        assert_eq!(entry.contents, raw);
        assert!(entry.title.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let raw = b"---\ntitle: [unclosed\n---\n".to_vec();
        let err = FileEntry::parse("bad.md", raw, UNIX_EPOCH).unwrap_err();
        assert!(matches!(err, DataError::FrontMatter(ref key, _) if key == "bad.md"));
    }

    #[test]
    fn test_context() {
        let mut entry = FileEntry::new("services/tax.md");
        entry.title = Some("Tax".into());
        entry.data = json!({"kind": "service"});
        entry.front_matter.insert("lang".into(), json!("en"));

        let ctx = entry.context();
        assert_eq!(ctx["path"], "services/tax.md");
        assert_eq!(ctx["title"], "Tax");
        assert_eq!(ctx["data"]["kind"], "service");
        assert_eq!(ctx["lang"], "en");
    }

    #[test]
    fn test_read_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path();
        fs::create_dir_all(src.join("parts")).unwrap();
        fs::create_dir_all(src.join(".git")).unwrap();
        fs::write(src.join("index.md"), "---\ntitle: Home\n---\nhi").unwrap();
        fs::write(src.join("parts/intro.md"), "intro").unwrap();
        fs::write(src.join(".git/HEAD"), "ref").unwrap();
        fs::write(src.join(".DS_Store"), "").unwrap();

        let files = read_tree(src).unwrap();
        let keys: Vec<_> = files.keys().cloned().collect();
        assert_eq!(keys, vec!["index.md", "parts/intro.md"]);
        assert_eq!(files["index.md"].title.as_deref(), Some("Home"));
        assert!(files["parts/intro.md"].modified_at > UNIX_EPOCH);
    }
}

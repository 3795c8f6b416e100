//! Site-wide metainfo index (`metainfo.json`).
//!
//! Pages anchor groups with `sb_metainfo: <group>`; pages in a collection of
//! the same name become the group's permalinks. Pages with
//! `sb_plainHtml: true` go into a flat `plainHtml` list.
//!
//! ```json
//! {
//!   "services": {
//!     "indexPath": "services.html",
//!     "permalinks": ["services/audit.html", "services/tax.html"],
//!     "metainfo": { "schema": "..." }
//!   },
//!   "plainHtml": [{ "title": "About", "path": "about.html" }]
//! }
//! ```
//!
//! `metainfo` is the record `<metainfo dir>/<group>.json`. The index is
//! rebuilt from scratch on every run and replaces the previous file.

use super::{BuildContext, DataCache, FileSet, Stage};
use crate::log;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fs, path::Path};

/// Reserved index key of the flat page list.
const PLAIN_HTML_KEY: &str = "plainHtml";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetaInfoIndex {
    #[serde(flatten)]
    pub groups: BTreeMap<String, MetaGroup>,
    #[serde(rename = "plainHtml", skip_serializing_if = "Option::is_none")]
    pub plain_html: Option<Vec<PlainPage>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaGroup {
    pub index_path: String,
    pub permalinks: Vec<String>,
    pub metainfo: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlainPage {
    pub title: String,
    pub path: String,
}

impl MetaInfoIndex {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.plain_html.is_none()
    }

    /// Pretty JSON with 2-space indentation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Group records
// ============================================================================

/// Where group records come from.
pub trait MetainfoSource {
    fn lookup(&mut self, name: &str) -> Result<Value>;
}

impl<F> MetainfoSource for F
where
    F: FnMut(&str) -> Result<Value>,
{
    fn lookup(&mut self, name: &str) -> Result<Value> {
        self(name)
    }
}

/// Reads `<dir>/<name>.json` through the build's data cache.
///
/// A missing file gives `{}` and a warning. Malformed JSON is an error.
pub struct DirMetainfoSource<'a> {
    dir: &'a Path,
    cache: &'a mut DataCache,
}

impl<'a> DirMetainfoSource<'a> {
    pub fn new(dir: &'a Path, cache: &'a mut DataCache) -> Self {
        Self { dir, cache }
    }
}

impl MetainfoSource for DirMetainfoSource<'_> {
    fn lookup(&mut self, name: &str) -> Result<Value> {
        let path = self.dir.join(format!("{name}.json"));
        match self.cache.load_json(&path)? {
            Some(value) => Ok(Value::clone(&value)),
            None => {
                log!("warn"; "unable to read metainfo {}", path.display());
                Ok(Value::Object(Map::new()))
            }
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Build the index from the file set.
///
/// Returns `None` when no page anchors a group and no page is a plain page.
/// `supplemental` groups are added afterwards (when not already anchored)
/// and never make an otherwise empty index worth writing.
pub fn aggregate(
    files: &FileSet,
    supplemental: &[String],
    source: &mut dyn MetainfoSource,
) -> Result<Option<MetaInfoIndex>> {
    let mut index = MetaInfoIndex::default();

    for (key, entry) in files {
        let Some(name) = &entry.metainfo_key else {
            continue;
        };
        if name == PLAIN_HTML_KEY {
            log!("warn"; "{key}: `{PLAIN_HTML_KEY}` is reserved and cannot anchor a group");
            continue;
        }
        let group = MetaGroup {
            index_path: entry.path.clone(),
            permalinks: Vec::new(),
            metainfo: source.lookup(name)?,
        };
        index.groups.insert(name.clone(), group);
    }

    for entry in files.values() {
        for name in &entry.collections {
            if let Some(group) = index.groups.get_mut(name)
                && !group.permalinks.contains(&entry.path)
            {
                group.permalinks.push(entry.path.clone());
            }
        }

        if entry.plain_html {
            index.plain_html.get_or_insert_with(Vec::new).push(PlainPage {
                title: entry.title.clone().unwrap_or_default(),
                path: entry.path.clone(),
            });
        }
    }

    if index.is_empty() {
        return Ok(None);
    }

    for name in supplemental {
        if index.groups.contains_key(name) || name == PLAIN_HTML_KEY {
            continue;
        }
        let group = MetaGroup {
            index_path: String::new(),
            permalinks: Vec::new(),
            metainfo: source.lookup(name)?,
        };
        index.groups.insert(name.clone(), group);
    }

    Ok(Some(index))
}

/// Replace the index file at `path`.
pub fn write_index(index: &MetaInfoIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, index.to_json()?)
        .with_context(|| format!("Failed to write {}", path.display()))
}

// ============================================================================
// Stage
// ============================================================================

pub struct BuildMetainfo;

impl Stage for BuildMetainfo {
    fn name(&self) -> &str {
        "generate metainformation"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let settings = &ctx.config.build.metainfo;
        let index = {
            let mut cache = ctx.cache();
            let mut source = DirMetainfoSource::new(&settings.dir, &mut cache);
            aggregate(files, &settings.include_only, &mut source)?
        };

        let Some(index) = index else {
            log!("build"; "no metainfo to aggregate");
            return Ok(());
        };

        let output = ctx.config.metainfo_output();
        write_index(&index, &output)?;
        log!("build"; "metainfo: {} groups -> {}", index.groups.len(), output.display());
        Ok(())
    }
}

//! Structured data stages: site metadata and data-driven pages.

use super::{BuildContext, FileEntry, FileSet, Stage};
use crate::{
    log,
    utils::{
        params::{Lookup, has_params, resolve_with},
        slug::{normalize_key, strip_extension},
    },
};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

// ============================================================================
// Site metadata
// ============================================================================

/// Load the `[build.metadata]` JSON files into the build context.
///
/// Missing files are skipped with a warning.
pub struct LoadMetadata;

impl Stage for LoadMetadata {
    fn name(&self) -> &str {
        "inject metadata"
    }

    fn run(&mut self, _files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        for (name, rel) in &ctx.config.build.metadata {
            let path = ctx.source().join(rel);
            let loaded = ctx.cache().load_json(&path)?;
            match loaded {
                Some(value) => ctx.set_site_metadata(name, Value::clone(&value)),
                None => log!("warn"; "metadata `{name}`: {} not found", path.display()),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Data-driven pages
// ============================================================================

/// `json_files` front matter of a page template.
#[derive(Debug, Deserialize)]
struct JsonFiles {
    /// Data file name inside the data folder, `.json` optional.
    source_file: String,
    /// Output key pattern resolved against each record, e.g. `services/:slug.html`.
    filename_pattern: String,
    /// Write each page as `<name>/index.html`.
    #[serde(default)]
    as_permalink: bool,
}

impl JsonFiles {
    fn source_path(&self, data_dir: &std::path::Path) -> PathBuf {
        let path = data_dir.join(&self.source_file);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("json")
        }
    }

    fn output_key(&self, record: &Value) -> Option<String> {
        let resolved = resolve_with(&self.filename_pattern, record, true, Lookup::Prefix);
        let key = normalize_key(&resolved);
        if key.is_empty() || has_params(&key) {
            return None;
        }
        if self.as_permalink && !key.ends_with("index.html") {
            return Some(format!("{}/index.html", strip_extension(&key)));
        }
        Some(key)
    }
}

/// Replace every `json_files` template with one page per data record.
///
/// Each generated page copies the template, gets the record as `data` and
/// takes the record's `title` when the template has none.
pub struct JsonToFiles;

impl Stage for JsonToFiles {
    fn name(&self) -> &str {
        "load JSON data as files"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let templates: Vec<String> = files
            .iter()
            .filter(|(_, entry)| entry.front_matter.contains_key("json_files"))
            .map(|(key, _)| key.clone())
            .collect();

        for key in templates {
            let Some(mut template) = files.remove(&key) else {
                continue;
            };
            let settings = template.front_matter.remove("json_files").unwrap_or_default();
            let settings: JsonFiles = serde_json::from_value(settings)
                .with_context(|| format!("{key}: invalid `json_files` front matter"))?;

            let path = settings.source_path(&ctx.config.build.data);
            let Some(records) = ctx.cache().load_json(&path)? else {
                bail!("{key}: data file {} not found", path.display());
            };
            let Value::Array(records) = records.as_ref() else {
                bail!("{key}: {} must contain a JSON array", path.display());
            };

            let mut generated = 0;
            for record in records {
                let Some(out) = settings.output_key(record) else {
                    log!("warn"; "{key}: `{}` does not resolve for a record", settings.filename_pattern);
                    continue;
                };
                if files.contains_key(&out) {
                    log!("warn"; "{key}: generated {out} replaces an existing file");
                }
                files.insert(out.clone(), page_from(&template, &out, record));
                generated += 1;
            }
            log!("build"; "{key}: {generated} pages from {}", settings.source_file);
        }
        Ok(())
    }
}

fn page_from(template: &FileEntry, key: &str, record: &Value) -> FileEntry {
    let mut page = template.clone();
    page.path = key.to_owned();
    page.data = record.clone();
    if page.title.is_none()
        && let Some(title) = record.get("title").and_then(Value::as_str)
    {
        page.title = Some(title.to_owned());
    }
    page
}

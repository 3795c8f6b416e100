//! External content for data records.
//!
//! A record may name a file holding its long-form body:
//!
//! ```json
//! { "slug": "Tax Advice", "htmlExternalContent": "services/:slug.html" }
//! ```
//!
//! The pattern is resolved against the record with slugged values and the
//! file `<data>/services/tax-advice.html` is read into `htmlContent`. When the
//! file cannot be read the field holds a warning text instead, so a page
//! still renders and shows what is missing.

use super::{BuildContext, FileSet, Stage};
use crate::{
    log,
    utils::params::{Lookup, resolve_with},
};
use anyhow::Result;
use serde_json::Value;
use std::{fs, path::Path};

pub struct ExternalContent;

impl Stage for ExternalContent {
    fn name(&self) -> &str {
        "load JSON external content"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let external = &ctx.config.build.external;
        let data_dir = &ctx.config.build.data;

        for entry in files.values_mut() {
            let Some(pattern) = entry
                .data
                .get(&external.pattern_field)
                .and_then(Value::as_str)
                .filter(|pattern| !pattern.is_empty())
            else {
                continue;
            };

            let name = resolve_with(pattern, &entry.data, true, Lookup::Prefix);
            let content = read_content(data_dir, &name);
            if let Some(record) = entry.data.as_object_mut() {
                record.insert(external.content_field.clone(), Value::String(content));
            }
        }
        Ok(())
    }
}

/// File text, or a warning message when it cannot be read.
fn read_content(data_dir: &Path, name: &str) -> String {
    let path = data_dir.join(name.trim_start_matches('/'));
    fs::read_to_string(&path).unwrap_or_else(|err| {
        let msg = format!("Warn: Unable to read file {}. Error: {err}", path.display());
        log!("warn"; "{msg}");
        msg
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        pipeline::{BuildFlags, FileEntry},
    };
    use serde_json::json;
    use tempfile::TempDir;

    fn run(config: &SiteConfig, data: Value) -> Value {
        let mut entry = FileEntry::new("page.html");
        entry.data = data;
        let mut files: FileSet = [("page.html".to_owned(), entry)].into_iter().collect();

        let flags = BuildFlags::default();
        let ctx = BuildContext::new(config, &flags);
        ExternalContent.run(&mut files, &ctx).unwrap();
        files["page.html"].data.clone()
    }

    #[test]
    fn test_external_content_read() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.build.data = dir.path().to_path_buf();
        fs::create_dir_all(dir.path().join("services")).unwrap();
        fs::write(dir.path().join("services/tax-advice.html"), "<p>Tax</p>").unwrap();

        let data = run(
            &config,
            json!({"slug": "Tax Advice", "htmlExternalContent": "services/:slug.html"}),
        );
        assert_eq!(data["htmlContent"], "<p>Tax</p>");
    }

    #[test]
    fn test_external_content_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.build.data = dir.path().to_path_buf();

        let data = run(&config, json!({"htmlExternalContent": "nope/:missing.html"}));
        let content = data["htmlContent"].as_str().unwrap();
        assert!(content.starts_with("Warn: Unable to read file"));
        assert!(content.contains(":missing.html"));
    }

    #[test]
    fn test_external_content_custom_fields() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.build.data = dir.path().to_path_buf();
        config.build.external.pattern_field = "bodyFile".into();
        config.build.external.content_field = "body".into();
        fs::write(dir.path().join("about.md"), "About").unwrap();

        let data = run(&config, json!({"bodyFile": "about.md"}));
        assert_eq!(data["body"], "About");
    }

    #[test]
    fn test_external_content_ignores_records_without_pattern() {
        let config = SiteConfig::default();
        assert_eq!(run(&config, json!({"slug": "x"})), json!({"slug": "x"}));
        assert_eq!(run(&config, Value::Null), Value::Null);
    }
}

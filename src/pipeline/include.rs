//! Inline included files into their includer.
//!
//! `include: { intro: parts/intro.md }` puts the text of the matching file
//! under the `intro` front matter field, where layouts pick it up. Included
//! files are partials: by default they are removed from the set afterwards.

use super::{BuildContext, FileSet, Stage, deps::include_targets};
use crate::log;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeSet;

pub struct ExpandIncludes;

impl Stage for ExpandIncludes {
    fn name(&self) -> &str {
        "process includes"
    }

    fn run(&mut self, files: &mut FileSet, ctx: &BuildContext) -> Result<()> {
        let settings = &ctx.config.build.includes;
        let mut inlined: Vec<(String, String, String)> = Vec::new();
        let mut partials = BTreeSet::new();

        for (key, entry) in files.iter() {
            for (name, fragment) in &entry.includes {
                // ambiguity is already logged, inline the first candidate
                let Some(&target) = include_targets(files, key, fragment, settings.matching).first()
                else {
                    log!("warn"; "{key}: include `{fragment}` not found");
                    continue;
                };
                let text = String::from_utf8_lossy(&files[target].contents).into_owned();
                inlined.push((key.clone(), name.clone(), text));
                partials.insert(target.to_owned());
            }
        }

        for (key, name, text) in inlined {
            if let Some(entry) = files.get_mut(&key) {
                entry.front_matter.insert(name, Value::String(text));
            }
        }

        if settings.delete_partials {
            for key in &partials {
                files.remove(key);
            }
        }
        Ok(())
    }
}

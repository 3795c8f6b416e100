//! Parametric layouts.
//!
//! With `eval_layout: true` the `layout` field is a pattern such as
//! `layouts/:data.kind`, resolved against the file itself before the layout
//! collaborator picks a template. Every token must name a full path; values
//! are substituted raw.

use super::{BuildContext, FileSet, Stage};
use crate::{
    log,
    utils::params::{has_params, resolve},
};
use anyhow::Result;

pub struct EvalLayouts;

impl Stage for EvalLayouts {
    fn name(&self) -> &str {
        "evaluate variable layouts"
    }

    fn run(&mut self, files: &mut FileSet, _ctx: &BuildContext) -> Result<()> {
        for (key, entry) in files.iter_mut() {
            if !entry.eval_layout {
                continue;
            }
            let Some(pattern) = &entry.layout else {
                continue;
            };

            let layout = resolve(pattern, &entry.context(), false);
            if has_params(&layout) {
                log!("warn"; "{key}: layout `{layout}` has unresolved parameters");
            }
            entry.layout = Some(layout);
        }
        Ok(())
    }
}

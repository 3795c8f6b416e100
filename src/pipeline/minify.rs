//! HTML minification of rendered output.

use super::{BuildContext, FileSet, Stage};
use anyhow::Result;

pub struct MinifyHtml;

impl Stage for MinifyHtml {
    fn name(&self) -> &str {
        "minify files"
    }

    fn run(&mut self, files: &mut FileSet, _ctx: &BuildContext) -> Result<()> {
        let cfg = minify_cfg();
        for entry in files.values_mut() {
            if is_html(&entry.path) {
                entry.contents = minify_html::minify(&entry.contents, &cfg);
            }
        }
        Ok(())
    }
}

fn is_html(path: &str) -> bool {
    path.ends_with(".html") || path.ends_with(".htm")
}

fn minify_cfg() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    cfg
}

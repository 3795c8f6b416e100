//! Include dependency tracking.
//!
//! A file that includes others must be rebuilt whenever any of them changes.
//! Change detection only looks at each file's own modification time, so
//! before it runs every include group (the including file plus the files it
//! includes) is lifted to the newest time found in the group.
//!
//! # Example
//!
//! ```text
//! index.md   t=10  include: { intro: parts/intro.md }
//! parts/intro.md  t=20
//!
//! after propagate: index.md t=20, parts/intro.md t=20
//! ```
//!
//! Groups overlap when includes are chained (`a → b → c`). The max rule is
//! applied until nothing moves, so the result does not depend on the order
//! files are visited in.

use super::file::FileSet;
use crate::{
    config::IncludeMatch,
    log,
    utils::slug::{normalize_key, strip_extension},
};
use std::collections::BTreeSet;

/// Keys an include fragment may refer to, in key order.
///
/// With [`IncludeMatch::Path`] the fragment is compared on path component
/// boundaries:
///
/// 1. the key equal to the normalised fragment;
/// 2. keys ending with `/<fragment>`;
/// 3. steps 1 and 2 again with extensions stripped on both sides.
///
/// The first step that finds anything wins. With [`IncludeMatch::Substring`]
/// every key containing the fragment is returned.
pub fn resolve_include<'k>(files: &'k FileSet, fragment: &str, matching: IncludeMatch) -> Vec<&'k str> {
    let keys = || files.keys().map(String::as_str);

    if matching == IncludeMatch::Substring {
        return keys().filter(|key| key.contains(fragment)).collect();
    }

    let frag = normalize_key(fragment);
    if frag.is_empty() {
        return Vec::new();
    }
    if let Some((key, _)) = files.get_key_value(&frag) {
        return vec![key.as_str()];
    }

    let suffix = format!("/{frag}");
    let found: Vec<_> = keys().filter(|key| key.ends_with(&suffix)).collect();
    if !found.is_empty() {
        return found;
    }

    let stem = strip_extension(&frag);
    let found: Vec<_> = keys().filter(|key| strip_extension(key) == stem).collect();
    if !found.is_empty() {
        return found;
    }

    let suffix = format!("/{stem}");
    keys()
        .filter(|key| strip_extension(key).ends_with(&suffix))
        .collect()
}

/// Keys an include contributes to its group.
///
/// Ambiguous fragments are logged. Path matching keeps every candidate so a
/// group is never too small; substring matching keeps the first one.
pub fn include_targets<'k>(
    files: &'k FileSet,
    owner: &str,
    fragment: &str,
    matching: IncludeMatch,
) -> Vec<&'k str> {
    let mut candidates = resolve_include(files, fragment, matching);
    if candidates.len() > 1 {
        log!("warn"; "include `{fragment}` in {owner} matches {}", candidates.join(", "));
        if matching == IncludeMatch::Substring {
            candidates.truncate(1);
        }
    }
    candidates
}

/// Lift every include group to its newest modification time.
///
/// Returns the keys whose time moved forward, each once, in key order.
/// Unresolvable includes are ignored. Times never move backwards, and a
/// second call on the result changes nothing.
pub fn propagate(files: &mut FileSet, matching: IncludeMatch) -> Vec<String> {
    let groups: Vec<Vec<String>> = files
        .iter()
        .filter(|(_, entry)| !entry.includes.is_empty())
        .map(|(key, entry)| {
            let mut members = vec![key.clone()];
            for fragment in entry.includes.values() {
                members.extend(
                    include_targets(files, key, fragment, matching)
                        .into_iter()
                        .map(str::to_owned),
                );
            }
            members
        })
        .collect();

    let mut advanced = BTreeSet::new();
    loop {
        let mut moved = false;
        for group in &groups {
            let Some(newest) = group
                .iter()
                .filter_map(|key| files.get(key))
                .map(|entry| entry.modified_at)
                .max()
            else {
                continue;
            };

            for key in group {
                if let Some(entry) = files.get_mut(key)
                    && entry.modified_at < newest
                {
                    entry.modified_at = newest;
                    advanced.insert(key.clone());
                    moved = true;
                }
            }
        }
        if !moved {
            break;
        }
    }

    for key in &advanced {
        log!("warn"; "{key}: modification time advanced to match its includes");
    }
    advanced.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::file::FileEntry;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn entry(key: &str, secs: u64, includes: &[(&str, &str)]) -> (String, FileEntry) {
        let mut file = FileEntry::new(key);
        file.modified_at = at(secs);
        file.includes = includes
            .iter()
            .map(|(name, frag)| (name.to_string(), frag.to_string()))
            .collect();
        (key.to_owned(), file)
    }

    fn set(entries: Vec<(String, FileEntry)>) -> FileSet {
        entries.into_iter().collect()
    }

    #[test]
    fn test_resolve_include_exact_and_suffix() {
        let files = set(vec![
            entry("parts/intro.md", 0, &[]),
            entry("blog/parts/intro.md", 0, &[]),
            entry("index.md", 0, &[]),
        ]);

        assert_eq!(
            resolve_include(&files, "parts/intro.md", IncludeMatch::Path),
            vec!["parts/intro.md"]
        );
        assert_eq!(
            resolve_include(&files, "./index.md", IncludeMatch::Path),
            vec!["index.md"]
        );
        assert_eq!(
            resolve_include(&files, "intro.md", IncludeMatch::Path),
            vec!["blog/parts/intro.md", "parts/intro.md"]
        );
    }

    #[test]
    fn test_resolve_include_component_boundary() {
        let files = set(vec![entry("parts/myintro.md", 0, &[])]);
        assert!(resolve_include(&files, "intro.md", IncludeMatch::Path).is_empty());
        assert_eq!(
            resolve_include(&files, "intro.md", IncludeMatch::Substring),
            vec!["parts/myintro.md"]
        );
    }

    #[test]
    fn test_resolve_include_ignores_extension() {
        // markdown may already have renamed `.md` to `.html`
        let files = set(vec![entry("parts/intro.html", 0, &[])]);
        assert_eq!(
            resolve_include(&files, "parts/intro.md", IncludeMatch::Path),
            vec!["parts/intro.html"]
        );
        assert_eq!(
            resolve_include(&files, "intro", IncludeMatch::Path),
            vec!["parts/intro.html"]
        );
    }

    #[test]
    fn test_propagate_basic() {
        let mut files = set(vec![
            entry("a.md", 10, &[("part", "b.md")]),
            entry("b.md", 20, &[]),
        ]);

        let advanced = propagate(&mut files, IncludeMatch::Path);
        assert_eq!(advanced, vec!["a.md"]);
        assert_eq!(files["a.md"].modified_at, at(20));
        assert_eq!(files["b.md"].modified_at, at(20));
    }

    #[test]
    fn test_propagate_closure_takes_max() {
        let mut files = set(vec![
            entry("a.md", 10, &[("first", "b.md"), ("second", "c.md")]),
            entry("b.md", 50, &[]),
            entry("c.md", 20, &[]),
        ]);

        let advanced = propagate(&mut files, IncludeMatch::Path);
        assert_eq!(advanced, vec!["a.md", "c.md"]);
        for key in ["a.md", "b.md", "c.md"] {
            assert_eq!(files[key].modified_at, at(50));
        }

        let before = files.clone();
        assert!(propagate(&mut files, IncludeMatch::Path).is_empty());
        assert_eq!(files, before);
    }

    #[test]
    fn test_propagate_never_decreases() {
        let mut files = set(vec![
            entry("a.md", 30, &[("part", "b.md")]),
            entry("b.md", 20, &[]),
        ]);

        propagate(&mut files, IncludeMatch::Path);
        assert_eq!(files["a.md"].modified_at, at(30));
        assert_eq!(files["b.md"].modified_at, at(30));
    }

    #[test]
    fn test_propagate_unresolved_include_is_skipped() {
        let mut files = set(vec![entry("a.md", 10, &[("part", "missing.md")])]);

        let advanced = propagate(&mut files, IncludeMatch::Path);
        assert!(advanced.is_empty());
        assert_eq!(files["a.md"].modified_at, at(10));
    }

    #[test]
    fn test_propagate_chained_includes_reach_fixpoint() {
        // a includes b, b includes c; visiting a first would miss c's time
        // without iterating
        let mut files = set(vec![
            entry("a.md", 1, &[("b", "b.md")]),
            entry("b.md", 2, &[("c", "c.md")]),
            entry("c.md", 50, &[]),
        ]);

        let advanced = propagate(&mut files, IncludeMatch::Path);
        assert_eq!(advanced, vec!["a.md", "b.md"]);
        for key in ["a.md", "b.md", "c.md"] {
            assert_eq!(files[key].modified_at, at(50));
        }
    }

    #[test]
    fn test_propagate_order_independent() {
        let build = |names: [&str; 3]| {
            set(vec![
                entry(names[0], 5, &[("x", names[1])]),
                entry(names[1], 7, &[("y", names[2])]),
                entry(names[2], 9, &[]),
            ])
        };

        let mut forward = build(["a.md", "b.md", "c.md"]);
        let mut backward = build(["z.md", "y.md", "x.md"]);
        propagate(&mut forward, IncludeMatch::Path);
        propagate(&mut backward, IncludeMatch::Path);

        assert!(forward.values().all(|e| e.modified_at == at(9)));
        assert!(backward.values().all(|e| e.modified_at == at(9)));
    }

    #[test]
    fn test_propagate_ambiguous_include_joins_all_candidates() {
        let mut files = set(vec![
            entry("index.md", 1, &[("intro", "intro.md")]),
            entry("blog/intro.md", 3, &[]),
            entry("docs/intro.md", 8, &[]),
        ]);

        propagate(&mut files, IncludeMatch::Path);
        assert_eq!(files["index.md"].modified_at, at(8));
        assert_eq!(files["blog/intro.md"].modified_at, at(8));
    }

    #[test]
    fn test_propagate_substring_takes_first_match() {
        let mut files = set(vec![
            entry("index.md", 1, &[("intro", "intro")]),
            entry("blog/intro.md", 3, &[]),
            entry("docs/intro.md", 8, &[]),
        ]);

        propagate(&mut files, IncludeMatch::Substring);
        assert_eq!(files["index.md"].modified_at, at(3));
        assert_eq!(files["docs/intro.md"].modified_at, at(8));
    }

    #[test]
    fn test_propagate_is_idempotent() {
        let mut files = set(vec![
            entry("a.md", 10, &[("part", "b.md")]),
            entry("b.md", 20, &[("part", "c.md")]),
            entry("c.md", 5, &[]),
        ]);

        propagate(&mut files, IncludeMatch::Path);
        let snapshot = files.clone();
        assert!(propagate(&mut files, IncludeMatch::Path).is_empty());
        assert_eq!(files, snapshot);
    }
}

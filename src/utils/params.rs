//! `:token.path` parameter substitution.
//!
//! Patterns such as `layouts/:data.kind` or `services/:slug.html` name
//! values inside a JSON context. A token is `:` followed by one or more
//! `[A-Za-z0-9_]+` segments joined by `.`.
//!
//! Resolution rules:
//!
//! - [`Lookup::Exact`] (the default) needs the whole dotted path to name a
//!   usable value, otherwise the token stays as is;
//! - [`Lookup::Prefix`] takes the longest leading run of segments naming a
//!   usable value and keeps the remaining `.segment` text literal
//!   (`:slug.html` → `intro.html`);
//! - missing, `null`, empty-string and object values leave the token as is;
//! - strings substitute raw, numbers and booleans by display form, arrays of
//!   scalars joined with `,`.
//!
//! Unresolved tokens are not an error. A value is never substituted when the
//! result would contain a new token, so resolving twice gives the same
//! string in raw and slugged mode alike.

use super::slug::slugify;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)").expect("token pattern is valid")
});

/// How much of a dotted token path must resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lookup {
    /// The full path names the value.
    #[default]
    Exact,
    /// The longest resolvable prefix names the value, the rest is literal.
    Prefix,
}

/// Substitute every token of `pattern` whose full path resolves in `context`.
pub fn resolve(pattern: &str, context: &Value, slugify_values: bool) -> String {
    resolve_with(pattern, context, slugify_values, Lookup::Exact)
}

/// Substitute every resolvable token of `pattern` using the given lookup mode.
pub fn resolve_with(pattern: &str, context: &Value, slugify_values: bool, lookup: Lookup) -> String {
    TOKEN
        .replace_all(pattern, |caps: &Captures| {
            let token = &caps[0];
            let found = match lookup {
                Lookup::Exact => lookup_exact(context, &caps[1]).map(|value| (value, "")),
                Lookup::Prefix => lookup_prefix(context, &caps[1]),
            };
            let Some((value, rest)) = found else {
                return token.to_owned();
            };

            let value = if slugify_values { slugify(&value) } else { value };
            let after_colon = pattern[..caps.get(0).map_or(0, |m| m.start())].ends_with(':');
            if value.is_empty() || has_params(&value) || (after_colon && starts_token(&value)) {
                return token.to_owned();
            }
            format!("{value}{rest}")
        })
        .into_owned()
}

/// Dotted paths of all tokens in `pattern`, in order of appearance.
pub fn params(pattern: &str) -> Vec<&str> {
    TOKEN
        .captures_iter(pattern)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// True when `pattern` still contains at least one token.
pub fn has_params(pattern: &str) -> bool {
    TOKEN.is_match(pattern)
}

/// Value named by the whole dotted `path`.
fn lookup_exact(context: &Value, path: &str) -> Option<String> {
    let mut current = context;
    for segment in path.split('.') {
        current = step(current, segment)?;
    }
    stringify(current)
}

/// Find the longest prefix of `path` naming a scalar value.
///
/// Returns the stringified value and the unconsumed `.rest` of the path.
fn lookup_prefix<'p>(context: &Value, path: &'p str) -> Option<(String, &'p str)> {
    let mut best = None;
    let mut current = context;

    for (end, segment) in segment_ends(path) {
        let Some(next) = step(current, segment) else {
            break;
        };
        current = next;
        if let Some(text) = stringify(current) {
            best = Some((text, &path[end..]));
        }
    }

    best
}

/// Descend one path segment into an object or array.
fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

/// A `:` right before this text would form a token.
fn starts_token(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
}

/// Segments of a dotted path with the byte offset where each one ends.
fn segment_ends(path: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    path.split('.').map(move |segment| {
        let end = offset + segment.len();
        offset = end + 1;
        (end, segment)
    })
}

/// String form of a usable value, `None` for empty ones.
fn stringify(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null | Value::Object(_) => return None,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Bool(_) | Value::Number(_) => Some(item.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?
            .join(","),
    };
    (!text.is_empty()).then_some(text)
}

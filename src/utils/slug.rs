//! URL slugification and key normalisation.

use deunicode::deunicode;

/// Convert text to a URL-safe slug.
///
/// Non-ASCII text is transliterated first, then every run of characters
/// outside `[a-z0-9]` collapses into a single `-`.
///
/// `"Hello World!"` → `"hello-world"`, `"你好"` → `"ni-hao"`
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Normalise a file key for comparison: forward slashes, no leading `./`
/// or `/`, no duplicated separators.
pub fn normalize_key(key: &str) -> String {
    key.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip the extension of the last path component, if any.
///
/// `"parts/intro.md"` → `"parts/intro"`, `"parts/.hidden"` stays unchanged.
pub fn strip_extension(key: &str) -> &str {
    let name_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &key[..name_start + dot],
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
    }

    #[test]
    fn test_slugify_keeps_digits() {
        assert_eq!(slugify("Part 2 of 10"), "part-2-of-10");
        assert_eq!(slugify("2024"), "2024");
    }

    #[test]
    fn test_slugify_transliterates() {
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("你好"), "ni-hao");
    }

    #[test]
    fn test_slugify_strips_token_characters() {
        // slugged values never contain ':' so they cannot form new tokens
        assert_eq!(slugify("a:b.c"), "a-b-c");
        assert_eq!(slugify(":::"), "");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("./parts/intro.md"), "parts/intro.md");
        assert_eq!(normalize_key("parts\\intro.md"), "parts/intro.md");
        assert_eq!(normalize_key("/parts//intro.md"), "parts/intro.md");
        assert_eq!(normalize_key("intro.md"), "intro.md");
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("parts/intro.md"), "parts/intro");
        assert_eq!(strip_extension("parts/intro"), "parts/intro");
        assert_eq!(strip_extension("a.b/intro"), "a.b/intro");
        assert_eq!(strip_extension("parts/.hidden"), "parts/.hidden");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
    }
}

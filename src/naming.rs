//! Path-derived names for documents.
//!
//! A document's identity is derived entirely from its vault-relative path
//! (`/`-separated, extension stripped):
//!
//! | Input `posts/Hello-World.md` | Value |
//! |------------------------------|-------|
//! | `rel_no_ext` | `posts/Hello-World` |
//! | id | `posts__Hello-World` |
//! | natural route | `/posts/Hello-World/` |
//! | content file | `content/<sha256(id)>.html` |
//! | fallback title | `Hello World` |
//!
//! Ids are filesystem- and URL-safe, routes always carry a leading and
//! trailing slash. Ordering for display uses [`locale_cmp`] rather than raw
//! codepoint order so accented and non-Latin names sort the way people
//! expect.

use crate::hashing::hash_bytes;
use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Title used when a filename has no usable words.
pub const UNTITLED: &str = "Untitled";

/// Strip a trailing `.md` extension (any case).
pub fn strip_md_ext(path: &str) -> &str {
    let len = path.len();
    if len >= 3 && path.is_char_boundary(len - 3) && path[len - 3..].eq_ignore_ascii_case(".md") {
        &path[..len - 3]
    } else {
        path
    }
}

/// Document id: path separators replaced by `__`.
pub fn to_doc_id(rel_no_ext: &str) -> String {
    rel_no_ext.replace('/', "__")
}

/// Natural route of a document before collision resolution.
pub fn to_route(rel_no_ext: &str) -> String {
    format!("/{}/", rel_no_ext)
}

/// Content fragment file name, content-addressed by id (not route) so it
/// survives route changes.
pub fn content_file_name(id: &str) -> String {
    format!("{}.html", hash_bytes(id))
}

/// Content fragment name used by cache format versions before hashing.
pub fn legacy_content_file_name(id: &str) -> String {
    format!("{}.html", id)
}

/// Output path of a route's shell page, relative to the output root.
///
/// - `/` → `index.html`
/// - `/posts/hello/` → `posts/hello/index.html`
pub fn route_output_path(route: &str) -> String {
    let clean = route_dir(route);
    if clean.is_empty() {
        "index.html".to_string()
    } else {
        format!("{}/index.html", clean)
    }
}

/// Route with surrounding slashes removed (`/a/b/` → `a/b`).
pub fn route_dir(route: &str) -> &str {
    route.trim_start_matches('/').trim_end_matches('/')
}

/// Append `-<suffix>` to the last segment of a route.
///
/// - `/posts/hello/` + `abc123` → `/posts/hello-abc123/`
/// - `/` + `abc123` → `/abc123/`
pub fn append_route_suffix(route: &str, suffix: &str) -> String {
    let clean = route_dir(route);
    if clean.is_empty() {
        return format!("/{}/", suffix);
    }
    match clean.rsplit_once('/') {
        Some((parent, last)) => format!("/{}/{}-{}/", parent, last, suffix),
        None => format!("/{}-{}/", clean, suffix),
    }
}

/// Derive a display title from a filename.
///
/// `.md` is stripped, runs of `-` and `_` become spaces, and each word gets
/// an uppercase first letter (the rest of the word is left alone).
///
/// - `hello-world.md` → `Hello World`
/// - `my__notes_v2.md` → `My Notes V2`
/// - `---.md` → `Untitled`
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = strip_md_ext(file_name);
    let spaced: String = stem
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    let words: Vec<String> = spaced.split_whitespace().map(capitalize).collect();
    if words.is_empty() {
        UNTITLED.to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Last path segment of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Normalize a wikilink target for lookup.
///
/// Trims, converts `\` to `/`, strips one leading `./` or `/`, strips a
/// trailing `.md`, and lowercases.
pub fn normalize_link_target(input: &str) -> String {
    let unified = input.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    if let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_prefix('/') {
        rest = stripped;
    }
    strip_md_ext(rest).to_lowercase()
}

/// Locale-aware comparison for display ordering.
///
/// Primary comparison ignores case and diacritics (compatibility
/// decomposition with combining marks dropped); Hangul syllables decompose to
/// jamo, which keeps them in dictionary order. Strings equal at the primary
/// level fall back to codepoint order so the result is a total order.
pub fn locale_cmp(left: &str, right: &str) -> Ordering {
    collation_key(left)
        .cmp(collation_key(right))
        .then_with(|| left.cmp(right))
}

fn collation_key(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Identity and routes
    // =========================================================================

    #[test]
    fn strip_md_ext_any_case() {
        assert_eq!(strip_md_ext("a/b.md"), "a/b");
        assert_eq!(strip_md_ext("a/b.MD"), "a/b");
        assert_eq!(strip_md_ext("a/b.markdown"), "a/b.markdown");
        assert_eq!(strip_md_ext("md"), "md");
    }

    #[test]
    fn doc_id_replaces_separators() {
        assert_eq!(to_doc_id("posts/2024/hello"), "posts__2024__hello");
        assert_eq!(to_doc_id("hello"), "hello");
    }

    #[test]
    fn route_has_leading_and_trailing_slash() {
        assert_eq!(to_route("posts/hello"), "/posts/hello/");
    }

    #[test]
    fn content_file_name_is_hash_of_id() {
        let name = content_file_name("posts__hello");
        assert!(name.ends_with(".html"));
        assert_eq!(name.len(), 64 + 5);
        assert_eq!(name, content_file_name("posts__hello"));
        assert_ne!(name, content_file_name("posts__world"));
    }

    #[test]
    fn route_output_paths() {
        assert_eq!(route_output_path("/"), "index.html");
        assert_eq!(route_output_path("/a/b/"), "a/b/index.html");
    }

    #[test]
    fn suffix_goes_on_last_segment() {
        assert_eq!(append_route_suffix("/posts/hello/", "abc"), "/posts/hello-abc/");
        assert_eq!(append_route_suffix("/index/", "abc"), "/index-abc/");
        assert_eq!(append_route_suffix("/", "abc"), "/abc/");
    }

    // =========================================================================
    // Titles
    // =========================================================================

    #[test]
    fn title_from_dashed_name() {
        assert_eq!(title_from_file_name("hello-world.md"), "Hello World");
    }

    #[test]
    fn title_collapses_separator_runs() {
        assert_eq!(title_from_file_name("my__notes_-v2.md"), "My Notes V2");
    }

    #[test]
    fn title_keeps_inner_case() {
        assert_eq!(title_from_file_name("iOS-tips.md"), "IOS Tips");
        assert_eq!(title_from_file_name("rustFMT.md"), "RustFMT");
    }

    #[test]
    fn title_placeholder_for_empty_stem() {
        assert_eq!(title_from_file_name("--_.md"), UNTITLED);
        assert_eq!(title_from_file_name(".md"), UNTITLED);
    }

    #[test]
    fn title_non_ascii() {
        assert_eq!(title_from_file_name("été-à-paris.md"), "Été À Paris");
        assert_eq!(title_from_file_name("한글-노트.md"), "한글 노트");
    }

    // =========================================================================
    // Link targets
    // =========================================================================

    #[test]
    fn normalize_link_target_variants() {
        assert_eq!(normalize_link_target("  World "), "world");
        assert_eq!(normalize_link_target("./posts/World.md"), "posts/world");
        assert_eq!(normalize_link_target("/posts/World"), "posts/world");
        assert_eq!(normalize_link_target("posts\\World.MD"), "posts/world");
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn locale_cmp_is_case_insensitive_first() {
        let mut names = vec!["beta", "Alpha", "alpha", "Gamma"];
        names.sort_by(|a, b| locale_cmp(a, b));
        assert_eq!(names, vec!["Alpha", "alpha", "beta", "Gamma"]);
    }

    #[test]
    fn locale_cmp_ignores_accents_at_primary_level() {
        let mut names = vec!["zebra", "éclair", "eagle"];
        names.sort_by(|a, b| locale_cmp(a, b));
        assert_eq!(names, vec!["eagle", "éclair", "zebra"]);
    }

    #[test]
    fn locale_cmp_orders_hangul() {
        let mut names = vec!["하늘", "가방", "나무"];
        names.sort_by(|a, b| locale_cmp(a, b));
        assert_eq!(names, vec!["가방", "나무", "하늘"]);
    }

    #[test]
    fn locale_cmp_total_order_on_ties() {
        assert_ne!(locale_cmp("A", "a"), Ordering::Equal);
        assert_eq!(locale_cmp("same", "same"), Ordering::Equal);
    }
}

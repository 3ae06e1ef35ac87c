//! Persisted build cache for incremental builds.
//!
//! Parsing markdown is cheap compared to rendering it, and rendering is cheap
//! compared to rewriting hundreds of unchanged files and invalidating every
//! CDN edge that serves them. The build cache lets each stage skip work
//! whose inputs have not changed since the previous run.
//!
//! # Design
//!
//! The cache has three sections, each owned by a different stage:
//!
//! - **`sources`**: source path → stat + parsed content. See
//!   [`source_cache`](crate::source_cache).
//! - **`docs`**: doc id → render fingerprint, route, rel path. Gates the
//!   markdown renderer and tells the garbage collector what existed before.
//! - **`outputHashes`**: output path → hash of the bytes last written. See
//!   [`writer`](crate::writer).
//!
//! ## Render fingerprint
//!
//! A document is re-rendered only when its fingerprint changes:
//!
//! ```text
//! sha256(raw_hash :: route :: theme :: image policy :: wikilinks-on|off :: signature)
//! ```
//!
//! The signature lists where every outgoing wikilink currently resolves, so
//! renaming a target re-renders the documents pointing at it while editing a
//! target's title does not.
//!
//! ## Storage
//!
//! The cache is a JSON file at `<cache_dir>/build-index.json`. All maps are
//! ordered, so the same state always serializes to the same bytes.
//!
//! ## Schema evolution
//!
//! Every version is looked up in [`VERSION_TABLE`]. Anything other than the
//! current version, including versions this build has never heard of, loads
//! as an empty cache. Within a current-version file, malformed entries are
//! dropped one by one instead of discarding the whole cache.

use crate::hashing::Fingerprint;
use crate::source_cache::{SourceCache, SourceCacheEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache file within the cache directory.
const CACHE_FILENAME: &str = "build-index.json";

/// Version of the cache format. Bump this to invalidate all existing caches
/// when the format or key computation changes.
pub const CACHE_VERSION: u32 = 3;

/// How a stored cache version is treated on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Current,
    Discard,
}

/// Known cache versions. Unlisted versions are discarded.
pub const VERSION_TABLE: &[(u64, Compatibility)] = &[
    (1, Compatibility::Discard),
    (2, Compatibility::Discard),
    (3, Compatibility::Current),
];

pub fn compatibility(version: u64) -> Compatibility {
    VERSION_TABLE
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, compat)| *compat)
        .unwrap_or(Compatibility::Discard)
}

/// Render-cache record for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderCacheEntry {
    /// Render fingerprint.
    pub hash: String,
    pub route: String,
    pub rel_path: String,
}

/// On-disk build cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCache {
    pub version: u32,
    pub sources: SourceCache,
    pub docs: BTreeMap<String, RenderCacheEntry>,
    pub output_hashes: BTreeMap<String, String>,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl BuildCache {
    /// Create an empty cache (first build or discarded cache).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            sources: BTreeMap::new(),
            docs: BTreeMap::new(),
            output_hashes: BTreeMap::new(),
        }
    }

    /// Load from the cache directory. Returns an empty cache if the file
    /// doesn't exist, can't be parsed, or has a non-current version.
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_path(cache_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match Self::parse(&content) {
            Some(cache) => cache,
            None => {
                tracing::debug!("discarding unusable build cache at {}", path.display());
                Self::empty()
            }
        }
    }

    /// Tolerant parse of cache JSON. `None` when the document as a whole is
    /// unusable.
    pub fn parse(content: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(content).ok()?;
        let object = value.as_object()?;
        let version = object.get("version")?.as_u64()?;
        if compatibility(version) != Compatibility::Current {
            tracing::debug!("build cache version {} is not current", version);
            return None;
        }

        Some(Self {
            version: CACHE_VERSION,
            sources: entries::<SourceCacheEntry>(object.get("sources")),
            docs: entries::<RenderCacheEntry>(object.get("docs")),
            output_hashes: entries::<String>(object.get("outputHashes")),
        })
    }

    /// Save to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(cache_path(cache_dir), json)
    }
}

/// Deserialize each entry of a JSON object on its own, dropping malformed ones.
fn entries<T: DeserializeOwned>(value: Option<&Value>) -> BTreeMap<String, T> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(key, raw)| match serde_json::from_value::<T>(raw.clone()) {
            Ok(entry) => Some((key.clone(), entry)),
            Err(e) => {
                tracing::debug!("dropping malformed cache entry {}: {}", key, e);
                None
            }
        })
        .collect()
}

/// Resolve the cache file path for a cache directory.
pub fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILENAME)
}

/// Inputs to the render fingerprint besides the document itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderKey<'a> {
    pub theme: &'a str,
    pub image_policy: &'a str,
    pub wikilinks: bool,
    pub gfm: bool,
}

/// Composite render fingerprint of one document.
pub fn render_fingerprint(raw_hash: &str, route: &str, key: RenderKey<'_>, signature: &str) -> String {
    Fingerprint::new()
        .part(raw_hash)
        .part(route)
        .part(key.theme)
        .part(key.image_policy)
        .part(if key.wikilinks { "wikilinks-on" } else { "wikilinks-off" })
        .part(if key.gfm { "gfm-on" } else { "gfm-off" })
        .part(signature)
        .finish()
}

/// Whether the previous render of `id` can be reused.
///
/// Both the render cache and the output ledger for the content file must
/// agree on the fingerprint.
pub fn render_is_fresh(previous: &BuildCache, id: &str, content_rel: &str, fingerprint: &str) -> bool {
    previous.docs.get(id).is_some_and(|entry| entry.hash == fingerprint)
        && previous
            .output_hashes
            .get(content_rel)
            .is_some_and(|hash| hash == fingerprint)
}

/// Summary of render-cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: u32,
    pub skipped: u32,
}

impl RenderStats {
    pub fn render(&mut self) {
        self.rendered += 1;
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn total(&self) -> u32 {
        self.rendered + self.skipped
    }
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} rendered={} skipped={}",
            self.total(),
            self.rendered,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_cache::parse_source;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> BuildCache {
        let mut cache = BuildCache::empty();
        cache
            .sources
            .insert("a.md".into(), parse_source("---\npublish: true\n---\nA").unwrap());
        cache.docs.insert(
            "a".into(),
            RenderCacheEntry {
                hash: "fp".into(),
                route: "/a/".into(),
                rel_path: "a.md".into(),
            },
        );
        cache.output_hashes.insert("content/x.html".into(), "fp".into());
        cache
    }

    // =========================================================================
    // Load / save
    // =========================================================================

    #[test]
    fn empty_cache_is_current_version() {
        let cache = BuildCache::empty();
        assert_eq!(cache.version, CACHE_VERSION);
        assert!(cache.sources.is_empty());
        assert!(cache.docs.is_empty());
        assert!(cache.output_hashes.is_empty());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let cache = sample();
        cache.save(tmp.path()).unwrap();
        assert_eq!(BuildCache::load(tmp.path()), cache);
    }

    #[test]
    fn save_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/.cache");
        BuildCache::empty().save(&dir).unwrap();
        assert!(cache_path(&dir).exists());
    }

    #[test]
    fn save_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        sample().save(tmp.path()).unwrap();
        let first = fs::read(cache_path(tmp.path())).unwrap();
        BuildCache::load(tmp.path()).save(tmp.path()).unwrap();
        let second = fs::read(cache_path(tmp.path())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"outputHashes\""));
        assert!(json.contains("\"relPath\""));
        assert!(json.contains("\"rawHash\""));
        assert!(json.contains("\"wikiTargets\""));
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(BuildCache::load(tmp.path()), BuildCache::empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(cache_path(tmp.path()), "{not json").unwrap();
        assert_eq!(BuildCache::load(tmp.path()), BuildCache::empty());
    }

    #[test]
    fn load_non_object_returns_empty() {
        assert!(BuildCache::parse("[1,2,3]").is_none());
        assert!(BuildCache::parse("{\"sources\":{}}").is_none());
    }

    // =========================================================================
    // Versions
    // =========================================================================

    #[test]
    fn old_and_unknown_versions_are_discarded() {
        for version in [1, 2, 4, 99] {
            let json = format!("{{\"version\":{},\"sources\":{{}},\"docs\":{{}},\"outputHashes\":{{}}}}", version);
            assert!(BuildCache::parse(&json).is_none(), "version {}", version);
        }
    }

    #[test]
    fn version_table_lookup() {
        assert_eq!(compatibility(3), Compatibility::Current);
        assert_eq!(compatibility(2), Compatibility::Discard);
        assert_eq!(compatibility(12345), Compatibility::Discard);
    }

    // =========================================================================
    // Tolerant entries
    // =========================================================================

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let json = r#"{
            "version": 3,
            "sources": {
                "ok.md": {"mtimeNs": 1, "size": 2, "rawHash": "h", "body": "b"},
                "bad.md": {"mtimeNs": "nope"}
            },
            "docs": {
                "ok": {"hash": "fp", "route": "/ok/", "relPath": "ok.md"},
                "bad": 42
            },
            "outputHashes": {"a.html": "h1", "b.html": 7}
        }"#;
        let cache = BuildCache::parse(json).unwrap();
        assert_eq!(cache.sources.keys().collect::<Vec<_>>(), vec!["ok.md"]);
        assert_eq!(cache.docs.keys().collect::<Vec<_>>(), vec!["ok"]);
        assert_eq!(cache.output_hashes.keys().collect::<Vec<_>>(), vec!["a.html"]);
    }

    #[test]
    fn missing_sections_are_empty() {
        let cache = BuildCache::parse("{\"version\":3}").unwrap();
        assert_eq!(cache, BuildCache::empty());
    }

    // =========================================================================
    // Render fingerprint
    // =========================================================================

    const KEY: RenderKey<'static> = RenderKey {
        theme: "github-dark",
        image_policy: "omit-local",
        wikilinks: true,
        gfm: true,
    };

    #[test]
    fn fingerprint_depends_on_every_input() {
        let base = render_fingerprint("raw", "/a/", KEY, "sig");
        assert_eq!(base, render_fingerprint("raw", "/a/", KEY, "sig"));
        assert_ne!(base, render_fingerprint("raw2", "/a/", KEY, "sig"));
        assert_ne!(base, render_fingerprint("raw", "/b/", KEY, "sig"));
        assert_ne!(base, render_fingerprint("raw", "/a/", KEY, "sig2"));
        assert_ne!(
            base,
            render_fingerprint("raw", "/a/", RenderKey { theme: "light", ..KEY }, "sig")
        );
        assert_ne!(
            base,
            render_fingerprint("raw", "/a/", RenderKey { image_policy: "keep", ..KEY }, "sig")
        );
        assert_ne!(
            base,
            render_fingerprint("raw", "/a/", RenderKey { wikilinks: false, ..KEY }, "sig")
        );
        assert_ne!(
            base,
            render_fingerprint("raw", "/a/", RenderKey { gfm: false, ..KEY }, "sig")
        );
    }

    #[test]
    fn render_fresh_requires_both_ledgers() {
        let cache = sample();
        assert!(render_is_fresh(&cache, "a", "content/x.html", "fp"));
        assert!(!render_is_fresh(&cache, "a", "content/x.html", "other"));
        assert!(!render_is_fresh(&cache, "a", "content/y.html", "fp"));
        assert!(!render_is_fresh(&cache, "b", "content/x.html", "fp"));
    }

    // =========================================================================
    // RenderStats
    // =========================================================================

    #[test]
    fn stats_display() {
        let mut stats = RenderStats::default();
        stats.render();
        stats.skip();
        stats.skip();
        assert_eq!(stats.to_string(), "total=3 rendered=1 skipped=2");
    }
}

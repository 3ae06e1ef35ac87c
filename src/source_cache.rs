//! Source cache: stat-gated reuse of parsed markdown.
//!
//! Reading and parsing every note on every build is wasted work when most of
//! the vault is unchanged. The source cache remembers, per vault-relative
//! path, the file's `(mtime, size)` at the time it was parsed together with
//! everything parsing produced: frontmatter fields, body, raw-content hash
//! and wikilink targets.
//!
//! On the next build each discovered file is looked up:
//!
//! - [`Lookup::Fresh`]: stored `(mtime, size)` equals the fresh stat, so the
//!   parsed content is reused verbatim without touching the file.
//! - [`Lookup::Stale`]: an entry exists but the stat differs; re-read.
//! - [`Lookup::Absent`]: never seen; read and parse.
//!
//! The refreshed cache covers exactly the current file set, so entries for
//! deleted files fall out naturally. The stored stat is always the fresh one,
//! even for reused entries.

use crate::frontmatter;
use crate::hashing::hash_bytes;
use crate::naming::{locale_cmp, normalize_link_target};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wikilink regex"));

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Frontmatter parse failed: {path}\n{source}")]
    Frontmatter {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// File-system stat pair that gates reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStat {
    /// Modification time, nanoseconds since the Unix epoch.
    pub mtime_ns: u64,
    pub size: u64,
}

/// A markdown file discovered in the vault.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub source_path: PathBuf,
    /// Vault-relative, `/`-separated.
    pub rel_path: String,
    pub stat: SourceStat,
}

/// Parsed content of one source file plus the stat it was parsed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCacheEntry {
    pub mtime_ns: u64,
    pub size: u64,
    pub raw_hash: String,
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub branch: Option<String>,
    pub body: String,
    #[serde(default)]
    pub wiki_targets: Vec<String>,
}

impl SourceCacheEntry {
    pub fn stat(&self) -> SourceStat {
        SourceStat {
            mtime_ns: self.mtime_ns,
            size: self.size,
        }
    }

    /// Published and not a draft.
    pub fn is_publishable(&self) -> bool {
        self.publish && !self.draft
    }
}

/// Persisted map from vault-relative path to its cache entry.
pub type SourceCache = BTreeMap<String, SourceCacheEntry>;

/// Why an existing entry could not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Modified,
    Resized,
}

/// Outcome of looking a discovered file up in the previous cache.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    Fresh(&'a SourceCacheEntry),
    Stale(StaleReason),
    Absent,
}

pub fn lookup<'a>(cache: &'a SourceCache, file: &SourceFile) -> Lookup<'a> {
    match cache.get(&file.rel_path) {
        None => Lookup::Absent,
        Some(entry) if entry.mtime_ns != file.stat.mtime_ns => Lookup::Stale(StaleReason::Modified),
        Some(entry) if entry.size != file.stat.size => Lookup::Stale(StaleReason::Resized),
        Some(entry) => Lookup::Fresh(entry),
    }
}

/// Result of refreshing the cache against the current file set.
#[derive(Debug, Default)]
pub struct Refreshed {
    pub cache: SourceCache,
    pub reused: usize,
    pub parsed: usize,
}

/// Build the cache for the current file set, reusing fresh entries.
///
/// Any frontmatter parse failure aborts with the offending path.
pub fn refresh(previous: &SourceCache, files: &[SourceFile]) -> Result<Refreshed, SourceError> {
    let mut out = Refreshed::default();

    for file in files {
        let mut entry = match lookup(previous, file) {
            Lookup::Fresh(entry) => {
                out.reused += 1;
                entry.clone()
            }
            Lookup::Stale(reason) => {
                tracing::debug!("source {} stale ({:?}), re-parsing", file.rel_path, reason);
                out.parsed += 1;
                read_and_parse(file)?
            }
            Lookup::Absent => {
                out.parsed += 1;
                read_and_parse(file)?
            }
        };
        entry.mtime_ns = file.stat.mtime_ns;
        entry.size = file.stat.size;
        out.cache.insert(file.rel_path.clone(), entry);
    }

    Ok(out)
}

/// Invalid UTF-8 is decoded lossily; the raw hash is always over the bytes
/// on disk.
fn read_and_parse(file: &SourceFile) -> Result<SourceCacheEntry, SourceError> {
    let bytes = std::fs::read(&file.source_path).map_err(|source| SourceError::Io {
        path: file.rel_path.clone(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    if let Cow::Owned(_) = text {
        tracing::debug!("{} is not valid UTF-8, decoding lossily", file.rel_path);
    }
    let mut entry = parse_source(&text).map_err(|source| SourceError::Frontmatter {
        path: file.rel_path.clone(),
        source,
    })?;
    entry.raw_hash = hash_bytes(&bytes);
    Ok(entry)
}

/// Parse raw source text into a cache entry with a zeroed stat.
pub fn parse_source(raw: &str) -> Result<SourceCacheEntry, serde_yaml::Error> {
    let fields = frontmatter::parse(raw)?;
    let wiki_targets = extract_wiki_targets(&fields.body);

    Ok(SourceCacheEntry {
        mtime_ns: 0,
        size: 0,
        raw_hash: hash_bytes(raw),
        publish: fields.publish,
        draft: fields.draft,
        title: fields.title,
        prefix: fields.prefix,
        date: fields.date,
        updated_date: fields.updated_date,
        description: fields.description,
        tags: fields.tags,
        branch: fields.branch,
        body: fields.body,
        wiki_targets,
    })
}

/// Normalized, deduplicated wikilink targets of a markdown body.
///
/// Embeds (`![[...]]`) are skipped; only the part before `|` is a target.
pub fn extract_wiki_targets(markdown: &str) -> Vec<String> {
    let mut targets: Vec<String> = WIKILINK_RE
        .captures_iter(markdown)
        .filter(|caps| {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            !markdown[..start].ends_with('!')
        })
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str().trim();
            let raw_target = inner.split('|').next().unwrap_or("");
            let normalized = normalize_link_target(raw_target);
            (!normalized.is_empty()).then_some(normalized)
        })
        .collect();

    targets.sort_by(|a, b| locale_cmp(a, b));
    targets.dedup();
    targets
}

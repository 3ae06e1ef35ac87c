//! Document registry: the published documents of one build.
//!
//! Built fresh every run from the refreshed source cache. Only entries with
//! `publish: true` and without `draft: true` become [`DocRecord`]s. Every
//! record gets a path-derived id and route; routes are then made unique with
//! [`ensure_unique_routes`].
//!
//! ## Route disambiguation
//!
//! When several documents claim the same route, all documents are ordered by
//! `rel_no_ext` (locale-aware, ties by `rel_path`). The first claimant keeps
//! the route. Each later claimant tries, in order:
//!
//! 1. `-<hash(id)[..n]>` on the last route segment, for n = 6, 8, ... 64
//! 2. `-<id with "__" replaced by "-">`
//! 3. that fallback plus `-2`, `-3`, ...
//!
//! The first candidate nobody holds wins. The result depends only on the set
//! of paths, never on discovery order.

use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::hashing::hash_bytes;
use crate::naming::{
    append_route_suffix, base_name, content_file_name, locale_cmp, strip_md_ext,
    title_from_file_name, to_doc_id, to_route,
};
use crate::source_cache::{SourceCache, SourceCacheEntry};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

const SUFFIX_START: usize = 6;
const SUFFIX_STEP: usize = 2;

/// One published document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocRecord {
    pub source_path: PathBuf,
    pub rel_path: String,
    pub rel_no_ext: String,
    pub id: String,
    pub route: String,
    pub content_url: String,
    pub file_name: String,
    pub title: String,
    pub prefix: Option<String>,
    pub date: Option<String>,
    pub updated_date: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub mtime_ns: u64,
    pub body: String,
    pub raw_hash: String,
    pub wiki_targets: Vec<String>,
    pub is_new: bool,
    pub branch: Option<String>,
}

impl DocRecord {
    pub fn from_entry(
        vault: &Path,
        rel_path: &str,
        entry: &SourceCacheEntry,
        new_threshold_ms: i64,
    ) -> Self {
        let rel_no_ext = strip_md_ext(rel_path).to_string();
        let file_name = base_name(rel_path).to_string();
        let id = to_doc_id(&rel_no_ext);

        Self {
            source_path: vault.join(rel_path),
            rel_path: rel_path.to_string(),
            route: to_route(&rel_no_ext),
            content_url: format!("/content/{}", content_file_name(&id)),
            title: entry
                .title
                .clone()
                .unwrap_or_else(|| title_from_file_name(&file_name)),
            prefix: entry.prefix.clone(),
            date: entry.date.clone(),
            updated_date: entry.updated_date.clone(),
            description: entry.description.clone(),
            tags: entry.tags.clone(),
            mtime_ns: entry.mtime_ns,
            body: entry.body.clone(),
            raw_hash: entry.raw_hash.clone(),
            wiki_targets: entry.wiki_targets.clone(),
            is_new: is_new(entry.date.as_deref(), new_threshold_ms),
            branch: entry.branch.clone(),
            rel_no_ext,
            file_name,
            id,
        }
    }

    /// File name of the content fragment under `content/`.
    pub fn content_file(&self) -> String {
        content_file_name(&self.id)
    }
}

/// Build the registry for the current run.
///
/// Records come out in `rel_path` order with unique routes.
pub fn build_registry(
    vault: &Path,
    sources: &SourceCache,
    new_within_days: u32,
    now: DateTime<Local>,
    sink: &mut dyn DiagnosticSink,
) -> Vec<DocRecord> {
    let threshold = new_threshold_ms(now, new_within_days);
    let mut docs: Vec<DocRecord> = sources
        .iter()
        .filter(|(_, entry)| entry.is_publishable())
        .map(|(rel_path, entry)| DocRecord::from_entry(vault, rel_path, entry, threshold))
        .collect();

    ensure_unique_routes(&mut docs, sink);
    docs
}

/// Epoch milliseconds before which a date no longer counts as new.
pub fn new_threshold_ms(now: DateTime<Local>, new_within_days: u32) -> i64 {
    now.timestamp_millis() - i64::from(new_within_days) * 24 * 60 * 60 * 1000
}

/// Whether `date` parses and is at or after the threshold.
pub fn is_new(date: Option<&str>, threshold_ms: i64) -> bool {
    date.and_then(parse_date_millis)
        .is_some_and(|millis| millis >= threshold_ms)
}

/// Parse a frontmatter date string to epoch milliseconds.
///
/// Accepts RFC 3339, naive date-times (`T` or space separated, with or
/// without seconds) in local time, and plain dates at local midnight.
pub fn parse_date_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    const NAIVE_FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return local_millis(naive);
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return local_millis(date.and_hms_opt(0, 0, 0)?);
        }
    }
    None
}

fn local_millis(naive: NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Make every route unique. See the module docs for the procedure.
pub fn ensure_unique_routes(docs: &mut [DocRecord], sink: &mut dyn DiagnosticSink) {
    let mut groups: BTreeMap<&str, Vec<&DocRecord>> = BTreeMap::new();
    for doc in docs.iter() {
        groups.entry(doc.route.as_str()).or_default().push(doc);
    }
    for (route, members) in &groups {
        if members.len() < 2 {
            continue;
        }
        let paths: Vec<&str> = members.iter().map(|d| d.rel_path.as_str()).collect();
        sink.report(
            DiagnosticKind::DuplicateRoute,
            &format!(
                "Duplicate slug route {} detected. Applying suffixes: {}",
                route,
                paths.join(", ")
            ),
            "",
        );
    }
    if groups.values().all(|members| members.len() < 2) {
        return;
    }

    let mut order: Vec<usize> = (0..docs.len()).collect();
    order.sort_by(|&a, &b| {
        locale_cmp(&docs[a].rel_no_ext, &docs[b].rel_no_ext)
            .then_with(|| docs[a].rel_path.cmp(&docs[b].rel_path))
    });

    let mut used: HashSet<String> = HashSet::new();
    for index in order {
        let doc = &mut docs[index];
        if used.insert(doc.route.clone()) {
            continue;
        }
        let unique = disambiguate(&doc.route, &doc.id, &used);
        tracing::debug!("route {} taken, {} moved to {}", doc.route, doc.rel_path, unique);
        used.insert(unique.clone());
        doc.route = unique;
    }
}

fn disambiguate(route: &str, id: &str, used: &HashSet<String>) -> String {
    let digest = hash_bytes(id);

    let mut len = SUFFIX_START;
    while len <= digest.len() {
        let candidate = append_route_suffix(route, &digest[..len]);
        if !used.contains(&candidate) {
            return candidate;
        }
        len += SUFFIX_STEP;
    }

    let fallback = append_route_suffix(route, &id.replace("__", "-"));
    if !used.contains(&fallback) {
        return fallback;
    }
    let mut counter = 2usize;
    loop {
        let candidate = append_route_suffix(route, &format!("{}-{}", id.replace("__", "-"), counter));
        if !used.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

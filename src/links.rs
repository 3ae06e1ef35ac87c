//! Wikilink resolution over the document registry.
//!
//! Two indexes are built once per build:
//!
//! - by path: lowercase `rel_no_ext` → document
//! - by stem: lowercase file stem → all documents with that stem
//!
//! Resolution of a normalized target tries the path index first. A target
//! that contains `/` is a path and never falls back to stems. A stem that
//! matches exactly one document resolves; several matches is ambiguous and
//! resolves to nothing.

use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::naming::{base_name, normalize_link_target};
use crate::registry::DocRecord;
use std::collections::HashMap;

/// A resolved wikilink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub route: String,
    /// Title of the target document.
    pub label: String,
}

impl ResolvedLink {
    fn of(doc: &DocRecord) -> Self {
        Self {
            route: doc.route.clone(),
            label: doc.title.clone(),
        }
    }
}

/// Lookup tables for resolving wikilink targets.
#[derive(Debug)]
pub struct LinkResolver<'a> {
    by_path: HashMap<String, &'a DocRecord>,
    by_stem: HashMap<String, Vec<&'a DocRecord>>,
}

impl<'a> LinkResolver<'a> {
    pub fn new(docs: &'a [DocRecord]) -> Self {
        let mut by_path = HashMap::with_capacity(docs.len());
        let mut by_stem: HashMap<String, Vec<&'a DocRecord>> = HashMap::new();
        for doc in docs {
            by_path.insert(doc.rel_no_ext.to_lowercase(), doc);
            by_stem
                .entry(base_name(&doc.rel_no_ext).to_lowercase())
                .or_default()
                .push(doc);
        }
        Self { by_path, by_stem }
    }

    /// Resolve `input` on behalf of `from`.
    ///
    /// With a sink, an ambiguous stem is reported with its candidates.
    pub fn resolve(
        &self,
        input: &str,
        from: &DocRecord,
        sink: Option<&mut dyn DiagnosticSink>,
    ) -> Option<ResolvedLink> {
        let normalized = normalize_link_target(input);
        if normalized.is_empty() {
            return None;
        }
        if let Some(doc) = self.by_path.get(&normalized) {
            return Some(ResolvedLink::of(doc));
        }
        if normalized.contains('/') {
            return None;
        }

        let matches = self.by_stem.get(&normalized).map(Vec::as_slice).unwrap_or(&[]);
        match matches {
            [single] => Some(ResolvedLink::of(single)),
            [] => None,
            many => {
                if let Some(sink) = sink {
                    let candidates: Vec<&str> = many.iter().map(|d| d.rel_path.as_str()).collect();
                    sink.report(
                        DiagnosticKind::AmbiguousLink,
                        &format!(
                            "Duplicate target \"{}\" in {}. Candidates: {}",
                            input,
                            from.rel_path,
                            candidates.join(", ")
                        ),
                        &from.rel_path,
                    );
                }
                None
            }
        }
    }

    /// Resolution signature of a document's outgoing links.
    ///
    /// `target->route` (or `target->null`) for every wikilink target, joined
    /// by `|`. Resolves silently.
    pub fn signature(&self, doc: &DocRecord) -> String {
        doc.wiki_targets
            .iter()
            .map(|target| match self.resolve(target, doc, None) {
                Some(link) => format!("{}->{}", target, link.route),
                None => format!("{}->null", target),
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Per-document view of a [`LinkResolver`] that reports to a sink.
pub struct DocLinks<'r, 'a> {
    pub resolver: &'r LinkResolver<'a>,
    pub doc: &'r DocRecord,
    pub sink: &'r mut dyn DiagnosticSink,
}

impl DocLinks<'_, '_> {
    pub fn resolve(&mut self, input: &str) -> Option<ResolvedLink> {
        self.resolver.resolve(input, self.doc, Some(&mut *self.sink))
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: &str) {
        self.sink.report(kind, message, &self.doc.rel_path);
    }
}

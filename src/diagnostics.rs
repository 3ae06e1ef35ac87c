//! Build diagnostics.
//!
//! Recoverable problems (unresolved wikilinks, duplicate routes, omitted
//! images) never abort a build. Components report them to a caller-supplied
//! [`DiagnosticSink`] instead of logging directly, so tests can capture and
//! assert on exactly what a build complained about.

use std::fmt;

/// Category of a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Two or more documents claimed the same natural route.
    DuplicateRoute,
    /// A stem-only wikilink matched several documents.
    AmbiguousLink,
    /// A wikilink matched no document.
    UnresolvedLink,
    /// A local image was dropped by the image policy.
    ImageOmitted,
    /// SEO artifacts were skipped because no site URL is configured.
    SeoDisabled,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DiagnosticKind::DuplicateRoute => "route",
            DiagnosticKind::AmbiguousLink | DiagnosticKind::UnresolvedLink => "wikilink",
            DiagnosticKind::ImageOmitted => "markdown",
            DiagnosticKind::SeoDisabled => "seo",
        };
        f.write_str(tag)
    }
}

/// Receiver for recoverable build problems.
///
/// `context` names what triggered the report, usually a vault-relative
/// source path; it is empty for build-wide diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, kind: DiagnosticKind, message: &str, context: &str);
}

/// Forwards every diagnostic to `tracing` at warn level.
#[derive(Debug, Default)]
pub struct TracingSink {
    pub reported: usize,
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, kind: DiagnosticKind, message: &str, context: &str) {
        self.reported += 1;
        if context.is_empty() {
            tracing::warn!("[{}] {}", kind, message);
        } else {
            tracing::warn!("[{}] {}: {}", kind, context, message);
        }
    }
}

/// A single recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub context: String,
}

/// Records diagnostics in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics of one kind, in report order.
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, kind: DiagnosticKind, message: &str, context: &str) {
        self.diagnostics.push(Diagnostic {
            kind,
            message: message.to_string(),
            context: context.to_string(),
        });
    }
}

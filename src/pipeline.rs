//! The incremental build.
//!
//! One call to [`build_site`] takes a vault to a complete output directory:
//!
//! ```text
//! 1. Load      <cache_dir>/build-index.json   (empty if missing/corrupt/old)
//! 2. Discover  vault → candidate .md files with (mtime, size)
//! 3. Refresh   reuse cached frontmatter for unchanged files, parse the rest
//! 4. Registry  publishable docs, unique routes, sorted by path
//! 5. GC        delete outputs of removed docs and moved routes
//! 6. Write     runtime assets, manifest.json, content fragments (skipping
//!              fresh renders), shell pages, SEO artifacts
//! 7. Save      new cache: sources, render fingerprints, output ledger
//! ```
//!
//! Nothing in the output directory is trusted unless `manifest.json` is
//! there: without it, previous render fingerprints and output hashes are
//! ignored and everything is rewritten. Garbage collection still uses the
//! previous render entries, since deleting files that are already gone is
//! harmless.

use crate::cache::{
    BuildCache, CACHE_VERSION, RenderCacheEntry, RenderKey, RenderStats, render_fingerprint,
    render_is_fresh,
};
use crate::config::BuildOptions;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::gc::collect_garbage;
use crate::generate::{write_seo_artifacts, write_shell_pages};
use crate::links::{DocLinks, LinkResolver};
use crate::manifest::{build_manifest, build_tree};
use crate::markdown::{MarkdownRenderer, PulldownRenderer, RenderSettings};
use crate::naming::locale_cmp;
use crate::registry::{DocRecord, build_registry};
use crate::scan::{Excluder, ScanError, discover};
use crate::source_cache::{SourceError, refresh};
use crate::writer::{OutputWriter, WriteStats};
use chrono::Local;
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

pub const MANIFEST_PATH: &str = "manifest.json";
const CONTENT_DIR: &str = "content";

const APP_JS: &str = include_str!("../static/app.js");
const APP_CSS: &str = include_str!("../static/app.css");

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a build did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub docs: usize,
    pub sources_reused: usize,
    pub sources_parsed: usize,
    pub render: RenderStats,
    pub writes: WriteStats,
    /// Output-relative paths deleted by garbage collection.
    pub removed: Vec<String>,
    pub warnings: usize,
}

/// Counts reports on their way to the caller's sink.
struct CountingSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    count: usize,
}

impl DiagnosticSink for CountingSink<'_> {
    fn report(&mut self, kind: DiagnosticKind, message: &str, context: &str) {
        self.count += 1;
        self.inner.report(kind, message, context);
    }
}

/// Display order of documents: locale-aware by path without extension.
/// Drives previous/next navigation and the manifest doc list.
pub fn sort_docs(docs: &mut [DocRecord]) {
    docs.sort_by(|a, b| {
        locale_cmp(&a.rel_no_ext, &b.rel_no_ext).then_with(|| a.rel_path.cmp(&b.rel_path))
    });
}

pub fn build_site(
    options: &BuildOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<BuildReport, BuildError> {
    let mut sink = CountingSink {
        inner: sink,
        count: 0,
    };
    let out_dir = options.out_dir.as_path();

    let previous = BuildCache::load(&options.cache_dir);
    let no_outputs = BuildCache::empty();
    let trusted = if out_dir.join(MANIFEST_PATH).exists() {
        &previous
    } else {
        tracing::debug!("no {} in {}, ignoring previous outputs", MANIFEST_PATH, out_dir.display());
        &no_outputs
    };

    tracing::info!("Scanning {}", options.vault_dir.display());
    let excluder = Excluder::new(&options.exclude)?
        .skip_dir(out_dir)
        .skip_dir(&options.cache_dir);
    let files = discover(&options.vault_dir, &excluder)?;
    let sources = refresh(&previous.sources, &files)?;
    tracing::debug!(
        "sources: {} reused, {} parsed",
        sources.reused,
        sources.parsed
    );

    let mut docs = build_registry(
        &options.vault_dir,
        &sources.cache,
        options.new_within_days,
        Local::now(),
        &mut sink,
    );
    sort_docs(&mut docs);
    tracing::info!("{} publishable documents", docs.len());

    let removed = collect_garbage(out_dir, &previous.docs, &docs)?;

    let mut writer = OutputWriter::new(out_dir, &trusted.output_hashes);
    let runtime = writer.write_runtime_assets(APP_JS, APP_CSS)?;

    let tree = build_tree(&docs, options);
    let manifest = build_manifest(&docs, tree, options);
    let manifest_json = serde_json::to_string_pretty(&manifest)? + "\n";
    writer.write(MANIFEST_PATH, manifest_json.as_bytes())?;

    let renderer = PulldownRenderer::new(RenderSettings {
        wikilinks: options.wikilinks,
        image_policy: options.image_policy,
        gfm: options.gfm,
        theme: options.theme.clone(),
    });
    let resolver = LinkResolver::new(&docs);
    let key = RenderKey {
        theme: &options.theme,
        image_policy: options.image_policy.as_str(),
        wikilinks: options.wikilinks,
        gfm: options.gfm,
    };

    let mut render_stats = RenderStats::default();
    let mut render_entries = BTreeMap::new();
    let mut contents = BTreeMap::new();

    for doc in &docs {
        let signature = if options.wikilinks {
            resolver.signature(doc)
        } else {
            String::new()
        };
        let fingerprint = render_fingerprint(&doc.raw_hash, &doc.route, key, &signature);
        let content_rel = format!("{}/{}", CONTENT_DIR, doc.content_file());
        render_entries.insert(
            doc.id.clone(),
            RenderCacheEntry {
                hash: fingerprint.clone(),
                route: doc.route.clone(),
                rel_path: doc.rel_path.clone(),
            },
        );

        let reused = if render_is_fresh(trusted, &doc.id, &content_rel, &fingerprint) {
            match std::fs::read_to_string(out_dir.join(&content_rel)) {
                Ok(html) => Some(html),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("{} missing, re-rendering {}", content_rel, doc.rel_path);
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        let html = match reused {
            Some(html) => {
                render_stats.skip();
                html
            }
            None => {
                render_stats.render();
                render_doc(&renderer, &resolver, doc, &mut sink)
            }
        };
        writer.write_with_hash(&content_rel, html.as_bytes(), fingerprint)?;
        contents.insert(doc.id.clone(), html);
    }

    write_shell_pages(&mut writer, &docs, &contents, &runtime, options.seo.as_ref())?;
    write_seo_artifacts(&mut writer, out_dir, &docs, options.seo.as_ref(), &mut sink)?;

    let (output_hashes, writes) = writer.finish();
    let cache = BuildCache {
        version: CACHE_VERSION,
        sources: sources.cache,
        docs: render_entries,
        output_hashes,
    };
    cache.save(&options.cache_dir)?;

    tracing::info!("Render cache: {}", render_stats);
    Ok(BuildReport {
        docs: docs.len(),
        sources_reused: sources.reused,
        sources_parsed: sources.parsed,
        render: render_stats,
        writes,
        removed,
        warnings: sink.count,
    })
}

fn render_doc(
    renderer: &dyn MarkdownRenderer,
    resolver: &LinkResolver<'_>,
    doc: &DocRecord,
    sink: &mut dyn DiagnosticSink,
) -> String {
    let mut links = DocLinks { resolver, doc, sink };
    let output = renderer.render(&doc.body, &mut links);
    for warning in &output.warnings {
        links.report(warning.kind, &warning.message);
    }
    output.html
}

/// Remove the output and cache directories.
pub fn clean(options: &BuildOptions) -> io::Result<()> {
    for dir in [&options.out_dir, &options.cache_dir] {
        match std::fs::remove_dir_all(dir) {
            Ok(()) => tracing::info!("Removed {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::test_helpers::{note, options_for, write_note};
    use tempfile::TempDir;

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn docs_sorted_by_path_locale_aware() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        write_note(&vault, "b.md", &note("B"));
        write_note(&vault, "Été.md", &note("Summer"));
        write_note(&vault, "a/z.md", &note("AZ"));
        write_note(&vault, "c.md", &note("C"));

        let options = options_for(tmp.path());
        let mut sink = CollectingSink::new();
        build_site(&options, &mut sink).unwrap();

        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(options.out_dir.join(MANIFEST_PATH)).unwrap(),
        )
        .unwrap();
        let routes: Vec<&str> = manifest["docs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["route"].as_str().unwrap())
            .collect();
        assert_eq!(routes, vec!["/a/z/", "/b/", "/c/", "/Été/"]);
    }

    // =========================================================================
    // Build
    // =========================================================================

    #[test]
    fn first_build_renders_everything() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        write_note(&vault, "posts/hello.md", &note("Hello"));
        write_note(&vault, "draft.md", "---\npublish: true\ndraft: true\n---\nhidden\n");
        write_note(&vault, "private.md", "no frontmatter\n");

        let options = options_for(tmp.path());
        let mut sink = CollectingSink::new();
        let report = build_site(&options, &mut sink).unwrap();

        assert_eq!(report.docs, 1);
        assert_eq!(report.render.rendered, 1);
        assert_eq!(report.render.skipped, 0);
        assert!(options.out_dir.join("posts/hello/index.html").exists());
        assert!(options.out_dir.join("index.html").exists());
        assert!(options.out_dir.join("404.html").exists());
        assert!(options.out_dir.join(MANIFEST_PATH).exists());
        assert!(!options.out_dir.join("draft/index.html").exists());
        assert!(options.cache_dir.join("build-index.json").exists());
        // SEO is not configured in the fixture options.
        assert_eq!(sink.of_kind(DiagnosticKind::SeoDisabled).len(), 1);
    }

    #[test]
    fn second_build_skips_renders() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        write_note(&vault, "a.md", &note("A"));
        write_note(&vault, "b.md", &note("B"));

        let options = options_for(tmp.path());
        let mut sink = CollectingSink::new();
        build_site(&options, &mut sink).unwrap();
        let report = build_site(&options, &mut sink).unwrap();

        assert_eq!(report.render.rendered, 0);
        assert_eq!(report.render.skipped, 2);
        assert_eq!(report.writes.written, 0);
        assert_eq!(report.sources_parsed, 0);
    }

    #[test]
    fn frontmatter_error_aborts_with_path() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        write_note(&vault, "bad.md", "---\npublish: [unclosed\n---\n");

        let options = options_for(tmp.path());
        let err = build_site(&options, &mut CollectingSink::new()).unwrap_err();
        assert!(matches!(err, BuildError::Source(_)));
        assert!(err.to_string().contains("bad.md"));
    }

    #[test]
    fn render_warnings_are_counted() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        write_note(&vault, "a.md", "---\npublish: true\n---\nSee [[missing]]\n");

        let options = options_for(tmp.path());
        let mut sink = CollectingSink::new();
        let report = build_site(&options, &mut sink).unwrap();

        let unresolved = sink.of_kind(DiagnosticKind::UnresolvedLink);
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].context, "a.md");
        // Unresolved link plus the SEO notice.
        assert_eq!(report.warnings, 2);
    }

    // =========================================================================
    // Clean
    // =========================================================================

    #[test]
    fn clean_removes_output_and_cache() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        write_note(&vault, "a.md", &note("A"));

        let options = options_for(tmp.path());
        build_site(&options, &mut CollectingSink::new()).unwrap();
        clean(&options).unwrap();

        assert!(!options.out_dir.exists());
        assert!(!options.cache_dir.exists());
        assert!(vault.join("a.md").exists());
        // Cleaning twice is fine.
        clean(&options).unwrap();
    }
}

//! # vaultsite
//!
//! An incremental static site generator for markdown vaults. Notes opt in
//! with `publish: true`; the result is a static site with a file-explorer UI
//! over the vault's folder structure and wikilinks resolved between notes.
//!
//! # Architecture: One Incremental Pass
//!
//! A build is a single pass over the vault that consults one persisted cache
//! at every expensive step:
//!
//! ```text
//! vault/ ─► discover ─► source cache ─► registry ─► render ─► writer ─► dist/
//!                        (skip parse)    (routes)   (skip)    (skip write)
//! ```
//!
//! - **Source cache**: a file whose `(mtime, size)` is unchanged is not
//!   re-read; its frontmatter and body come from the cache.
//! - **Render cache**: a document whose render fingerprint (source hash,
//!   route, render settings, resolved outgoing links) is unchanged is not
//!   re-rendered.
//! - **Output ledger**: a file whose bytes hash the same as last time, and
//!   still exists, is not rewritten.
//!
//! A second build of an unchanged vault writes nothing and produces a
//! byte-identical cache.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the vault, applies exclude globs, stats candidates |
//! | [`frontmatter`] | YAML frontmatter split and field extraction |
//! | [`source_cache`] | Per-file parse cache keyed by `(mtime, size)` |
//! | [`registry`] | Publishable documents, dates, NEW badges, unique routes |
//! | [`links`] | Wikilink resolution and per-document link signatures |
//! | [`markdown`] | Markdown → HTML fragment with wikilinks, embeds, code blocks |
//! | [`cache`] | Persisted build cache and render fingerprints |
//! | [`writer`] | Change-detecting output writer and runtime assets |
//! | [`gc`] | Removal of outputs for deleted or moved documents |
//! | [`manifest`] | Explorer tree, Recent/pinned folders, `manifest.json` |
//! | [`generate`] | Shell pages, 404, `robots.txt`, `sitemap.xml` (Maud) |
//! | [`pipeline`] | [`pipeline::build_site`] and `clean` |
//! | [`watch`] | Debounced, coalesced rebuilds for `dev` |
//! | [`config`] | `blog.toml` loading, validation, CLI overrides |
//! | [`seo`] | SEO settings validation and canonical URLs |
//! | [`diagnostics`] | Sink for recoverable build warnings |
//! | [`naming`] | Ids, routes and file names derived from paths |
//! | [`hashing`] | SHA-256 hex digests and composite fingerprints |
//! | [`types`] | `manifest.json` wire types |
//! | [`output`] | CLI summary formatting |
//!
//! # Design Decisions
//!
//! ## Deterministic Output
//!
//! Maps are `BTreeMap`s, documents are sorted before anything is emitted, and
//! `generatedAt` is the newest source mtime rather than the wall clock. The
//! same vault always yields the same bytes, which is what makes write
//! skipping effective.
//!
//! ## Fragment Files Named by Id
//!
//! Rendered content lives at `content/<sha256(id)>.html`, independent of the
//! route. A route change rewrites the shell page but leaves the fragment
//! where it is.
//!
//! ## Untrusted Output Directory
//!
//! If `manifest.json` is missing from the output directory, the previous
//! build's output bookkeeping is ignored and everything is rewritten. A
//! hand-cleaned output directory never leaves holes.
//!
//! ## Maud Over Template Engines
//!
//! Shell pages are generated with [Maud](https://maud.lambda.xyz/): malformed
//! HTML is a build error and all interpolation is auto-escaped.

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod frontmatter;
pub mod gc;
pub mod generate;
pub mod hashing;
pub mod links;
pub mod manifest;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod scan;
pub mod seo;
pub mod source_cache;
pub mod types;
pub mod watch;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;

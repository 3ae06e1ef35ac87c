//! HTML shell pages and SEO artifacts.
//!
//! Every route gets a static shell page that the runtime UI takes over once
//! `manifest.json` is loaded. The shell already carries the document's meta
//! tags and a server-rendered initial view, so crawlers and no-JS readers see
//! the content.
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html                 # Root shell (home doc as initial view)
//! ├── _app/index.html            # Same root shell, SPA fallback entry
//! ├── 404.html
//! ├── posts/hello/index.html     # One shell per route
//! ├── robots.txt                 # Only with [seo] site_url
//! └── sitemap.xml
//! ```
//!
//! Asset links are relative to each page's own directory so the output can
//! be served from any path.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping.

use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::manifest::pick_home_doc;
use crate::naming::route_output_path;
use crate::registry::{DocRecord, parse_date_millis};
use crate::seo::SeoOptions;
use crate::writer::{OutputWriter, RuntimeAssets};
use chrono::{Local, TimeZone};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_SITE_TITLE: &str = "File-System Blog";
pub const DEFAULT_SITE_DESCRIPTION: &str =
    "File-system style static blog with markdown explorer UI.";

const ROOT_SHELL_PATHS: [&str; 2] = ["_app/index.html", "index.html"];
const NOT_FOUND_PATH: &str = "404.html";
const ROBOTS_PATH: &str = "robots.txt";
const SITEMAP_PATH: &str = "sitemap.xml";

static POST_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|/)posts?/").expect("valid post path regex"));

/// Head metadata of one shell page.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellMeta {
    pub title: String,
    pub description: Option<String>,
    pub canonical_url: Option<String>,
    pub og_type: &'static str,
    pub og_site_name: Option<String>,
    pub og_locale: Option<String>,
    pub og_description: String,
    pub og_image: Option<String>,
    pub twitter_card: String,
    pub twitter_description: String,
    pub twitter_site: Option<String>,
    pub twitter_creator: Option<String>,
    pub twitter_image: Option<String>,
    pub json_ld: Vec<Value>,
}

/// Asset references as seen from one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellAssets {
    pub css_href: String,
    pub js_src: String,
    /// Prefix from the page to the output root (`""`, `../`, ...).
    pub root: String,
}

impl ShellAssets {
    pub fn for_output(output_path: &str, assets: &RuntimeAssets) -> Self {
        let depth = output_path.matches('/').count();
        Self {
            css_href: relative_asset_path(output_path, &assets.css),
            js_src: relative_asset_path(output_path, &assets.js),
            root: "../".repeat(depth),
        }
    }
}

/// Path from the directory of `from_output` to `asset`, both relative to
/// the output root.
pub fn relative_asset_path(from_output: &str, asset: &str) -> String {
    let from_dir: Vec<&str> = match from_output.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = asset.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&target[common..]);

    let relative = parts.join("/");
    if relative.is_empty() {
        asset.rsplit('/').next().unwrap_or(asset).to_string()
    } else {
        relative
    }
}

// ============================================================================
// Meta
// ============================================================================

pub fn shell_meta(route: &str, doc: Option<&DocRecord>, seo: Option<&SeoOptions>) -> ShellMeta {
    let default_title = seo
        .and_then(|s| s.default_title.clone())
        .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
    let default_description = seo
        .and_then(|s| s.default_description.clone())
        .unwrap_or_else(|| DEFAULT_SITE_DESCRIPTION.to_string());
    let description = doc
        .and_then(|d| d.description.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let canonical_url = seo.map(|s| s.canonical_url(route));
    let title = doc.map(|d| d.title.clone()).unwrap_or(default_title);

    let (social, og, twitter) = match seo {
        Some(s) => (
            s.image_url(s.default_social_image.as_deref()),
            s.image_url(s.default_og_image.as_deref()),
            s.image_url(s.default_twitter_image.as_deref()),
        ),
        None => (None, None, None),
    };

    ShellMeta {
        og_description: description.clone().unwrap_or_else(|| default_description.clone()),
        twitter_description: description.clone().unwrap_or(default_description),
        description,
        og_type: if doc.is_some() { "article" } else { "website" },
        og_site_name: seo.and_then(|s| s.site_name.clone()),
        og_locale: seo.and_then(|s| s.locale.clone()),
        og_image: og.or_else(|| social.clone()),
        twitter_card: seo
            .and_then(|s| s.twitter_card.clone())
            .unwrap_or_else(|| "summary".to_string()),
        twitter_site: seo.and_then(|s| s.twitter_site.clone()),
        twitter_creator: seo.and_then(|s| s.twitter_creator.clone()),
        twitter_image: twitter.or(social),
        json_ld: structured_data(doc, canonical_url.as_deref(), seo),
        canonical_url,
        title,
    }
}

/// JSON-LD objects: `WebSite` for the root, `BlogPosting` for docs under a
/// `post/` or `posts/` folder, `Article` for everything else.
pub fn structured_data(
    doc: Option<&DocRecord>,
    canonical_url: Option<&str>,
    seo: Option<&SeoOptions>,
) -> Vec<Value> {
    let mut schema = Map::new();
    schema.insert("@context".into(), json!("https://schema.org"));

    match doc {
        None => {
            let name = seo
                .and_then(|s| s.site_name.clone().or_else(|| s.default_title.clone()))
                .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
            schema.insert("@type".into(), json!("WebSite"));
            schema.insert("name".into(), json!(name));
            if let Some(url) = canonical_url {
                schema.insert("url".into(), json!(url));
            }
        }
        Some(doc) => {
            let kind = if POST_PATH.is_match(&doc.rel_no_ext) {
                "BlogPosting"
            } else {
                "Article"
            };
            schema.insert("@type".into(), json!(kind));
            schema.insert("headline".into(), json!(doc.title));
            if let Some(url) = canonical_url {
                schema.insert("url".into(), json!(url));
            }
            if let Some(date) = &doc.date {
                schema.insert("datePublished".into(), json!(date));
            }
        }
    }

    vec![Value::Object(schema)]
}

/// JSON for an inline `<script>`: `</` is escaped so content cannot close
/// the element.
fn inline_json(value: &[Value]) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/")
}

// ============================================================================
// Initial view
// ============================================================================

/// Server-rendered first paint of a document.
pub struct InitialView<'a> {
    pub doc: &'a DocRecord,
    pub content_html: &'a str,
    pub prev: Option<&'a DocRecord>,
    pub next: Option<&'a DocRecord>,
}

impl<'a> InitialView<'a> {
    /// Initial view of `docs[index]`, with its neighbours in build order.
    pub fn at(docs: &'a [DocRecord], index: usize, content_html: &'a str) -> Self {
        Self {
            doc: &docs[index],
            content_html,
            prev: index.checked_sub(1).map(|i| &docs[i]),
            next: docs.get(index + 1),
        }
    }
}

fn separator() -> Markup {
    html! { span.material-symbols-outlined.breadcrumb-sep { "chevron_right" } }
}

pub fn render_breadcrumb(route: &str) -> Markup {
    let items: Vec<&str> = std::iter::once("~")
        .chain(route.split('/').filter(|part| !part.is_empty()))
        .collect();
    let last = items.len() - 1;

    html! {
        @for (index, item) in items.iter().enumerate() {
            @if index > 0 { (separator()) }
            @if index == last && items.len() > 1 {
                span.breadcrumb-current aria-current="page" { (item) }
            } @else {
                span.breadcrumb-item { (item) }
            }
        }
    }
}

/// `YYYY-MM-DD HH:MM` in local time, or `None` for unparseable dates.
pub fn format_meta_datetime(value: Option<&str>) -> Option<String> {
    let millis = parse_date_millis(value?)?;
    let local = Local.timestamp_millis_opt(millis).single()?;
    Some(local.format("%Y-%m-%d %H:%M").to_string())
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim().trim_start_matches('#').to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

pub fn render_meta(doc: &DocRecord) -> Markup {
    let tags = normalize_tags(&doc.tags);
    let tags_line = tags
        .iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ");

    html! {
        @if let Some(prefix) = &doc.prefix {
            span.meta-item.meta-prefix { (prefix) }
        }
        @if let Some(created) = format_meta_datetime(doc.date.as_deref()) {
            span.meta-item {
                span.material-symbols-outlined { "calendar_today" }
                (created)
            }
        }
        @if !tags.is_empty() {
            span.meta-item.meta-tags { (tags_line) }
        }
    }
}

pub fn render_nav(prev: Option<&DocRecord>, next: Option<&DocRecord>) -> Markup {
    html! {
        @if let Some(prev) = prev {
            a.nav-link.nav-link-prev href=(prev.route) data-route=(prev.route) {
                div.nav-link-label {
                    span.material-symbols-outlined { "arrow_back" }
                    "Previous"
                }
                div.nav-link-title { (prev.title) }
            }
        }
        @if let Some(next) = next {
            a.nav-link.nav-link-next href=(next.route) data-route=(next.route) {
                div.nav-link-label {
                    "Next"
                    span.material-symbols-outlined { "arrow_forward" }
                }
                div.nav-link-title { (next.title) }
            }
        }
    }
}

// ============================================================================
// Pages
// ============================================================================

fn head(meta: &ShellMeta, assets: &ShellAssets, page_title: &str) -> Markup {
    html! {
        head {
            meta charset="UTF-8";
            meta name="viewport" content="width=device-width, initial-scale=1.0";
            title { (page_title) }
            @if let Some(description) = &meta.description {
                meta name="description" content=(description);
            }
            @if let Some(canonical) = &meta.canonical_url {
                link rel="canonical" href=(canonical);
            }
            meta property="og:title" content=(meta.title);
            meta property="og:type" content=(meta.og_type);
            meta property="og:description" content=(meta.og_description);
            @if let Some(url) = &meta.canonical_url {
                meta property="og:url" content=(url);
            }
            @if let Some(site_name) = &meta.og_site_name {
                meta property="og:site_name" content=(site_name);
            }
            @if let Some(locale) = &meta.og_locale {
                meta property="og:locale" content=(locale);
            }
            @if let Some(image) = &meta.og_image {
                meta property="og:image" content=(image);
            }
            meta name="twitter:card" content=(meta.twitter_card);
            meta name="twitter:title" content=(meta.title);
            meta name="twitter:description" content=(meta.twitter_description);
            @if let Some(site) = &meta.twitter_site {
                meta name="twitter:site" content=(site);
            }
            @if let Some(creator) = &meta.twitter_creator {
                meta name="twitter:creator" content=(creator);
            }
            @if let Some(image) = &meta.twitter_image {
                meta name="twitter:image" content=(image);
            }
            script type="application/ld+json" { (PreEscaped(inline_json(&meta.json_ld))) }
            link rel="stylesheet" href=(assets.css_href);
        }
    }
}

/// Renders the app shell: explorer sidebar plus the document viewer.
pub fn render_shell(
    route: &str,
    meta: &ShellMeta,
    assets: &ShellAssets,
    initial: Option<&InitialView<'_>>,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(meta, assets, &meta.title))
            body {
                div.app-root data-route=(route) data-root=(assets.root) {
                    aside.sidebar {
                        div.sidebar-header {
                            h1.sidebar-title {
                                span.material-symbols-outlined { "terminal" }
                                "~/vault"
                            }
                            div id="branch-switcher" class="sidebar-branch" {}
                        }
                        nav id="tree-root" class="tree-root" aria-label="Explorer" {}
                    }
                    main.viewer {
                        div.viewer-container {
                            nav id="viewer-breadcrumb" class="viewer-breadcrumb" aria-label="Path" {
                                @match initial {
                                    Some(view) => { (render_breadcrumb(&view.doc.route)) }
                                    None => { (render_breadcrumb(route)) }
                                }
                            }
                            header id="viewer-header" class="viewer-header" {
                                h1 id="viewer-title" class="viewer-title" {
                                    @match initial {
                                        Some(view) => { (view.doc.title) }
                                        None => { "Select a document" }
                                    }
                                }
                                div id="viewer-meta" class="viewer-meta" {
                                    @if let Some(view) = initial { (render_meta(view.doc)) }
                                }
                            }
                            article id="viewer-content" class="viewer-content" {
                                @match initial {
                                    Some(view) => { (PreEscaped(view.content_html)) }
                                    None => { p.placeholder { "Select a document from the explorer." } }
                                }
                            }
                            nav id="viewer-nav" class="viewer-nav" {
                                @if let Some(view) = initial { (render_nav(view.prev, view.next)) }
                            }
                        }
                    }
                }
                script type="module" src=(assets.js_src) {}
            }
        }
    }
}

pub fn render_not_found(assets: &ShellAssets, seo: Option<&SeoOptions>) -> Markup {
    let site_title = seo
        .and_then(|s| s.default_title.as_deref())
        .unwrap_or(DEFAULT_SITE_TITLE);
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="robots" content="noindex";
                title { "404 - " (site_title) }
                link rel="stylesheet" href=(assets.css_href);
            }
            body {
                main.not-found {
                    div.not-found-icon {
                        span.material-symbols-outlined { "folder_off" }
                    }
                    h1 { "404" }
                    p { "The requested document could not be found." }
                    a.not-found-link href={ (assets.root) "./" } {
                        span.material-symbols-outlined { "home" }
                        "Go home"
                    }
                }
            }
        }
    }
}

/// Write the root shells, the 404 page and one shell per document route.
///
/// `contents` maps doc id to its rendered fragment for the initial views.
pub fn write_shell_pages(
    writer: &mut OutputWriter<'_>,
    docs: &[DocRecord],
    contents: &BTreeMap<String, String>,
    runtime: &RuntimeAssets,
    seo: Option<&SeoOptions>,
) -> io::Result<()> {
    let content_of = |doc: &DocRecord| contents.get(&doc.id).map(String::as_str).unwrap_or("");

    let home = pick_home_doc(docs).and_then(|home| {
        let index = docs.iter().position(|doc| doc.id == home.id)?;
        Some(InitialView::at(docs, index, content_of(home)))
    });
    let root_meta = shell_meta("/", None, seo);
    for path in ROOT_SHELL_PATHS {
        let assets = ShellAssets::for_output(path, runtime);
        let page = render_shell("/", &root_meta, &assets, home.as_ref());
        writer.write(path, page.into_string().as_bytes())?;
    }

    let not_found = render_not_found(&ShellAssets::for_output(NOT_FOUND_PATH, runtime), seo);
    writer.write(NOT_FOUND_PATH, not_found.into_string().as_bytes())?;

    for (index, doc) in docs.iter().enumerate() {
        let path = route_output_path(&doc.route);
        let assets = ShellAssets::for_output(&path, runtime);
        let meta = shell_meta(&doc.route, Some(doc), seo);
        let view = InitialView::at(docs, index, content_of(doc));
        let page = render_shell(&doc.route, &meta, &assets, Some(&view));
        writer.write(&path, page.into_string().as_bytes())?;
    }

    tracing::debug!("wrote {} shell pages", docs.len() + ROOT_SHELL_PATHS.len() + 1);
    Ok(())
}

// ============================================================================
// SEO artifacts
// ============================================================================

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn sitemap_xml(urls: &[String]) -> String {
    let mut lines = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#.to_string(),
    ];
    lines.extend(urls.iter().map(|url| format!("  <url><loc>{}</loc></url>", escape_xml(url))));
    lines.push("</urlset>".to_string());
    lines.push(String::new());
    lines.join("\n")
}

pub fn robots_txt(seo: &SeoOptions) -> String {
    format!(
        "User-agent: *\nAllow: /\nSitemap: {}\n",
        seo.canonical_url("/sitemap.xml")
    )
}

/// Sitemap routes: `/` plus every doc route, locale-ordered.
pub fn sitemap_routes(docs: &[DocRecord]) -> Vec<String> {
    let set: BTreeSet<&str> = std::iter::once("/")
        .chain(docs.iter().map(|doc| doc.route.as_str()))
        .collect();
    let mut routes: Vec<String> = set.into_iter().map(str::to_string).collect();
    routes.sort_by(|a, b| crate::naming::locale_cmp(a, b));
    routes
}

/// Write `robots.txt` and `sitemap.xml`, or remove stale copies when SEO is
/// not configured.
pub fn write_seo_artifacts(
    writer: &mut OutputWriter<'_>,
    out_dir: &Path,
    docs: &[DocRecord],
    seo: Option<&SeoOptions>,
    sink: &mut dyn DiagnosticSink,
) -> io::Result<()> {
    let Some(seo) = seo else {
        for path in [ROBOTS_PATH, SITEMAP_PATH] {
            match std::fs::remove_file(out_dir.join(path)) {
                Ok(()) => tracing::debug!("removed {}", path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        sink.report(
            DiagnosticKind::SeoDisabled,
            "Skipping robots.txt and sitemap.xml generation. Add \"seo.site_url\" to blog.toml to enable SEO artifacts.",
            "",
        );
        return Ok(());
    };

    let urls: Vec<String> = sitemap_routes(docs)
        .iter()
        .map(|route| seo.canonical_url(route))
        .collect();
    writer.write(ROBOTS_PATH, robots_txt(seo).as_bytes())?;
    writer.write(SITEMAP_PATH, sitemap_xml(&urls).as_bytes())?;
    Ok(())
}

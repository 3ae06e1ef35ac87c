//! Markdown to HTML fragments.
//!
//! Rendering is a pure function of the markdown text, the render settings,
//! and where wikilinks resolve. The pipeline only ever talks to the
//! [`MarkdownRenderer`] trait; [`PulldownRenderer`] is the shipped
//! implementation on top of `pulldown-cmark`.
//!
//! Rendering happens in two passes:
//!
//! 1. A text preprocess rewrites vault syntax into plain CommonMark:
//!    - `![[file|label]]` embeds become images, or an *image omitted* note
//!      under the `omit-local` policy
//!    - `![alt](local.png)` images are omitted under `omit-local`
//!    - `[[target|label]]` wikilinks become `[label](route)` links, or plain
//!      text when they do not resolve
//! 2. The event stream from `pulldown-cmark` is adjusted: fenced code blocks
//!    get a header with language/file name and a copy button, external
//!    `http(s)` links open in a new tab.
//!
//! Problems are returned as warnings, never errors.

use crate::config::ImagePolicy;
use crate::diagnostics::DiagnosticKind;
use crate::links::{DocLinks, ResolvedLink};
use maud::html;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html as md_html};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static EMBED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[([^\]]+)\]\]").expect("valid embed regex"));
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid image regex"));
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wikilink regex"));
static IMAGE_EXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(png|jpe?g|gif|webp|svg|bmp|ico|avif)$").expect("valid extension regex")
});
static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^((https?:)?//|data:|mailto:)").expect("valid remote url regex")
});
static EXTERNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("valid external url regex"));

/// Settings that change rendered output. All of them feed the render
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub wikilinks: bool,
    pub image_policy: ImagePolicy,
    pub gfm: bool,
    pub theme: String,
}

/// A recoverable problem found while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderWarning {
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub html: String,
    pub warnings: Vec<RenderWarning>,
}

/// Resolves wikilink targets for the document being rendered.
pub trait LinkLookup {
    fn resolve(&mut self, target: &str) -> Option<ResolvedLink>;
}

impl LinkLookup for DocLinks<'_, '_> {
    fn resolve(&mut self, target: &str) -> Option<ResolvedLink> {
        DocLinks::resolve(self, target)
    }
}

pub trait MarkdownRenderer {
    fn render(&self, markdown: &str, links: &mut dyn LinkLookup) -> RenderOutput;
}

/// `pulldown-cmark` backed renderer.
#[derive(Debug, Clone)]
pub struct PulldownRenderer {
    settings: RenderSettings,
}

impl PulldownRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    fn options(&self) -> Options {
        let mut options = Options::empty();
        if self.settings.gfm {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);
        }
        options
    }
}

impl MarkdownRenderer for PulldownRenderer {
    fn render(&self, markdown: &str, links: &mut dyn LinkLookup) -> RenderOutput {
        let mut warnings = Vec::new();
        let source = preprocess(markdown, &self.settings, links, &mut warnings);

        let parser = Parser::new_ext(&source, self.options());
        let events = decorate(parser, &self.settings.theme);
        let mut html = String::with_capacity(source.len() * 3 / 2);
        md_html::push_html(&mut html, events.into_iter());

        RenderOutput { html, warnings }
    }
}

/// Rewrite embeds, local images and wikilinks into plain markdown.
pub fn preprocess(
    markdown: &str,
    settings: &RenderSettings,
    links: &mut dyn LinkLookup,
    warnings: &mut Vec<RenderWarning>,
) -> String {
    let omit_local = settings.image_policy == ImagePolicy::OmitLocal;

    let output = EMBED_RE.replace_all(markdown, |caps: &Captures| {
        let (target, label) = split_inner(&caps[1]);
        let shown = label.unwrap_or(target);
        if omit_local {
            warnings.push(omitted_image(target));
            format!("*(image omitted: {})*", shown)
        } else {
            format!("![{}]({})", strip_brackets(shown), destination(target))
        }
    });

    let output = IMAGE_RE.replace_all(&output, |caps: &Captures| {
        let src = caps[2].trim();
        if !omit_local || REMOTE_RE.is_match(src) {
            return caps[0].to_string();
        }
        warnings.push(omitted_image(src));
        let alt = &caps[1];
        format!("*(image omitted: {})*", if alt.is_empty() { src } else { alt })
    });

    if !settings.wikilinks {
        return output.into_owned();
    }

    WIKILINK_RE
        .replace_all(&output, |caps: &Captures| {
            let (target, label) = split_inner(&caps[1]);
            if target.is_empty() {
                return String::new();
            }
            if IMAGE_EXT_RE.is_match(target) {
                warnings.push(RenderWarning {
                    kind: DiagnosticKind::UnresolvedLink,
                    message: format!("Unresolved wikilink (looks like image): {}", target),
                });
                return label.unwrap_or(target).to_string();
            }
            match links.resolve(target) {
                Some(link) => format!(
                    "[{}]({})",
                    strip_brackets(label.unwrap_or(&link.label)),
                    destination(&link.route)
                ),
                None => {
                    warnings.push(RenderWarning {
                        kind: DiagnosticKind::UnresolvedLink,
                        message: format!("Unresolved wikilink: {}", target),
                    });
                    label.unwrap_or(target).to_string()
                }
            }
        })
        .into_owned()
}

/// Split `target|label`, trimming both; empty labels count as absent.
fn split_inner(inner: &str) -> (&str, Option<&str>) {
    let mut parts = inner.split('|');
    let target = parts.next().unwrap_or("").trim();
    let label = parts.next().map(str::trim).filter(|l| !l.is_empty());
    (target, label)
}

/// Pointy-bracket link destination, so paths with spaces or parentheses
/// stay a single destination.
fn destination(target: &str) -> String {
    format!("<{}>", target.replace('<', "\\<").replace('>', "\\>"))
}

fn strip_brackets(label: &str) -> String {
    label.replace(['[', ']'], "")
}

fn omitted_image(target: &str) -> RenderWarning {
    RenderWarning {
        kind: DiagnosticKind::ImageOmitted,
        message: format!("Local image omitted: {}", target),
    }
}

/// Replace fenced code blocks with decorated HTML and mark external links.
fn decorate<'a>(parser: Parser<'a>, theme: &str) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut fence: Option<(String, String)> = None;

    for event in parser {
        if let Some((_, code)) = fence.as_mut() {
            match event {
                Event::Text(text) => code.push_str(&text),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((info, code)) = fence.take() {
                        events.push(Event::Html(CowStr::from(code_block(&info, &code, theme))));
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                fence = Some((info.to_string(), String::new()));
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) if EXTERNAL_RE.is_match(&dest_url) => {
                let mut open = format!("<a href=\"{}\"", escape_attr(&dest_url));
                if !title.is_empty() {
                    open.push_str(&format!(" title=\"{}\"", escape_attr(&title)));
                }
                open.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
                events.push(Event::InlineHtml(CowStr::from(open)));
            }
            other => events.push(other),
        }
    }

    events
}

/// Fenced code block with header chrome.
///
/// The info string's first word is the language; anything after it is
/// shown as a file name.
fn code_block(info: &str, code: &str, theme: &str) -> String {
    let mut parts = info.split_whitespace();
    let lang = parts
        .next()
        .map(str::to_lowercase)
        .unwrap_or_else(|| "text".to_string());
    let file_name = parts.collect::<Vec<_>>().join(" ");
    let label = if file_name.is_empty() { lang.clone() } else { file_name };
    let lang_class = format!("language-{}", lang);

    html! {
        div.code-block data-theme=(theme) {
            div.code-header {
                div.code-dots {
                    span.dot.dot-red {}
                    span.dot.dot-yellow {}
                    span.dot.dot-green {}
                }
                span.code-filename { (label) }
                button.code-copy title="Copy code" data-code=(code) { "Copy" }
            }
            pre { code class=(lang_class) { (code) } }
        }
    }
    .into_string()
}

fn escape_attr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fixed target → link table.
    #[derive(Default)]
    struct Table(HashMap<String, ResolvedLink>);

    impl Table {
        fn with(mut self, target: &str, route: &str, label: &str) -> Self {
            self.0.insert(
                target.to_string(),
                ResolvedLink {
                    route: route.to_string(),
                    label: label.to_string(),
                },
            );
            self
        }
    }

    impl LinkLookup for Table {
        fn resolve(&mut self, target: &str) -> Option<ResolvedLink> {
            self.0.get(&target.to_lowercase()).cloned()
        }
    }

    fn settings() -> RenderSettings {
        RenderSettings {
            wikilinks: true,
            image_policy: ImagePolicy::OmitLocal,
            gfm: true,
            theme: "github-dark".into(),
        }
    }

    fn render(markdown: &str, settings: RenderSettings, table: &mut Table) -> RenderOutput {
        PulldownRenderer::new(settings).render(markdown, table)
    }

    // =========================================================================
    // Wikilinks
    // =========================================================================

    #[test]
    fn resolved_wikilink_uses_target_title() {
        let mut table = Table::default().with("world", "/posts/world/", "World");
        let out = render("See [[world]].", settings(), &mut table);
        assert!(out.html.contains("<a href=\"/posts/world/\">World</a>"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn explicit_label_wins_and_brackets_are_stripped() {
        let mut table = Table::default().with("world", "/w/", "World");
        let out = render("[[world|the [big] world]]", settings(), &mut table);
        assert!(out.html.contains("<a href=\"/w/\">the big world</a>"));
    }

    #[test]
    fn wikilink_to_path_with_spaces_is_a_link() {
        let mut table = Table::default().with("my note", "/My Note (draft)/", "Mine");
        let out = render("See [[My Note]]", settings(), &mut table);
        assert!(out.html.contains("<a href=\"/My%20Note%20(draft)/\">Mine</a>"));
        assert!(!out.html.contains("[Mine]"));
    }

    #[test]
    fn unresolved_wikilink_is_plain_text_with_warning() {
        let out = render("[[missing|Label]]", settings(), &mut Table::default());
        assert!(out.html.contains("Label"));
        assert!(!out.html.contains("<a"));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, DiagnosticKind::UnresolvedLink);
        assert_eq!(out.warnings[0].message, "Unresolved wikilink: missing");
    }

    #[test]
    fn image_like_wikilink_warns() {
        let out = render("[[photo.PNG]]", settings(), &mut Table::default());
        assert_eq!(
            out.warnings[0].message,
            "Unresolved wikilink (looks like image): photo.PNG"
        );
    }

    #[test]
    fn wikilinks_disabled_leaves_syntax() {
        let mut s = settings();
        s.wikilinks = false;
        let mut table = Table::default().with("world", "/w/", "World");
        let out = render("[[world]]", s, &mut table);
        assert!(out.html.contains("[[world]]"));
        assert!(out.warnings.is_empty());
    }

    // =========================================================================
    // Images
    // =========================================================================

    #[test]
    fn embed_omitted_under_omit_local() {
        let out = render("![[diagram.png|Diagram]]", settings(), &mut Table::default());
        assert!(out.html.contains("<em>(image omitted: Diagram)</em>"));
        assert_eq!(out.warnings[0].kind, DiagnosticKind::ImageOmitted);
        assert_eq!(out.warnings[0].message, "Local image omitted: diagram.png");
    }

    #[test]
    fn embed_kept_becomes_image() {
        let mut s = settings();
        s.image_policy = ImagePolicy::Keep;
        let out = render("![[diagram.png]]", s, &mut Table::default());
        assert!(out.html.contains("<img src=\"diagram.png\" alt=\"diagram.png\""));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn local_markdown_image_omitted_remote_kept() {
        let md = "![local](img/a.png) ![remote](https://x.test/a.png) ![proto](//cdn.test/b.png)";
        let out = render(md, settings(), &mut Table::default());
        assert!(out.html.contains("(image omitted: local)"));
        assert!(out.html.contains("src=\"https://x.test/a.png\""));
        assert!(out.html.contains("src=\"//cdn.test/b.png\""));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn embed_is_not_treated_as_wikilink() {
        let mut table = Table::default().with("note", "/note/", "Note");
        let out = render("![[note]]", settings(), &mut table);
        assert!(!out.html.contains("href=\"/note/\""));
    }

    // =========================================================================
    // GFM and decorations
    // =========================================================================

    #[test]
    fn gfm_toggles_tables_and_strikethrough() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~";
        let on = render(md, settings(), &mut Table::default());
        assert!(on.html.contains("<table>"));
        assert!(on.html.contains("<del>gone</del>"));

        let mut s = settings();
        s.gfm = false;
        let off = render(md, s, &mut Table::default());
        assert!(!off.html.contains("<table>"));
        assert!(!off.html.contains("<del>"));
    }

    #[test]
    fn fenced_code_gets_header() {
        let md = "```rust src/main.rs\nfn main() { println!(\"<hi>\"); }\n```\n";
        let out = render(md, settings(), &mut Table::default());
        assert!(out.html.contains("class=\"code-block\""));
        assert!(out.html.contains("data-theme=\"github-dark\""));
        assert!(out.html.contains("<span class=\"code-filename\">src/main.rs</span>"));
        assert!(out.html.contains("class=\"language-rust\""));
        assert!(out.html.contains("&lt;hi&gt;"));
    }

    #[test]
    fn fence_without_info_is_text() {
        let out = render("```\nplain\n```\n", settings(), &mut Table::default());
        assert!(out.html.contains("<span class=\"code-filename\">text</span>"));
    }

    #[test]
    fn external_links_open_in_new_tab() {
        let out = render(
            "[ext](https://example.com) [int](/posts/a/)",
            settings(),
            &mut Table::default(),
        );
        assert!(out.html.contains(
            "<a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\">ext</a>"
        ));
        assert!(out.html.contains("<a href=\"/posts/a/\">int</a>"));
    }
}

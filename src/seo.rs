//! SEO settings and canonical URLs.
//!
//! SEO output (canonical links, OpenGraph/Twitter meta, `robots.txt`,
//! `sitemap.xml`) is only produced when `[seo]` names a `site_url`. The raw
//! [`SeoConfig`] from `blog.toml` is validated once into [`SeoOptions`]:
//!
//! - `site_url` must be an absolute `http`/`https` origin, nothing more
//! - `path_base` is normalized to `""` or `/segment[/segment]`
//! - optional strings are trimmed, empty ones dropped
//! - `twitter_card` is `summary` or `summary_large_image`

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;

/// `[seo]` section as written in `blog.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeoConfig {
    pub site_url: Option<String>,
    pub path_base: Option<String>,
    pub site_name: Option<String>,
    pub default_title: Option<String>,
    pub default_description: Option<String>,
    pub locale: Option<String>,
    pub twitter_card: Option<String>,
    pub twitter_site: Option<String>,
    pub twitter_creator: Option<String>,
    pub default_social_image: Option<String>,
    pub default_og_image: Option<String>,
    pub default_twitter_image: Option<String>,
}

/// Validated SEO settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeoOptions {
    /// Origin without trailing slash, e.g. `https://example.com`.
    pub site_url: String,
    /// `""` or `/blog`.
    pub path_base: String,
    pub site_name: Option<String>,
    pub default_title: Option<String>,
    pub default_description: Option<String>,
    pub locale: Option<String>,
    pub twitter_card: Option<String>,
    pub twitter_site: Option<String>,
    pub twitter_creator: Option<String>,
    pub default_social_image: Option<String>,
    pub default_og_image: Option<String>,
    pub default_twitter_image: Option<String>,
}

impl SeoOptions {
    /// Validate a raw config. `Ok(None)` when no site URL is configured.
    pub fn from_config(raw: &SeoConfig) -> Result<Option<Self>, ConfigError> {
        let Some(site_url) = raw.site_url.as_deref() else {
            return Ok(None);
        };
        let site_url = site_url.trim();
        if site_url.is_empty() {
            return Err(invalid(
                "\"seo.site_url\" must be a non-empty absolute URL origin (for example: \"https://example.com\")",
            ));
        }
        let parsed = Url::parse(site_url).map_err(|_| {
            invalid("\"seo.site_url\" must be a valid absolute URL origin (for example: \"https://example.com\")")
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid("\"seo.site_url\" must use http:// or https://"));
        }
        if parsed.path() != "/"
            || parsed.query().is_some()
            || parsed.fragment().is_some()
            || !parsed.username().is_empty()
            || parsed.password().is_some()
        {
            return Err(invalid(
                "\"seo.site_url\" must be an origin only, without path, query, hash, or credentials",
            ));
        }

        if let Some(card) = raw.twitter_card.as_deref()
            && card != "summary"
            && card != "summary_large_image"
        {
            return Err(invalid(
                "\"seo.twitter_card\" must be \"summary\" or \"summary_large_image\" when provided",
            ));
        }

        Ok(Some(Self {
            site_url: parsed.origin().ascii_serialization(),
            path_base: normalize_path_base(raw.path_base.as_deref().unwrap_or("")),
            site_name: trimmed(&raw.site_name),
            default_title: trimmed(&raw.default_title),
            default_description: trimmed(&raw.default_description),
            locale: trimmed(&raw.locale),
            twitter_card: raw.twitter_card.clone(),
            twitter_site: trimmed(&raw.twitter_site),
            twitter_creator: trimmed(&raw.twitter_creator),
            default_social_image: trimmed(&raw.default_social_image),
            default_og_image: trimmed(&raw.default_og_image),
            default_twitter_image: trimmed(&raw.default_twitter_image),
        }))
    }

    /// Absolute canonical URL of a route.
    pub fn canonical_url(&self, route: &str) -> String {
        let joined = format!("{}{}", self.path_base, normalize_route(route));
        let pathname = collapse_slashes(&joined);
        let base = format!("{}/", self.site_url);
        match Url::parse(&base).and_then(|base| base.join(&pathname)) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.site_url, pathname),
        }
    }

    /// Absolute URL for a configured image: absolute URLs pass through,
    /// root-relative paths resolve against the site origin, anything else
    /// is dropped.
    pub fn image_url(&self, value: Option<&str>) -> Option<String> {
        let trimmed = value?.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(url) = Url::parse(trimmed) {
            return Some(url.to_string());
        }
        if !trimmed.starts_with('/') {
            return None;
        }
        Url::parse(&format!("{}/", self.site_url))
            .and_then(|base| base.join(trimmed))
            .ok()
            .map(|url| url.to_string())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(format!("[config] {}", message))
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `""`, `"/"` → `""`; `"blog/"` → `"/blog"`.
pub fn normalize_path_base(path_base: &str) -> String {
    let cleaned = path_base.trim().replace('\\', "/");
    let inner = cleaned.trim_matches('/');
    if inner.is_empty() {
        String::new()
    } else {
        format!("/{}", inner)
    }
}

/// Leading slash, query/fragment dropped, duplicate slashes collapsed.
pub fn normalize_route(route: &str) -> String {
    let trimmed = route.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return "/".to_string();
    }
    let without_query = trimmed.split(['?', '#']).next().unwrap_or("");
    let prefixed = if without_query.starts_with('/') {
        without_query.to_string()
    } else {
        format!("/{}", without_query)
    };
    collapse_slashes(&prefixed)
}

fn collapse_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.is_empty() { "/".to_string() } else { out }
}

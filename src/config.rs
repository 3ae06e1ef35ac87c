//! Site configuration module.
//!
//! Handles loading and validating `blog.toml` and merging it with CLI flags
//! into the [`BuildOptions`] the pipeline runs with.
//!
//! ## Config File Location
//!
//! `blog.toml` is read from the working directory, or from the path given
//! with `--config`. A missing file is not an error: every key has a default.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! vault_dir = "."           # Directory of markdown notes
//! out_dir = "dist"          # Generated site
//! cache_dir = ".cache"      # Incremental build cache
//! exclude = []              # Extra glob patterns, added to ".obsidian/**"
//!
//! [ui]
//! new_within_days = 7       # NEW badge window
//! recent_limit = 5          # Entries in the Recent folder
//!
//! [markdown]
//! wikilinks = true
//! images = "omit-local"     # or "keep"
//! gfm = true
//!
//! [markdown.highlight]
//! theme = "github-dark"
//!
//! [pinned_menu]             # optional virtual folder
//! label = "Pinned"
//! source_dir = "notes"
//!
//! [seo]                     # optional; enables canonical URLs and sitemap
//! site_url = "https://example.com"
//! ```
//!
//! ## Precedence
//!
//! CLI flags beat `blog.toml`, which beats stock defaults. Exclude patterns
//! are the union of all three, deduplicated in first-seen order.
//!
//! Unknown keys are rejected to catch typos early.

use crate::seo::{SeoConfig, SeoOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name.
pub const CONFIG_FILE: &str = "blog.toml";

/// Always-on exclusion for Obsidian's workspace metadata.
pub const DEFAULT_EXCLUDE: &str = ".obsidian/**";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `blog.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub vault_dir: String,
    pub out_dir: String,
    pub cache_dir: String,
    /// Extra exclusion globs, relative to the vault.
    pub exclude: Vec<String>,
    pub ui: UiConfig,
    pub markdown: MarkdownConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_menu: Option<PinnedMenu>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<SeoConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            vault_dir: ".".to_string(),
            out_dir: "dist".to_string(),
            cache_dir: ".cache".to_string(),
            exclude: Vec::new(),
            ui: UiConfig::default(),
            markdown: MarkdownConfig::default(),
            pinned_menu: None,
            seo: None,
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markdown.highlight.theme.trim().is_empty() {
            return Err(ConfigError::Validation(
                "markdown.highlight.theme must not be empty".into(),
            ));
        }
        if let Some(pinned) = &self.pinned_menu {
            if pinned.label.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "pinned_menu.label must not be empty".into(),
                ));
            }
            if pinned.source_dir().is_empty() {
                return Err(ConfigError::Validation(
                    "pinned_menu.source_dir must name a vault directory".into(),
                ));
            }
        }
        if let Some(seo) = &self.seo {
            SeoOptions::from_config(seo)?;
        }
        Ok(())
    }
}

/// Explorer UI settings written into the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    /// Docs dated within this many days get a NEW badge.
    pub new_within_days: u32,
    /// Number of entries in the virtual Recent folder.
    pub recent_limit: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            new_within_days: 7,
            recent_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    pub wikilinks: bool,
    pub images: ImagePolicy,
    pub gfm: bool,
    pub highlight: HighlightConfig,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            wikilinks: true,
            images: ImagePolicy::OmitLocal,
            gfm: true,
            highlight: HighlightConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    pub theme: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "github-dark".to_string(),
        }
    }
}

/// What to do with images that point into the vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImagePolicy {
    Keep,
    #[default]
    OmitLocal,
}

impl ImagePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ImagePolicy::Keep => "keep",
            ImagePolicy::OmitLocal => "omit-local",
        }
    }
}

/// Virtual folder listing every doc under one vault directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinnedMenu {
    pub label: String,
    #[serde(rename = "source_dir")]
    raw_source_dir: String,
}

impl PinnedMenu {
    pub fn new(label: &str, source_dir: &str) -> Self {
        Self {
            label: label.to_string(),
            raw_source_dir: source_dir.to_string(),
        }
    }

    /// Source directory without surrounding slashes.
    pub fn source_dir(&self) -> &str {
        self.raw_source_dir.trim().trim_matches('/')
    }
}

/// Values given on the command line. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub vault: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub new_within_days: Option<u32>,
    pub recent_limit: Option<u32>,
}

/// Fully resolved settings for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub vault_dir: PathBuf,
    pub out_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub exclude: Vec<String>,
    pub new_within_days: u32,
    pub recent_limit: u32,
    pub pinned_menu: Option<PinnedMenu>,
    pub wikilinks: bool,
    pub image_policy: ImagePolicy,
    pub gfm: bool,
    pub theme: String,
    pub seo: Option<SeoOptions>,
}

impl BuildOptions {
    /// Options with stock defaults rooted at `base`.
    pub fn with_defaults(base: &Path) -> Self {
        resolve_build_options(&SiteConfig::default(), &CliOverrides::default(), base)
            .expect("stock config must validate")
    }
}

/// Merge config and CLI flags. Relative paths resolve against `cwd`.
pub fn resolve_build_options(
    config: &SiteConfig,
    cli: &CliOverrides,
    cwd: &Path,
) -> Result<BuildOptions, ConfigError> {
    config.validate()?;
    let seo = match &config.seo {
        Some(raw) => SeoOptions::from_config(raw)?,
        None => None,
    };

    let mut exclude: Vec<String> = Vec::new();
    let all = std::iter::once(DEFAULT_EXCLUDE.to_string())
        .chain(config.exclude.iter().cloned())
        .chain(cli.exclude.iter().cloned());
    for pattern in all {
        if !exclude.contains(&pattern) {
            exclude.push(pattern);
        }
    }

    Ok(BuildOptions {
        vault_dir: cwd.join(cli.vault.clone().unwrap_or_else(|| config.vault_dir.clone().into())),
        out_dir: cwd.join(cli.out.clone().unwrap_or_else(|| config.out_dir.clone().into())),
        cache_dir: cwd.join(&config.cache_dir),
        exclude,
        new_within_days: cli.new_within_days.unwrap_or(config.ui.new_within_days),
        recent_limit: cli.recent_limit.unwrap_or(config.ui.recent_limit),
        pinned_menu: config.pinned_menu.clone(),
        wikilinks: config.markdown.wikilinks,
        image_policy: config.markdown.images,
        gfm: config.markdown.gfm,
        theme: config.markdown.highlight.theme.trim().to_string(),
        seo,
    })
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load and validate a config file, merged on top of stock defaults.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `blog.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# vaultsite configuration
# =======================
# Every key is optional. Values shown are the defaults.

# Directory holding the markdown vault.
vault_dir = "."

# Where the generated site is written.
out_dir = "dist"

# Incremental build cache. Delete it (or run `vaultsite clean`) to force a
# full rebuild.
cache_dir = ".cache"

# Extra glob patterns to skip, relative to the vault. ".obsidian/**" is
# always excluded.
exclude = []

[ui]
# Documents whose date is within this many days get a NEW badge.
new_within_days = 7
# Number of documents listed in the virtual "Recent" folder.
recent_limit = 5

[markdown]
# Resolve [[wikilinks]] between notes.
wikilinks = true
# "omit-local" drops images stored in the vault, "keep" leaves them.
images = "omit-local"
# GitHub flavored markdown: tables, strikethrough, task lists.
gfm = true

[markdown.highlight]
# Theme name attached to code blocks as data-theme.
theme = "github-dark"

# Virtual folder pinned above "Recent", listing every note in one directory.
# [pinned_menu]
# label = "Pinned"
# source_dir = "notes"

# Canonical URLs, social meta, robots.txt and sitemap.xml.
# [seo]
# site_url = "https://example.com"
# path_base = "/blog"
# site_name = "My Notes"
# default_title = "My Notes"
# default_description = "Things I wrote down"
# locale = "en_US"
# twitter_card = "summary_large_image"
# twitter_site = "@handle"
# twitter_creator = "@handle"
# default_social_image = "/og.png"
"##
}

//! # Source Registry
//!
//! Configured feed sources and the title filter lists.
//!
//! - Sources load from a JSON object keyed by source name.
//! - Filters load from JSON or TOML (extension hint first, then content sniffing).
//! - A missing document falls back to built-in defaults; a malformed or invalid
//!   one is an error.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_SOURCES_PATH: &str = "rss_sources.json";
pub const DEFAULT_FILTERS_PATH: &str = "news_filters.json";

/// Most urgent priority.
pub const MIN_PRIORITY: u8 = 1;
/// Least urgent priority.
pub const MAX_PRIORITY: u8 = 4;

const DEFAULT_PRIORITY: u8 = 3;

/// One configured feed origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    /// Primary feed URL, always tried first.
    pub url: String,
    /// Declared alternates, tried in order after the primary.
    pub mirrors: Vec<String>,
    pub category: String,
    /// Base priority (1..=4, lower is more urgent).
    pub priority: u8,
    /// Carried through from config; not used for matching.
    pub keywords: Vec<String>,
    pub enabled: bool,
}

impl Source {
    /// Source with defaults: no mirrors, category = name, priority 3, enabled.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            category: name.clone(),
            name,
            url: url.into(),
            mirrors: Vec::new(),
            priority: DEFAULT_PRIORITY,
            keywords: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mirrors = mirrors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// On-disk shape of one source (the name is the map key).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SourceSpec {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "alt_urls", skip_serializing_if = "Vec::is_empty")]
    mirrors: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

impl From<&Source> for SourceSpec {
    fn from(s: &Source) -> Self {
        Self {
            url: Some(s.url.clone()),
            mirrors: s.mirrors.clone(),
            category: Some(s.category.clone()),
            priority: s.priority,
            keywords: s.keywords.clone(),
            enabled: s.enabled,
        }
    }
}

fn validate_url(source: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed =
        Url::parse(trimmed).with_context(|| format!("source {source:?}: invalid URL {raw:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("source {source:?}: URL {raw:?} must be http or https");
    }
    Ok(trimmed.to_string())
}

fn validate(name: &str, spec: SourceSpec) -> Result<Source> {
    let name = name.trim();
    if name.is_empty() {
        bail!("source with an empty name");
    }
    let url = spec
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow!("source {name:?}: missing required field `url`"))?;
    let url = validate_url(name, url)?;

    let mut mirrors = Vec::with_capacity(spec.mirrors.len());
    for m in spec.mirrors.iter().filter(|m| !m.trim().is_empty()) {
        mirrors.push(validate_url(name, m)?);
    }

    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&spec.priority) {
        bail!(
            "source {name:?}: priority {} outside {MIN_PRIORITY}..={MAX_PRIORITY}",
            spec.priority
        );
    }

    let category = spec
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| name.to_string());

    Ok(Source {
        name: name.to_string(),
        url,
        mirrors,
        category,
        priority: spec.priority,
        keywords: spec.keywords,
        enabled: spec.enabled,
    })
}

/// Ordered set of sources with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Build from already-constructed sources. Names must be unique.
    pub fn from_sources(sources: Vec<Source>) -> Result<Self> {
        let mut names = BTreeSet::new();
        for s in &sources {
            if !names.insert(s.name.as_str()) {
                bail!("duplicate source name {:?}", s.name);
            }
        }
        Ok(Self { sources })
    }

    /// Built-in seed used when no sources document exists.
    pub fn defaults() -> Self {
        Self {
            sources: vec![
                Source::new("Интерфакс", "https://www.interfax.ru/rss.asp").with_priority(2),
                Source::new("РБК", "https://rssexport.rbc.ru/rbcnews/news/30/full.rss")
                    .with_priority(2),
            ],
        }
    }

    /// Parse a JSON document: `{ "<name>": { "url": ..., ... }, ... }`.
    /// Sources keep document order, which breaks ties between equal priorities.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(s).context("parsing sources document")?;
        let mut sources = Vec::with_capacity(raw.len());
        for (name, value) in raw {
            let spec: SourceSpec = serde_json::from_value(value)
                .with_context(|| format!("parsing source {name:?}"))?;
            sources.push(validate(&name, spec)?);
        }
        Self::from_sources(sources)
    }

    /// Load from `path`; a missing file yields [`SourceRegistry::defaults`].
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no sources document, using built-in defaults");
            return Ok(Self::defaults());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources from {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("loading {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        let mut doc = serde_json::Map::with_capacity(self.sources.len());
        for s in &self.sources {
            let spec = serde_json::to_value(SourceSpec::from(s))
                .with_context(|| format!("serializing source {:?}", s.name))?;
            doc.insert(s.name.clone(), spec);
        }
        serde_json::to_string_pretty(&doc).context("serializing sources")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_string()?)
            .with_context(|| format!("writing sources to {}", path.display()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Snapshot of the enabled sources, in registry order.
    pub fn enabled(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    /// Toggle a source. Returns `false` if no source has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.sources.iter_mut().find(|s| s.name == name) {
            Some(s) => {
                s.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Title whitelist/blacklist.
///
/// A title passes when (whitelist empty OR it mentions a whitelist term) AND it
/// mentions no blacklist term. Matching is case-insensitive substring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl FilterSet {
    pub fn new<W, B, S>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = S>,
        B: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: clean_list(whitelist.into_iter().map(Into::into)),
            blacklist: clean_list(blacklist.into_iter().map(Into::into)),
        }
    }

    /// Plain case-insensitive substring check.
    pub fn passes(&self, title: &str) -> bool {
        self.passes_with(title, |text, term| text.contains(&term.to_lowercase()))
    }

    /// Same composition as [`FilterSet::passes`] with a custom term matcher.
    /// `mentions` receives the lowercased title and one raw term.
    pub fn passes_with<F>(&self, title: &str, mentions: F) -> bool
    where
        F: Fn(&str, &str) -> bool,
    {
        let title = title.to_lowercase();
        if !self.whitelist.is_empty() && !self.whitelist.iter().any(|w| mentions(&title, w)) {
            return false;
        }
        !self.blacklist.iter().any(|b| mentions(&title, b))
    }

    /// Load from `path` (JSON or TOML); a missing file yields empty filters.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no filters document, filtering disabled");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading filters from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_filters(&content, &ext).with_context(|| format!("loading {}", path.display()))
    }

    /// Write as TOML when the path ends in `.toml`, JSON otherwise.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let is_toml = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let body = if is_toml {
            toml::to_string_pretty(self).context("serializing filters as toml")?
        } else {
            serde_json::to_string_pretty(self).context("serializing filters as json")?
        };
        fs::write(path, body).with_context(|| format!("writing filters to {}", path.display()))
    }
}

fn parse_filters(s: &str, hint_ext: &str) -> Result<FilterSet> {
    let try_toml_first = hint_ext == "toml";
    if try_toml_first {
        if let Ok(f) = toml::from_str::<FilterSet>(s) {
            return Ok(FilterSet::new(f.whitelist, f.blacklist));
        }
    }
    if let Ok(f) = serde_json::from_str::<FilterSet>(s) {
        return Ok(FilterSet::new(f.whitelist, f.blacklist));
    }
    if !try_toml_first {
        if let Ok(f) = toml::from_str::<FilterSet>(s) {
            return Ok(FilterSet::new(f.whitelist, f.blacklist));
        }
    }
    Err(anyhow!("unsupported filters format"))
}

/// Trim, drop empties, dedup; keeps first-seen order.
fn clean_list(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_lowercase()) {
            out.push(t.to_string());
        }
    }
    out
}

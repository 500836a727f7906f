//! # Lexicon
//! Keyword matching for filters and priority rules.
//!
//! Matching is plain lowercase substring by default. A [`TextNormalizer`] can be
//! plugged in to widen matches with root forms and synonyms; it never narrows them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Text normalization capability (lemmatizer, stemmer, synonym table...).
pub trait TextNormalizer: Send + Sync {
    /// Normalized root forms of every word in `text`.
    fn roots(&self, text: &str) -> HashSet<String>;
    /// `term` plus its synonyms, each as a normalized phrase.
    fn expand(&self, term: &str) -> HashSet<String>;
}

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

/// Lowercased word tokens plus a fixed synonym table. No morphology.
#[derive(Debug, Clone)]
pub struct SynonymNormalizer {
    synonyms: HashMap<String, Vec<String>>,
}

impl Default for SynonymNormalizer {
    fn default() -> Self {
        let mut synonyms = HashMap::new();
        for (k, v) in [
            ("банк", &["банковский", "кредитное учреждение"][..]),
            ("инфляция", &["рост цен", "подорожание"][..]),
            ("кризис", &["спад", "рецессия"][..]),
        ] {
            synonyms.insert(k.to_string(), v.iter().map(|s| s.to_string()).collect());
        }
        Self { synonyms }
    }
}

impl SynonymNormalizer {
    pub fn with_synonyms(synonyms: HashMap<String, Vec<String>>) -> Self {
        let synonyms = synonyms
            .into_iter()
            .map(|(k, v)| {
                let v = v.into_iter().map(|s| s.to_lowercase()).collect();
                (k.to_lowercase(), v)
            })
            .collect();
        Self { synonyms }
    }
}

impl TextNormalizer for SynonymNormalizer {
    fn roots(&self, text: &str) -> HashSet<String> {
        let lower = text.to_lowercase();
        WORD_RE
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn expand(&self, term: &str) -> HashSet<String> {
        let key = term.trim().to_lowercase();
        let mut out: HashSet<String> = self
            .synonyms
            .get(&key)
            .map(|v| v.iter().cloned().collect())
            .unwrap_or_default();
        out.insert(key);
        out
    }
}

/// Substring matcher, optionally widened by a [`TextNormalizer`].
#[derive(Clone, Default)]
pub struct KeywordMatcher {
    normalizer: Option<Arc<dyn TextNormalizer>>,
}

impl std::fmt::Debug for KeywordMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordMatcher")
            .field("normalizer", &self.normalizer.is_some())
            .finish()
    }
}

impl KeywordMatcher {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn with_normalizer(normalizer: Arc<dyn TextNormalizer>) -> Self {
        Self {
            normalizer: Some(normalizer),
        }
    }

    /// Lowercase `text` once (and compute its roots) for repeated lookups.
    pub fn prepare(&self, text: &str) -> PreparedText<'_> {
        let lower = text.to_lowercase();
        let roots = self.normalizer.as_ref().map(|n| n.roots(&lower));
        PreparedText {
            lower,
            roots,
            normalizer: self.normalizer.as_deref(),
        }
    }
}

pub struct PreparedText<'a> {
    lower: String,
    roots: Option<HashSet<String>>,
    normalizer: Option<&'a dyn TextNormalizer>,
}

impl PreparedText<'_> {
    pub fn as_lower(&self) -> &str {
        &self.lower
    }

    pub fn mentions(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return false;
        }
        if self.lower.contains(&term) {
            return true;
        }
        let (Some(n), Some(roots)) = (self.normalizer, self.roots.as_ref()) else {
            return false;
        };
        n.expand(&term).iter().any(|form| {
            if self.lower.contains(form.as_str()) {
                return true;
            }
            let form_roots = n.roots(form);
            !form_roots.is_empty() && form_roots.is_subset(roots)
        })
    }

    pub fn mentions_any<I, S>(&self, terms: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        terms.into_iter().any(|t| self.mentions(t.as_ref()))
    }
}

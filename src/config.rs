// src/config.rs
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::notify::telegram::DEFAULT_API_BASE;
use crate::sources::{DEFAULT_FILTERS_PATH, DEFAULT_SOURCES_PATH};

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_INTERVAL_MINUTES: &str = "CHECK_INTERVAL_MINUTES";
pub const ENV_SOURCES_PATH: &str = "SOURCES_PATH";
pub const ENV_FILTERS_PATH: &str = "FILTERS_PATH";
pub const ENV_API_BASE: &str = "TELEGRAM_API_BASE";

pub const DEFAULT_INTERVAL_MINUTES: u64 = 2;

/// Process settings read from the environment at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub interval_minutes: u64,
    pub sources_path: PathBuf,
    pub filters_path: PathBuf,
    pub telegram_api_base: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("interval_minutes", &self.interval_minutes)
            .field("sources_path", &self.sources_path)
            .field("filters_path", &self.filters_path)
            .field("telegram_api_base", &self.telegram_api_base)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get(ENV_BOT_TOKEN).with_context(|| format!("{ENV_BOT_TOKEN} is not set"))?;
        let chat_id = get(ENV_CHAT_ID).with_context(|| format!("{ENV_CHAT_ID} is not set"))?;

        let interval_minutes = match get(ENV_INTERVAL_MINUTES) {
            None => DEFAULT_INTERVAL_MINUTES,
            Some(raw) => {
                let n: u64 = raw
                    .parse()
                    .with_context(|| format!("{ENV_INTERVAL_MINUTES}={raw:?} is not a number"))?;
                if n == 0 {
                    bail!("{ENV_INTERVAL_MINUTES} must be at least 1");
                }
                n
            }
        };

        Ok(Self {
            bot_token,
            chat_id,
            interval_minutes,
            sources_path: get(ENV_SOURCES_PATH)
                .unwrap_or_else(|| DEFAULT_SOURCES_PATH.to_string())
                .into(),
            filters_path: get(ENV_FILTERS_PATH)
                .unwrap_or_else(|| DEFAULT_FILTERS_PATH.to_string())
                .into(),
            telegram_api_base: get(ENV_API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_CHAT_ID, "-1001"),
        ]))
        .unwrap();
        assert_eq!(cfg.interval_minutes, 2);
        assert_eq!(cfg.sources_path, PathBuf::from("rss_sources.json"));
        assert_eq!(cfg.filters_path, PathBuf::from("news_filters.json"));
        assert_eq!(cfg.telegram_api_base, "https://api.telegram.org");
    }

    #[test]
    fn missing_or_blank_credentials_fail() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_CHAT_ID, "1")])).unwrap_err();
        assert!(err.to_string().contains(ENV_BOT_TOKEN));
        let err =
            AppConfig::from_lookup(lookup(&[(ENV_BOT_TOKEN, "t"), (ENV_CHAT_ID, "  ")])).unwrap_err();
        assert!(err.to_string().contains(ENV_CHAT_ID));
    }

    #[test]
    fn interval_must_be_positive_number() {
        let base = [(ENV_BOT_TOKEN, "t"), (ENV_CHAT_ID, "1")];
        for bad in ["0", "two", "-3"] {
            let mut pairs = base.to_vec();
            pairs.push((ENV_INTERVAL_MINUTES, bad));
            assert!(AppConfig::from_lookup(lookup(&pairs)).is_err(), "{bad}");
        }
        let mut pairs = base.to_vec();
        pairs.push((ENV_INTERVAL_MINUTES, " 15 "));
        assert_eq!(AppConfig::from_lookup(lookup(&pairs)).unwrap().interval_minutes, 15);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (ENV_BOT_TOKEN, "123:TOPSECRET"),
            (ENV_CHAT_ID, "1"),
        ]))
        .unwrap();
        assert!(!format!("{cfg:?}").contains("TOPSECRET"));
    }
}

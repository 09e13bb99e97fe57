use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::handoff::FRESHNESS_THRESHOLD_MS;

pub const DEFAULT_API_URL: &str = "https://api-sand-two-62.vercel.app/api/ask";
pub const DEFAULT_SIDEBAR_API_URL: &str = "https://example.com/analyze";
/// Frame selections must be longer than this to be captured.
pub const DEFAULT_MIN_SELECTION_CHARS: usize = 20;

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    pub api_url: String,
    pub sidebar_api_url: String,
    pub freshness_ms: u64,
    pub min_selection_chars: usize,
    /// No timeout unless configured; the transport's own behaviour applies.
    pub http_timeout: Option<Duration>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            sidebar_api_url: DEFAULT_SIDEBAR_API_URL.to_string(),
            freshness_ms: FRESHNESS_THRESHOLD_MS,
            min_selection_chars: DEFAULT_MIN_SELECTION_CHARS,
            http_timeout: None,
        }
    }
}

/// Runtime variable first, then the value embedded by `build.rs`.
pub fn get_env_var(key: &str) -> Option<String> {
    // Load .env file if it exists for development
    let _ = dotenvy::dotenv();

    if let Ok(value) = std::env::var(key) {
        if !value.is_empty() {
            return Some(value);
        }
    }

    let embedded_value = match key {
        "CODE_ASSISTANT_API_URL" => option_env!("CODE_ASSISTANT_API_URL"),
        "CODE_ASSISTANT_SIDEBAR_API_URL" => option_env!("CODE_ASSISTANT_SIDEBAR_API_URL"),
        "CODE_ASSISTANT_FRESHNESS_MS" => option_env!("CODE_ASSISTANT_FRESHNESS_MS"),
        "CODE_ASSISTANT_MIN_SELECTION_CHARS" => option_env!("CODE_ASSISTANT_MIN_SELECTION_CHARS"),
        "CODE_ASSISTANT_HTTP_TIMEOUT_SECS" => option_env!("CODE_ASSISTANT_HTTP_TIMEOUT_SECS"),
        _ => None,
    };
    embedded_value.filter(|v| !v.is_empty()).map(String::from)
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(get_env_var)
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_url = lookup("CODE_ASSISTANT_API_URL").unwrap_or(defaults.api_url);
        let sidebar_api_url =
            lookup("CODE_ASSISTANT_SIDEBAR_API_URL").unwrap_or(defaults.sidebar_api_url);
        validate_url("CODE_ASSISTANT_API_URL", &api_url)?;
        validate_url("CODE_ASSISTANT_SIDEBAR_API_URL", &sidebar_api_url)?;

        let freshness_ms = match lookup("CODE_ASSISTANT_FRESHNESS_MS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("CODE_ASSISTANT_FRESHNESS_MS is not a number: {}", raw))?,
            None => defaults.freshness_ms,
        };
        let min_selection_chars = match lookup("CODE_ASSISTANT_MIN_SELECTION_CHARS") {
            Some(raw) => raw.parse().with_context(|| {
                format!("CODE_ASSISTANT_MIN_SELECTION_CHARS is not a number: {}", raw)
            })?,
            None => defaults.min_selection_chars,
        };
        let http_timeout = match lookup("CODE_ASSISTANT_HTTP_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.parse().with_context(|| {
                format!("CODE_ASSISTANT_HTTP_TIMEOUT_SECS is not a number: {}", raw)
            })?)),
            None => None,
        };

        Ok(Self {
            api_url,
            sidebar_api_url,
            freshness_ms,
            min_selection_chars,
            http_timeout,
        })
    }

    pub fn log_status(&self) {
        info!("🔧 Code Assistant configuration:");
        info!("✅ Analysis endpoint: {}", self.api_url);
        if self.sidebar_api_url == DEFAULT_SIDEBAR_API_URL {
            warn!("⚠️ Sidebar endpoint is the placeholder {}", self.sidebar_api_url);
        } else {
            info!("✅ Sidebar endpoint: {}", self.sidebar_api_url);
        }
        info!("⏱️ Hand-off freshness: {} ms", self.freshness_ms);
        info!("✂️ Minimum frame selection: more than {} chars", self.min_selection_chars);
        match self.http_timeout {
            Some(timeout) => info!("⏳ HTTP timeout: {:?}", timeout),
            None => info!("⏳ HTTP timeout: transport default"),
        }
    }
}

fn validate_url(key: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).with_context(|| format!("{} is not a valid URL: {}", key, raw))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("{} must use http or https, got {}", key, other)),
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AssistantConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AssistantConfig::default());
        assert_eq!(config.freshness_ms, 30_000);
        assert_eq!(config.min_selection_chars, 20);
        assert!(config.http_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AssistantConfig::from_lookup(lookup(&[
            ("CODE_ASSISTANT_API_URL", "http://localhost:8080/api/ask"),
            ("CODE_ASSISTANT_FRESHNESS_MS", "5000"),
            ("CODE_ASSISTANT_HTTP_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8080/api/ask");
        assert_eq!(config.freshness_ms, 5000);
        assert_eq!(config.http_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(AssistantConfig::from_lookup(lookup(&[("CODE_ASSISTANT_API_URL", "ftp://x")])).is_err());
        assert!(AssistantConfig::from_lookup(lookup(&[("CODE_ASSISTANT_FRESHNESS_MS", "soon")])).is_err());
    }
}

//! Engine configuration with environment overrides.

use std::env;
use std::time::Duration;

/// Default data source: a static dataset next to the binary.
pub const DEFAULT_API_BASE_URL: &str = "./data/custom.json";
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_MIN_KEYWORD_CHARS: usize = 2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_DATA_API: &str = "GRAPHSYNC_DATA_API";
pub const ENV_DEBOUNCE_MS: &str = "GRAPHSYNC_DEBOUNCE_MS";
pub const ENV_SUGGEST_MS: &str = "GRAPHSYNC_SUGGEST_MS";
pub const ENV_DEFAULT_KEYWORD: &str = "GRAPHSYNC_DEFAULT_KEYWORD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP(S) endpoint or path to a static JSON dataset.
    pub api_base_url: String,
    /// Quiet period before a search fetch.
    pub debounce_delay: Duration,
    /// Quiet period before a suggestion fetch.
    pub suggest_delay: Duration,
    /// Keyword the query model starts with.
    pub default_keyword: Option<String>,
    /// Non-empty keywords shorter than this do not trigger a search.
    pub min_keyword_chars: usize,
    /// Transport timeout for a single HTTP request.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            debounce_delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            suggest_delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            default_keyword: None,
            min_keyword_chars: DEFAULT_MIN_KEYWORD_CHARS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Defaults overridden by `GRAPHSYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source. Unparseable
    /// numbers and blank strings fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_DATA_API) {
            config.api_base_url = url;
        }
        if let Some(ms) = get(ENV_DEBOUNCE_MS).and_then(|v| v.parse::<u64>().ok()) {
            config.debounce_delay = Duration::from_millis(ms);
            config.suggest_delay = config.debounce_delay;
        }
        if let Some(ms) = get(ENV_SUGGEST_MS).and_then(|v| v.parse::<u64>().ok()) {
            config.suggest_delay = Duration::from_millis(ms);
        }
        config.default_keyword = get(ENV_DEFAULT_KEYWORD);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.api_base_url, "./data/custom.json");
        assert_eq!(config.debounce_delay, Duration::from_millis(300));
        assert_eq!(config.default_keyword, None);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_DATA_API, "https://example.org/api/graph"),
            (ENV_DEBOUNCE_MS, "150"),
            (ENV_DEFAULT_KEYWORD, " africa "),
        ]));
        assert_eq!(config.api_base_url, "https://example.org/api/graph");
        assert_eq!(config.debounce_delay, Duration::from_millis(150));
        assert_eq!(config.suggest_delay, Duration::from_millis(150));
        assert_eq!(config.default_keyword.as_deref(), Some("africa"));
    }

    #[test]
    fn test_suggest_delay_independent() {
        let config = Config::from_lookup(lookup(&[
            (ENV_DEBOUNCE_MS, "300"),
            (ENV_SUGGEST_MS, "120"),
        ]));
        assert_eq!(config.debounce_delay, Duration::from_millis(300));
        assert_eq!(config.suggest_delay, Duration::from_millis(120));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[(ENV_DEBOUNCE_MS, "soon"), (ENV_DATA_API, "  ")]));
        assert_eq!(config.debounce_delay, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }
}

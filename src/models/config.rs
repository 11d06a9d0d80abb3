// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable that overrides the configured webhook URL.
pub const WEBHOOK_ENV_VAR: &str = "STOCKWATCH_WEBHOOK_URL";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Watchlist and polling cadence
    #[serde(default)]
    pub watch: WatchConfig,

    /// HTTP fetching behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Availability detection settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Webhook notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Fingerprint persistence settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment overrides (webhook URL).
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(WEBHOOK_ENV_VAR) {
            if !url.trim().is_empty() {
                self.notify.webhook_url = Some(url);
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.watch.targets.is_empty() {
            return Err(AppError::validation("No watch targets defined"));
        }
        for target in &self.watch.targets {
            url::Url::parse(&target.url)
                .map_err(|e| AppError::validation(format!("Bad target URL {}: {e}", target.url)))?;
        }
        if self.watch.interval_secs == 0 {
            return Err(AppError::validation("watch.interval_secs must be > 0"));
        }
        if self.fetcher.user_agents.is_empty() {
            return Err(AppError::validation("fetcher.user_agents is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_attempts == 0 {
            return Err(AppError::validation("fetcher.max_attempts must be > 0"));
        }
        if self.fetcher.delay_min_secs < 0.0
            || self.fetcher.delay_min_secs > self.fetcher.delay_max_secs
        {
            return Err(AppError::validation(
                "fetcher delay range must satisfy 0 <= min <= max",
            ));
        }
        if self.fetcher.backoff_base_ms == 0 {
            return Err(AppError::validation("fetcher.backoff_base_ms must be > 0"));
        }
        if self.detector.negative_phrases.is_empty() && self.detector.positive_phrases.is_empty() {
            return Err(AppError::validation("No detector phrases defined"));
        }
        if self.store.state_path.trim().is_empty() {
            return Err(AppError::validation("store.state_path is empty"));
        }
        Ok(())
    }
}

/// One product page under observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Product page URL (opaque identifier for the fingerprint store)
    pub url: String,

    /// Optional human-readable label for logs and notifications
    #[serde(default)]
    pub label: Option<String>,
}

impl WatchTarget {
    /// Display name: label if present, URL otherwise.
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.url)
    }
}

/// Watchlist and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Product pages to poll
    #[serde(default = "defaults::targets")]
    pub targets: Vec<WatchTarget>,

    /// Sleep between cycles in continuous mode, in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            targets: defaults::targets(),
            interval_secs: defaults::interval(),
        }
    }
}

/// HTTP fetching behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent pool rotated per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Accept-Language header value
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Referer header value
    #[serde(default = "defaults::referer")]
    pub referer: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the randomized pre-request delay, in seconds
    #[serde(default = "defaults::delay_min")]
    pub delay_min_secs: f64,

    /// Upper bound of the randomized pre-request delay, in seconds
    #[serde(default = "defaults::delay_max")]
    pub delay_max_secs: f64,

    /// Maximum fetch attempts per URL per cycle
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Initial retry backoff in milliseconds (doubles per attempt)
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "defaults::backoff_cap")]
    pub backoff_cap_ms: u64,

    /// Case-insensitive markers identifying anti-bot challenge pages
    #[serde(default = "defaults::challenge_markers")]
    pub challenge_markers: Vec<String>,

    /// Browser-rendering fallback command; `{url}` is substituted.
    /// Empty means the capability is absent.
    #[serde(default)]
    pub renderer_command: Vec<String>,

    /// Wait after the renderer returns before re-reading, in seconds
    #[serde(default = "defaults::renderer_retry_wait")]
    pub renderer_retry_wait_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            accept_language: defaults::accept_language(),
            referer: defaults::referer(),
            timeout_secs: defaults::timeout(),
            delay_min_secs: defaults::delay_min(),
            delay_max_secs: defaults::delay_max(),
            max_attempts: defaults::max_attempts(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_cap_ms: defaults::backoff_cap(),
            challenge_markers: defaults::challenge_markers(),
            renderer_command: Vec::new(),
            renderer_retry_wait_secs: defaults::renderer_retry_wait(),
        }
    }
}

/// Availability detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// CSS selectors tried in priority order for the purchase section
    #[serde(default = "defaults::section_selectors")]
    pub section_selectors: Vec<String>,

    /// Phrases indicating the product is not purchasable (take precedence)
    #[serde(default = "defaults::negative_phrases")]
    pub negative_phrases: Vec<String>,

    /// Phrases indicating the product is purchasable
    #[serde(default = "defaults::positive_phrases")]
    pub positive_phrases: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            section_selectors: defaults::section_selectors(),
            negative_phrases: defaults::negative_phrases(),
            positive_phrases: defaults::positive_phrases(),
        }
    }
}

/// Webhook notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Discord-compatible webhook URL; None disables delivery
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Also notify when the section changed but the product is still
    /// unavailable (lower-severity message)
    #[serde(default)]
    pub on_unavailable_change: bool,

    /// Webhook request timeout in seconds
    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            on_unavailable_change: false,
            timeout_secs: defaults::notify_timeout(),
        }
    }
}

/// Fingerprint persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the line-oriented fingerprint file
    #[serde(default = "defaults::state_path")]
    pub state_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: defaults::state_path(),
        }
    }
}

mod defaults {
    use super::WatchTarget;

    // Watch defaults: the product pages the watcher was built for.
    pub fn targets() -> Vec<WatchTarget> {
        [
            "https://www.bol.com/nl/nl/p/-/9300000235555648/",
            "https://www.bol.com/nl/nl/p/me01-mega-evolution-etb-mega-gardevoir/9300000235555646/",
            "https://www.bol.com/nl/nl/p/pokemon-tcg-mega-evolution-6-booster-bundel/9300000235555645/",
            "https://www.bol.com/nl/nl/p/me01-mega-evolution-bo-18ct-display/9300000235555637/",
        ]
        .into_iter()
        .map(|url| WatchTarget {
            url: url.to_string(),
            label: None,
        })
        .collect()
    }
    pub fn interval() -> u64 {
        300
    }

    // Fetcher defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/126.0.0.0 Safari/537.36"
                .into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like \
             Gecko) Chrome/125.0.0.0 Safari/537.36"
                .into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0"
                .into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like \
             Gecko) Version/17.5 Safari/605.1.15"
                .into(),
        ]
    }
    pub fn accept_language() -> String {
        "nl-NL,nl;q=0.9,en-US;q=0.8,en;q=0.7".into()
    }
    pub fn referer() -> String {
        "https://www.bol.com/".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn delay_min() -> f64 {
        1.5
    }
    pub fn delay_max() -> f64 {
        6.0
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        1_000
    }
    pub fn backoff_cap() -> u64 {
        10_000
    }
    pub fn challenge_markers() -> Vec<String> {
        vec![
            "checking your browser".into(),
            "please enable javascript".into(),
            "challenge".into(),
        ]
    }
    pub fn renderer_retry_wait() -> u64 {
        10
    }

    // Detector defaults: bol.com buy-block first, generic containers after.
    pub fn section_selectors() -> Vec<String> {
        vec![
            "[data-test=\"buy-block\"]".into(),
            ".buy-block".into(),
            "[data-test=\"price-block\"]".into(),
            "#mainContent".into(),
            "main".into(),
        ]
    }
    pub fn negative_phrases() -> Vec<String> {
        vec![
            "uitverkocht".into(),
            "tijdelijk niet leverbaar".into(),
            "moment niet leverbaar".into(),
            "niet leverbaar".into(),
            "sold out".into(),
            "temporarily unavailable".into(),
            "currently unavailable".into(),
        ]
    }
    pub fn positive_phrases() -> Vec<String> {
        vec![
            "op voorraad".into(),
            "direct leverbaar".into(),
            "beschikbaar".into(),
            "in winkelwagen".into(),
            "bestellen".into(),
            "bestel nu".into(),
            "in stock".into(),
            "add to cart".into(),
            "order now".into(),
        ]
    }

    // Notify defaults
    pub fn notify_timeout() -> u64 {
        10
    }

    // Store defaults
    pub fn state_path() -> String {
        ".last_hashes.txt".into()
    }
}

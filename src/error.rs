// src/error.rs

//! Unified error handling for the stock watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Classification of a failed fetch attempt.
///
/// Assigned at the point of detection so that escalation decisions
/// branch on the variant, never on error-message substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// The server refused the request outright (401/403).
    Blocked,
    /// The response body was an anti-bot interstitial, not real content.
    ChallengePage,
    /// Transport-level failure or an unexpected status code.
    NetworkError,
    /// The request exceeded the client timeout.
    Timeout,
}

impl FetchFailure {
    /// Whether this failure warrants escalating to the browser fallback.
    pub fn needs_fallback(self) -> bool {
        matches!(self, Self::Blocked | Self::ChallengePage)
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocked => "blocked by server",
            Self::ChallengePage => "challenge page served",
            Self::NetworkError => "network error",
            Self::Timeout => "request timed out",
        };
        f.write_str(s)
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fetch exhausted all strategies for one URL
    #[error("Fetch failed for {url}: {failure}")]
    Fetch { url: String, failure: FetchFailure },

    /// Browser-rendering fallback failed or is unavailable
    #[error("Renderer error: {0}")]
    Renderer(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, failure: FetchFailure) -> Self {
        Self::Fetch {
            url: url.into(),
            failure,
        }
    }

    /// Create a renderer error.
    pub fn renderer(message: impl fmt::Display) -> Self {
        Self::Renderer(message.to_string())
    }

    /// The fetch classification, if this error is a fetch failure.
    pub fn fetch_failure(&self) -> Option<FetchFailure> {
        match self {
            Self::Fetch { failure, .. } => Some(*failure),
            _ => None,
        }
    }
}

// src/fetch/headers.rs

//! Rotating realistic request headers.
//!
//! Header sets are validated and prepared once at construction, then
//! picked at random per request to avoid a static fingerprint.

use rand::Rng;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, DNT, HeaderMap, HeaderValue, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;

const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// Pool of prepared header sets, one per configured user agent.
pub struct HeaderPool {
    sets: Vec<HeaderMap>,
}

impl HeaderPool {
    /// Build the pool from configuration. Fails on invalid header values.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        if config.user_agents.is_empty() {
            return Err(AppError::config("fetcher.user_agents is empty"));
        }

        let mut sets = Vec::with_capacity(config.user_agents.len());
        for user_agent in &config.user_agents {
            let mut headers = HeaderMap::new();
            headers.insert(USER_AGENT, Self::value(user_agent)?);
            headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
            headers.insert(ACCEPT_LANGUAGE, Self::value(&config.accept_language)?);
            headers.insert(DNT, HeaderValue::from_static("1"));
            headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
            headers.insert(REFERER, Self::value(&config.referer)?);
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
            sets.push(headers);
        }

        Ok(Self { sets })
    }

    /// Pick a random header set.
    pub fn pick(&self) -> HeaderMap {
        let idx = rand::thread_rng().gen_range(0..self.sets.len());
        self.sets[idx].clone()
    }

    /// Number of header sets in the pool.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the pool is empty (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn value(s: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(s)
            .map_err(|e| AppError::config(format!("Invalid header value '{s}': {e}")))
    }
}

// src/fetch/mod.rs

//! Page fetching with layered anti-bot resilience.
//!
//! The primary strategy is a plain HTTP GET with rotating realistic
//! headers and a randomized pre-request delay. Failures are classified
//! into a small typed set at the point of detection; blocked or
//! challenged requests escalate to an optional browser-rendering
//! fallback injected at startup.

mod headers;
mod render;

pub use headers::HeaderPool;
pub use render::{CommandRenderer, PageRenderer, build_renderer};

use std::cmp;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, FetchFailure, Result};
use crate::models::FetcherConfig;

/// Source of page content for the check cycle.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page at `url`, exhausting retries and the fallback
    /// strategy before failing.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP fetcher with retry, challenge detection, and optional
/// browser-rendering fallback.
///
/// Holds its session state (client, header pool) as owned values;
/// construct once and reuse across cycles.
pub struct Fetcher {
    config: FetcherConfig,
    client: Client,
    headers: HeaderPool,
    renderer: Option<Box<dyn PageRenderer>>,
}

impl Fetcher {
    /// Create a new fetcher. The renderer is the fallback capability
    /// resolved at startup; pass `None` when it is absent.
    pub fn new(config: &FetcherConfig, renderer: Option<Box<dyn PageRenderer>>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let headers = HeaderPool::new(config)?;

        Ok(Self {
            config: config.clone(),
            client,
            headers,
            renderer,
        })
    }

    /// Whether the browser-rendering fallback is available.
    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// One primary-strategy attempt: jittered delay, GET, classify.
    async fn attempt(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let delay = random_delay(self.config.delay_min_secs, self.config.delay_max_secs);
        log::debug!(
            "Sleeping {:.1}s before request to {}",
            delay.as_secs_f64(),
            url
        );
        tokio::time::sleep(delay).await;

        let request = self.client.get(url).headers(self.headers.pick());
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(FetchFailure::Timeout),
            Err(e) => {
                log::debug!("Transport error for {}: {}", url, e);
                return Err(FetchFailure::NetworkError);
            }
        };

        let status = response.status();
        if let Some(failure) = classify_status(status) {
            log::debug!("HTTP {} for {}", status, url);
            return Err(failure);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(FetchFailure::Timeout),
            Err(e) => {
                log::debug!("Body read error for {}: {}", url, e);
                return Err(FetchFailure::NetworkError);
            }
        };

        if contains_marker(&self.config.challenge_markers, &body) {
            return Err(FetchFailure::ChallengePage);
        }

        Ok(body)
    }

    /// Escalate a blocked/challenged fetch to the rendering fallback.
    ///
    /// Without the capability this surfaces the classified failure
    /// instead of silently succeeding.
    async fn escalate(&self, url: &str, failure: FetchFailure) -> Result<String> {
        match &self.renderer {
            Some(renderer) => {
                log::info!("Escalating to browser fallback for {} ({})", url, failure);
                renderer.render(url).await
            }
            None => {
                log::warn!(
                    "Browser fallback required for {} ({}) but not configured",
                    url,
                    failure
                );
                Err(AppError::fetch(url, failure))
            }
        }
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let cap = Duration::from_millis(self.config.backoff_cap_ms);
        let mut wait = Duration::from_millis(self.config.backoff_base_ms);
        let mut last = FetchFailure::NetworkError;

        for attempt in 1..=self.config.max_attempts {
            match self.attempt(url).await {
                Ok(body) => {
                    log::debug!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(failure) if failure.needs_fallback() => {
                    log::warn!(
                        "Attempt {}/{} for {}: {}",
                        attempt,
                        self.config.max_attempts,
                        url,
                        failure
                    );
                    match self.escalate(url, failure).await {
                        Ok(body) => return Ok(body),
                        // Escalation required but capability absent: fail fast.
                        Err(e) if matches!(e, AppError::Fetch { .. }) => return Err(e),
                        Err(e) => {
                            log::warn!("Browser fallback failed for {}: {}", url, e);
                            last = failure;
                        }
                    }
                }
                Err(failure) => {
                    log::warn!(
                        "Attempt {}/{} for {}: {}",
                        attempt,
                        self.config.max_attempts,
                        url,
                        failure
                    );
                    last = failure;
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(wait).await;
                wait = next_backoff(wait, cap);
            }
        }

        Err(AppError::fetch(url, last))
    }
}

/// Classify an HTTP status into a fetch failure, or None for success.
fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(FetchFailure::Blocked)
    } else if !status.is_success() {
        Some(FetchFailure::NetworkError)
    } else {
        None
    }
}

/// Case-insensitive substring scan for challenge markers.
pub(crate) fn contains_marker(markers: &[String], body: &str) -> bool {
    let lower = body.to_lowercase();
    markers.iter().any(|m| lower.contains(&m.to_lowercase()))
}

/// Uniform random delay within `[min, max]` seconds.
fn random_delay(min_secs: f64, max_secs: f64) -> Duration {
    let secs = if max_secs > min_secs {
        rand::thread_rng().gen_range(min_secs..=max_secs)
    } else {
        min_secs
    };
    Duration::from_secs_f64(secs.max(0.0))
}

/// Double the backoff, capped at the configured ceiling.
fn next_backoff(current: Duration, cap: Duration) -> Duration {
    cmp::min(current.saturating_mul(2), cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serve the given canned responses, one connection each, counting hits.
    fn serve(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept() else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf);
                let _ = socket.write_all(response.as_bytes());
            }
        });

        (format!("http://{addr}/"), hits)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Config without jitter or meaningful backoff, for fast tests.
    fn fast_config() -> FetcherConfig {
        let mut config = FetcherConfig::default();
        config.delay_min_secs = 0.0;
        config.delay_max_secs = 0.0;
        config.backoff_base_ms = 1;
        config.backoff_cap_ms = 2;
        config.timeout_secs = 5;
        config
    }

    /// Renderer stub returning fixed HTML and counting invocations.
    struct StaticRenderer {
        html: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageRenderer for StaticRenderer {
        async fn render(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.html.clone())
        }
    }

    fn static_renderer(html: &str) -> (Box<dyn PageRenderer>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let renderer = StaticRenderer {
            html: html.to_string(),
            calls: Arc::clone(&calls),
        };
        (Box::new(renderer), calls)
    }

    #[tokio::test]
    async fn blocked_without_renderer_fails_fast() {
        let (url, hits) = serve(vec![http_response("403 Forbidden", "go away")]);
        let fetcher = Fetcher::new(&fast_config(), None).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err.fetch_failure(), Some(FetchFailure::Blocked));
        // Fail fast: no point retrying the primary strategy while blocked.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocked_with_renderer_escalates() {
        let (url, _hits) = serve(vec![http_response("403 Forbidden", "go away")]);
        let (renderer, calls) = static_renderer("<html>Op voorraad</html>");
        let fetcher = Fetcher::new(&fast_config(), Some(renderer)).unwrap();

        let html = fetcher.fetch(&url).await.unwrap();
        assert!(html.contains("Op voorraad"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn challenge_body_escalates() {
        let (url, _hits) = serve(vec![http_response(
            "200 OK",
            "<html>Checking your browser before accessing</html>",
        )]);
        let (renderer, calls) = static_renderer("<html>In winkelwagen</html>");
        let fetcher = Fetcher::new(&fast_config(), Some(renderer)).unwrap();

        let html = fetcher.fetch(&url).await.unwrap();
        assert!(html.contains("In winkelwagen"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn network_error_retries_without_escalation() {
        let config = fast_config();
        let responses = (0..config.max_attempts)
            .map(|_| http_response("500 Internal Server Error", "boom"))
            .collect();
        let (url, hits) = serve(responses);
        let (renderer, calls) = static_renderer("<html>unused</html>");
        let fetcher = Fetcher::new(&config, Some(renderer)).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err.fetch_failure(), Some(FetchFailure::NetworkError));
        // Server errors retry the primary strategy; they never escalate.
        assert_eq!(hits.load(Ordering::SeqCst), config.max_attempts as usize);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_after_transient_failure() {
        let (url, hits) = serve(vec![
            http_response("500 Internal Server Error", "boom"),
            http_response("200 OK", "<html>Op voorraad</html>"),
        ]);
        let fetcher = Fetcher::new(&fast_config(), None).unwrap();

        let html = fetcher.fetch(&url).await.unwrap();
        assert!(html.contains("Op voorraad"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn classify_status_blocking_codes() {
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Some(FetchFailure::Blocked)
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(FetchFailure::Blocked)
        );
    }

    #[test]
    fn classify_status_other_errors_are_network() {
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(FetchFailure::NetworkError)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            Some(FetchFailure::NetworkError)
        );
    }

    #[test]
    fn classify_status_success_is_none() {
        assert_eq!(classify_status(StatusCode::OK), None);
    }

    #[test]
    fn marker_scan_is_case_insensitive() {
        let markers = vec!["checking your browser".to_string()];
        assert!(contains_marker(
            &markers,
            "<html>Checking Your Browser before accessing</html>"
        ));
        assert!(!contains_marker(&markers, "<html>Op voorraad</html>"));
    }

    #[test]
    fn random_delay_stays_in_range() {
        for _ in 0..100 {
            let delay = random_delay(1.5, 6.0);
            assert!(delay >= Duration::from_secs_f64(1.5));
            assert!(delay <= Duration::from_secs_f64(6.0));
        }
    }

    #[test]
    fn random_delay_degenerate_range() {
        assert_eq!(random_delay(2.0, 2.0), Duration::from_secs_f64(2.0));
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let cap = Duration::from_millis(10_000);
        let mut wait = Duration::from_millis(1_000);
        wait = next_backoff(wait, cap);
        assert_eq!(wait, Duration::from_millis(2_000));
        wait = next_backoff(wait, cap);
        assert_eq!(wait, Duration::from_millis(4_000));
        wait = next_backoff(wait, cap);
        assert_eq!(wait, Duration::from_millis(8_000));
        wait = next_backoff(wait, cap);
        assert_eq!(wait, cap);
        wait = next_backoff(wait, cap);
        assert_eq!(wait, cap);
    }

    #[test]
    fn fetch_failure_fallback_policy() {
        assert!(FetchFailure::Blocked.needs_fallback());
        assert!(FetchFailure::ChallengePage.needs_fallback());
        assert!(!FetchFailure::NetworkError.needs_fallback());
        assert!(!FetchFailure::Timeout.needs_fallback());
    }
}

// src/fetch/render.rs

//! Browser-rendering fallback strategy.
//!
//! Defeating a vendor's bot defenses is an external capability, not a
//! stable contract. The fetcher only knows the [`PageRenderer`] trait;
//! the shipped implementation shells out to a configured headless
//! browser command and reads the rendered HTML from stdout.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;

use super::contains_marker;

/// Full browser-rendering fetch, used when the HTTP strategy is
/// blocked or served a challenge page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render the page at `url` and return its HTML.
    async fn render(&self, url: &str) -> Result<String>;
}

/// Renderer that runs an external command (e.g. a headless Chrome
/// wrapper) with `{url}` substituted into its arguments.
pub struct CommandRenderer {
    command: Vec<String>,
    challenge_markers: Vec<String>,
    retry_wait: Duration,
}

impl CommandRenderer {
    pub fn new(
        command: Vec<String>,
        challenge_markers: Vec<String>,
        retry_wait: Duration,
    ) -> Result<Self> {
        if command.is_empty() {
            return Err(AppError::config("renderer command is empty"));
        }
        Ok(Self {
            command,
            challenge_markers,
            retry_wait,
        })
    }

    async fn run_once(&self, url: &str) -> Result<String> {
        let argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace("{url}", url))
            .collect();

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::renderer(format!("failed to spawn {}: {e}", argv[0])))?;

        if !output.status.success() {
            return Err(AppError::renderer(format!(
                "{} exited with {}",
                argv[0], output.status
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| AppError::renderer(format!("renderer output is not UTF-8: {e}")))
    }
}

#[async_trait]
impl PageRenderer for CommandRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let html = self.run_once(url).await?;
        if !contains_marker(&self.challenge_markers, &html) {
            return Ok(html);
        }

        // Challenges often clear after a longer wait; retry once.
        log::warn!(
            "Rendered page for {} still carries a challenge marker; retrying once",
            url
        );
        tokio::time::sleep(self.retry_wait).await;
        self.run_once(url).await
    }
}

/// Resolve the fallback capability from configuration at startup.
///
/// An empty command means the capability is absent; the fetcher will
/// then fail fast when escalation is required.
pub fn build_renderer(config: &FetcherConfig) -> Option<Box<dyn PageRenderer>> {
    if config.renderer_command.is_empty() {
        log::info!("No browser fallback configured; blocked fetches will fail fast");
        return None;
    }

    match CommandRenderer::new(
        config.renderer_command.clone(),
        config.challenge_markers.clone(),
        Duration::from_secs(config.renderer_retry_wait_secs),
    ) {
        Ok(renderer) => Some(Box::new(renderer)),
        Err(e) => {
            log::warn!("Browser fallback disabled: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn substitutes_url_into_command() {
        let renderer = CommandRenderer::new(
            vec!["echo".into(), "<html>{url}</html>".into()],
            vec![],
            Duration::from_millis(1),
        )
        .unwrap();

        let html = renderer.render("https://example.com/p/1").await.unwrap();
        assert!(html.contains("https://example.com/p/1"));
    }

    #[tokio::test]
    async fn retries_once_on_challenge_marker() {
        let tmp = tempfile::TempDir::new().unwrap();
        let count_file = tmp.path().join("runs");
        let script = format!(
            "echo run >> {f}; echo '<html>challenge</html>'",
            f = count_file.display()
        );

        let renderer = CommandRenderer::new(
            vec!["sh".into(), "-c".into(), script],
            vec!["challenge".into()],
            Duration::from_millis(10),
        )
        .unwrap();

        let html = renderer.render("https://example.com").await.unwrap();
        assert!(html.contains("challenge"));

        let runs = std::fs::read_to_string(&count_file).unwrap();
        assert_eq!(runs.lines().count(), 2);
    }

    #[tokio::test]
    async fn failing_command_surfaces_error() {
        let renderer = CommandRenderer::new(
            vec!["sh".into(), "-c".into(), "exit 3".into()],
            vec![],
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(renderer.render("https://example.com").await.is_err());
    }

    #[test]
    fn build_renderer_absent_without_command() {
        let config = FetcherConfig::default();
        assert!(build_renderer(&config).is_none());
    }

    #[test]
    fn build_renderer_present_with_command() {
        let mut config = FetcherConfig::default();
        config.renderer_command = vec!["echo".into(), "{url}".into()];
        assert!(build_renderer(&config).is_some());
    }
}

//! Item navigation with retry, exponential backoff, and block detection
//!
//! Resolves an identifier to its candidate URLs and walks them attempt by
//! attempt until the page reports a loaded marker. Backoff sleeps happen
//! between attempts, never between candidate URLs within the same attempt.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::domain::errors::PipelineError;
use crate::domain::services::PageDriver;
use crate::infrastructure::config::NavigationConfig;
use crate::infrastructure::html_extractor::page_matches;

/// Selector group marking a login wall.
const LOGIN_WALL_MARKERS: &str = "#ap_email, #signInSubmit";

/// Denial strings scanned for in the page head.
const DENIAL_MARKERS: [&str; 3] = ["access denied", "403", "we're sorry"];

/// Navigation policy for one batch job.
pub struct NavigationPolicy {
    config: NavigationConfig,
    base_url: String,
}

impl NavigationPolicy {
    pub fn new(config: NavigationConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into(),
        }
    }

    /// Attempt budget for the re-navigation pass after a re-login on block.
    pub fn block_retry_attempts(&self) -> u32 {
        self.config.block_retry_attempts
    }

    /// Attempt budget for the initial navigation pass.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Candidate URLs for an identifier, in template order.
    pub fn candidate_urls(&self, identifier: &str) -> Vec<String> {
        let base = Url::parse(&self.base_url).ok();
        self.config
            .url_templates
            .iter()
            .map(|template| {
                let path = template.replace("{id}", identifier);
                base.as_ref()
                    .and_then(|b| b.join(&path).ok())
                    .map_or_else(
                        || format!("{}{path}", self.base_url.trim_end_matches('/')),
                        String::from,
                    )
            })
            .collect()
    }

    /// The backoff sleeps applied between attempts: `initial * multiplier^n`.
    pub fn backoff_schedule(&self, attempts: u32) -> Vec<Duration> {
        let mut backoff = self.config.initial_backoff_secs;
        let mut schedule = Vec::new();
        for _ in 1..attempts {
            schedule.push(Duration::from_secs_f64(backoff));
            backoff *= self.config.backoff_multiplier;
        }
        schedule
    }

    /// Try every candidate URL per attempt; the first page that reaches a
    /// loaded marker wins. All attempts exhausted is a `NavigationFailure`.
    pub async fn navigate_with_retry(
        &self,
        driver: &Arc<dyn PageDriver>,
        identifier: &str,
        max_attempts: u32,
    ) -> Result<(), PipelineError> {
        let urls = self.candidate_urls(identifier);
        let loaded_markers = self.config.loaded_markers.join(", ");
        let mut backoff = self.config.initial_backoff_secs;

        for attempt in 1..=max_attempts {
            for url in &urls {
                match driver.navigate(url).await {
                    Ok(()) => {
                        let snapshot = driver.snapshot().await;
                        if page_matches(&snapshot.content, &loaded_markers) {
                            debug!("Navigation succeeded for {identifier} via {url} (attempt {attempt})");
                            return Ok(());
                        }
                        debug!("Page at {url} has no loaded marker (attempt {attempt})");
                    }
                    Err(e) => debug!("Navigation to {url} failed: {e}"),
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                backoff *= self.config.backoff_multiplier;
            }
        }

        Err(PipelineError::NavigationFailure {
            identifier: identifier.to_string(),
            attempts: max_attempts,
        })
    }

    /// Inspect the current page for an anti-automation response: a login
    /// wall, a CAPTCHA marker in URL or content head, or a denial string.
    pub async fn detect_block(&self, driver: &Arc<dyn PageDriver>) -> Option<PipelineError> {
        let snapshot = driver.snapshot().await;
        let head: String = snapshot
            .content
            .chars()
            .take(self.config.block_scan_chars)
            .collect::<String>()
            .to_lowercase();

        let marker = if page_matches(&snapshot.content, LOGIN_WALL_MARKERS) {
            Some("login wall".to_string())
        } else if snapshot.url.to_lowercase().contains("captcha") || head.contains("captcha") {
            Some("captcha".to_string())
        } else {
            DENIAL_MARKERS
                .into_iter()
                .find(|marker| head.contains(marker))
                .map(ToString::to_string)
        };

        marker.map(|marker| {
            info!("🔁 Block detected: {marker}");
            PipelineError::BlockDetected { marker }
        })
    }
}

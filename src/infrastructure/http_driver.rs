//! HTTP-backed page driver with rate limiting and a shared cookie store
//!
//! One driver instance is one logical session: the cookie jar carries
//! whatever authentication the login flow established, and every navigation
//! goes through a request rate limiter for respectful crawling.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::errors::PipelineError;
use crate::domain::services::{DriverFactory, PageDriver, PageSnapshot};
use crate::infrastructure::config::SessionConfig;

/// Login credentials pulled from the environment, never from config files.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Reads `REVIEW_AGENT_EMAIL` / `REVIEW_AGENT_PASSWORD`; absent or empty
    /// values mean unauthenticated operation.
    pub fn from_env() -> Option<Self> {
        let email = std::env::var("REVIEW_AGENT_EMAIL").ok()?;
        let password = std::env::var("REVIEW_AGENT_PASSWORD").ok()?;
        if email.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { email, password })
    }
}

/// Page driver backed by a cookie-keeping HTTP client.
pub struct HttpPageDriver {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: SessionConfig,
    state: RwLock<PageSnapshot>,
}

impl HttpPageDriver {
    pub fn new(config: SessionConfig) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| PipelineError::driver(format!("Invalid user agent: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| PipelineError::driver(format!("Failed to create HTTP client: {e}")))?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second.max(1))
                .ok_or_else(|| PipelineError::driver("Rate limit must be greater than 0"))?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
            state: RwLock::new(PageSnapshot::default()),
        })
    }

    async fn fetch(&self, url: &str) -> Result<PageSnapshot, PipelineError> {
        self.rate_limiter.until_ready().await;

        debug!("Fetching URL: {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::driver(format!("Failed to fetch {url}: {e}")))?;

        let final_url = response.url().to_string();
        if !response.status().is_success() {
            return Err(PipelineError::driver(format!(
                "HTTP request failed with status {} for {url}",
                response.status()
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| PipelineError::driver(format!("Failed to read body from {url}: {e}")))?;

        debug!("Fetched {final_url} ({} chars)", content.len());
        Ok(PageSnapshot {
            url: final_url,
            content,
        })
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn navigate(&self, url: &str) -> Result<(), PipelineError> {
        let snapshot = self.fetch(url).await?;
        *self.state.write().await = snapshot;
        Ok(())
    }

    async fn snapshot(&self) -> PageSnapshot {
        self.state.read().await.clone()
    }

    /// Best-effort login: fetches the sign-in page so the session picks up
    /// its cookies, then reports whether an authenticated marker is present.
    /// Completing a real credential flow is site-specific and left to richer
    /// drivers; an unauthenticated session stays fully usable.
    async fn login(&self) -> Result<bool, PipelineError> {
        if Credentials::from_env().is_none() {
            warn!("⚠️  No credentials configured - proceeding unauthenticated");
            return Ok(false);
        }

        let login_url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.login_path
        );
        let snapshot = self.fetch(&login_url).await?;
        let authenticated = snapshot.content.contains("nav-link-accountList")
            || snapshot.content.contains("sign-out");

        *self.state.write().await = snapshot;
        info!("🔐 Login attempt finished (authenticated: {authenticated})");
        Ok(authenticated)
    }

    async fn dismiss_cookie_banner(&self) -> bool {
        // Consent banners are DOM-level; nothing to click over plain HTTP.
        true
    }

    async fn close(&self) {
        *self.state.write().await = PageSnapshot::default();
        debug!("HTTP page driver closed");
    }
}

/// Builds one fresh HTTP driver per session.
pub struct HttpDriverFactory {
    config: SessionConfig,
}

impl HttpDriverFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for HttpDriverFactory {
    async fn create(&self) -> Result<Arc<dyn PageDriver>, PipelineError> {
        Ok(Arc::new(HttpPageDriver::new(self.config.clone())?))
    }
}

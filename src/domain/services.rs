//! Collaborator seams for the batch pipeline
//!
//! The page-automation driver and the language-model client live behind these
//! traits so the orchestrator can be exercised with fakes and the real
//! implementations can be swapped without touching the state machine.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::PipelineError;

/// What the core needs to know about the page a session is currently on.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub url: String,
    pub content: String,
}

/// One authenticated page-automation context.
///
/// Implementations own whatever transport they need (HTTP client with a
/// cookie store, a real browser, a test fake); the core only navigates,
/// reads the current page, and triggers logins.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL. A successful return means the page was fetched,
    /// not that the expected content is present; callers check the snapshot.
    async fn navigate(&self, url: &str) -> Result<(), PipelineError>;

    /// The page the driver is currently on.
    async fn snapshot(&self) -> PageSnapshot;

    /// Attempt a login on the current session. `Ok(false)` means the login
    /// flow ran but did not authenticate; that is not fatal.
    async fn login(&self) -> Result<bool, PipelineError>;

    /// Best-effort dismissal of a cookie/consent banner. Failures are
    /// swallowed by the caller.
    async fn dismiss_cookie_banner(&self) -> bool {
        false
    }

    /// Release the underlying resources. Idempotent.
    async fn close(&self);
}

/// Constructs fresh page drivers for new sessions.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn PageDriver>, PipelineError>;
}

/// Minimal language-model client: one prompt in, free-form text out.
///
/// Timeout handling and lenient JSON extraction live in the analysis
/// adapter, implemented once for every analysis kind.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError>;
}

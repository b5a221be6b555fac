//! Test utilities for the batch pipeline
//!
//! Scripted fakes for the page driver, the LLM client, and the result sink,
//! so orchestration tests run without a network or a filesystem.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex;

use crate::domain::errors::PipelineError;
use crate::domain::report::{BatchSummary, ItemReport};
use crate::domain::repositories::ResultSink;
use crate::domain::services::{DriverFactory, LlmClient, PageDriver, PageSnapshot};

/// A loaded product page with core data (rating 4.5) and two reviews.
pub const PAGE_PRODUCT_OK: &str = r##"
    <html><body>
      <div id="dp-container">
        <h1><span id="productTitle">Widget One</span></h1>
        <span data-hook="average-star-rating"><span class="a-icon-alt">4,5 su 5 stelle</span></span>
        <span id="acrCustomerReviewText">87 valutazioni</span>
        <div data-hook="review">
          <i data-hook="review-star-rating"><span class="a-icon-alt">5,0 su 5 stelle</span></i>
          <span data-hook="review-body">Works beautifully, sturdy build and quick delivery too.</span>
        </div>
        <div data-hook="review">
          <i data-hook="review-star-rating"><span class="a-icon-alt">3,0 su 5 stelle</span></i>
          <span data-hook="review-body">Decent for the price but the manual is quite confusing.</span>
        </div>
      </div>
    </body></html>
"##;

/// A page with no loaded marker and no core data.
pub const PAGE_EMPTY: &str = "<html><body><p>nothing here</p></body></html>";

/// A login wall: block detection fires on the `#ap_email` form.
pub const PAGE_LOGIN_WALL: &str =
    "<html><body><form><input id='ap_email'/><input id='signInSubmit'/></form></body></html>";

type PageFn = Arc<dyn Fn(&str, u32) -> String + Send + Sync>;

/// Page driver that renders pages from a `(url, completed_logins)` closure.
pub struct FakeDriver {
    pub navigations: AtomicU32,
    pub logins: AtomicU32,
    pub closed: AtomicBool,
    login_result: bool,
    page_fn: PageFn,
    current: Mutex<PageSnapshot>,
}

impl FakeDriver {
    pub fn new(page_fn: PageFn, login_result: bool) -> Self {
        Self {
            navigations: AtomicU32::new(0),
            logins: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            login_result,
            page_fn,
            current: Mutex::new(PageSnapshot::default()),
        }
    }

    /// Driver that serves the same page for every URL.
    pub fn serving(content: &'static str) -> Self {
        Self::new(Arc::new(move |_url, _logins| content.to_string()), true)
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), PipelineError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let content = (self.page_fn)(url, self.logins.load(Ordering::SeqCst));
        *self.current.lock().await = PageSnapshot {
            url: url.to_string(),
            content,
        };
        Ok(())
    }

    async fn snapshot(&self) -> PageSnapshot {
        self.current.lock().await.clone()
    }

    async fn login(&self) -> Result<bool, PipelineError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(self.login_result)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory handing out clones of one shared fake driver.
pub struct FakeFactory {
    pub created: AtomicU32,
    driver: Arc<FakeDriver>,
}

impl FakeFactory {
    pub fn new(driver: Arc<FakeDriver>) -> Self {
        Self {
            created: AtomicU32::new(0),
            driver,
        }
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn create(&self) -> Result<Arc<dyn PageDriver>, PipelineError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.driver.clone() as Arc<dyn PageDriver>)
    }
}

/// LLM fake with a fixed response and a call counter.
pub struct FakeLlm {
    pub calls: AtomicU32,
    response: String,
}

impl FakeLlm {
    pub fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            response: response.to_string(),
        })
    }

    /// A response with preamble noise around the JSON payload, the way
    /// chatty models actually answer.
    pub fn chatty() -> Arc<Self> {
        Self::new("Sure! Here is the analysis: {\"overall_sentiment\": \"positive\", \"confidence\": 0.8} hope it helps")
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// In-memory result sink; optionally fails item writes.
#[derive(Default)]
pub struct MemorySink {
    pub items: Mutex<Vec<ItemReport>>,
    pub summaries: Mutex<Vec<BatchSummary>>,
    pub fail_items: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_items() -> Arc<Self> {
        let sink = Self::default();
        sink.fail_items.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn persist_item(&self, report: &ItemReport) -> Option<PathBuf> {
        if self.fail_items.load(Ordering::SeqCst) {
            return None;
        }
        let path = PathBuf::from(format!(
            "mem://batch_report_{}.json",
            report.metadata.identifier
        ));
        self.items.lock().await.push(report.clone());
        Some(path)
    }

    async fn persist_summary(&self, summary: &BatchSummary) -> Option<PathBuf> {
        let path = PathBuf::from(format!("mem://batch_summary_{}.json", summary.batch_id));
        self.summaries.lock().await.push(summary.clone());
        Some(path)
    }
}

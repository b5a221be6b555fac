//! End-to-end state machine scenarios over scripted fakes
//!
//! Exercises the full orchestrator loop: retry routing, block handling with
//! re-login, cancellation, and summary accumulation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::analysis::AnalysisAdapter;
use crate::application::navigator::NavigationPolicy;
use crate::application::orchestrator::{BatchOptions, BatchOrchestrator};
use crate::application::session_registry::SessionRegistry;
use crate::domain::errors::PipelineError;
use crate::domain::events::ProgressEvent;
use crate::domain::repositories::ResultSink;
use crate::domain::services::LlmClient;
use crate::infrastructure::config::{AnalysisConfig, NavigationConfig};
use crate::infrastructure::html_extractor::ReviewPageExtractor;
use crate::test_utils::{FakeDriver, FakeFactory, FakeLlm, MemorySink, PAGE_LOGIN_WALL, PAGE_PRODUCT_OK};

/// Page that reached its loaded marker but carries no core product data.
const PAGE_LOADED_NO_DATA: &str =
    "<html><body><div id='dp-container'><p>still loading</p></div></body></html>";

fn default_options() -> BatchOptions {
    BatchOptions {
        max_reviews: 15,
        delay_between_items_secs: 0.0,
        max_retries: 1,
    }
}

fn harness(
    driver: Arc<FakeDriver>,
    llm: Arc<dyn LlmClient>,
    sink: Arc<dyn ResultSink>,
    options: BatchOptions,
    cancel: CancellationToken,
) -> (
    BatchOrchestrator,
    mpsc::UnboundedReceiver<ProgressEvent>,
    Arc<FakeFactory>,
    Arc<SessionRegistry>,
) {
    let factory = Arc::new(FakeFactory::new(driver));
    let registry = Arc::new(SessionRegistry::new(factory.clone()));
    let navigator = NavigationPolicy::new(NavigationConfig::default(), "https://www.example.test");
    let extractor = ReviewPageExtractor::new().unwrap();
    let analysis = AnalysisAdapter::new(llm, AnalysisConfig::default());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let orchestrator = BatchOrchestrator::new(
        registry.clone(),
        navigator,
        extractor,
        analysis,
        sink,
        events_tx,
        cancel,
        options,
    );
    (orchestrator, events_rx, factory, registry)
}

fn drain(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn scenario_mixed_success_and_repeated_failure() {
    // X1 always extracts with rating 4.5; X2 loads but never has core data.
    let driver = Arc::new(FakeDriver::new(
        Arc::new(|url: &str, _logins| {
            if url.contains("X1") {
                PAGE_PRODUCT_OK.to_string()
            } else {
                PAGE_LOADED_NO_DATA.to_string()
            }
        }),
        true,
    ));
    let llm = FakeLlm::chatty();
    let sink = MemorySink::new();
    let (orchestrator, events_rx, _, _) = harness(
        driver,
        llm.clone(),
        sink.clone(),
        default_options(),
        CancellationToken::new(),
    );

    let outcome = orchestrator
        .run(vec!["X1".to_string(), "X2".to_string()])
        .await
        .unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.summary.count, 2);
    assert!(outcome.summary_path.is_some());

    let x1 = &outcome.summary.results[0];
    assert_eq!(x1.identifier, "X1");
    assert!(x1.success);
    assert_eq!(x1.rating_average, 4.5);
    assert!(x1.path.is_some(), "successful item gets a report path");

    let x2 = &outcome.summary.results[1];
    assert_eq!(x2.identifier, "X2");
    assert!(!x2.success);
    assert!(x2.path.is_none(), "failed item has no report");
    assert_eq!(
        x2.errors,
        vec!["Core product data missing".to_string()],
        "exactly one recorded error after two attempts"
    );

    // X1 ran sentiment + themes; the repeatedly failing X2 never reached
    // the language model.
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    assert_eq!(sink.items.lock().await.len(), 1);

    let events = drain(events_rx);
    assert!(matches!(events.first(), Some(ProgressEvent::StartAgent { .. })));
    assert!(matches!(events.last(), Some(ProgressEvent::Done { summary_path: Some(_), .. })));
}

#[tokio::test(start_paused = true)]
async fn scenario_block_triggers_relogin_then_success() {
    // Until the second login completes the site serves a login wall.
    let driver = Arc::new(FakeDriver::new(
        Arc::new(|_url: &str, logins| {
            if logins < 2 {
                PAGE_LOGIN_WALL.to_string()
            } else {
                PAGE_PRODUCT_OK.to_string()
            }
        }),
        true,
    ));
    let sink = MemorySink::new();
    let (orchestrator, _events_rx, _, _) = harness(
        driver.clone(),
        FakeLlm::chatty(),
        sink,
        default_options(),
        CancellationToken::new(),
    );

    let outcome = orchestrator.run(vec!["X1".to_string()]).await.unwrap();

    let entry = &outcome.summary.results[0];
    assert!(entry.success, "item recovers after re-login");
    assert_eq!(
        driver.logins.load(Ordering::SeqCst),
        2,
        "one login at session open, one after the block"
    );
}

/// LLM that cancels the job token on its nth call.
struct CancellingLlm {
    inner: Arc<FakeLlm>,
    cancel_on_call: u32,
    calls: AtomicU32,
    token: CancellationToken,
}

#[async_trait::async_trait]
impl LlmClient for CancellingLlm {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.cancel_on_call {
            self.token.cancel();
        }
        self.inner.complete(prompt).await
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_analyze_keeps_persisted_entries() {
    let driver = Arc::new(FakeDriver::serving(PAGE_PRODUCT_OK));
    let token = CancellationToken::new();
    // Items make two LLM calls each; call 5 is item 3's sentiment pass.
    let llm = Arc::new(CancellingLlm {
        inner: FakeLlm::chatty(),
        cancel_on_call: 5,
        calls: AtomicU32::new(0),
        token: token.clone(),
    });
    let sink = MemorySink::new();
    let identifiers: Vec<String> = (1..=5).map(|i| format!("X{i}")).collect();

    let (orchestrator, events_rx, factory, registry) = harness(
        driver,
        llm,
        sink.clone(),
        default_options(),
        token,
    );

    let outcome = orchestrator.run(identifiers).await.unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.summary_path.is_none(), "no summary file on cancel");
    assert_eq!(outcome.summary.count, 2, "items 1-2 resolved before cancellation");
    assert_eq!(sink.items.lock().await.len(), 2);
    assert!(sink.summaries.lock().await.is_empty());

    let events = drain(events_rx);
    assert!(matches!(events.last(), Some(ProgressEvent::Cancelled { .. })));

    // The session was closed; acquiring the same id again builds a fresh one.
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    registry.acquire("sess_after_cancel").await.unwrap();
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn sink_failure_never_fails_the_item() {
    let driver = Arc::new(FakeDriver::serving(PAGE_PRODUCT_OK));
    let sink = MemorySink::failing_items();
    let (orchestrator, _events_rx, _, _) = harness(
        driver,
        FakeLlm::chatty(),
        sink,
        default_options(),
        CancellationToken::new(),
    );

    let outcome = orchestrator.run(vec!["X1".to_string()]).await.unwrap();

    let entry = &outcome.summary.results[0];
    assert!(entry.success, "persistence failure does not fail the item");
    assert!(entry.path.is_none());
}

#[tokio::test(start_paused = true)]
async fn result_order_matches_input_order() {
    let driver = Arc::new(FakeDriver::new(
        Arc::new(|url: &str, _| {
            if url.contains("OK") {
                PAGE_PRODUCT_OK.to_string()
            } else {
                PAGE_LOADED_NO_DATA.to_string()
            }
        }),
        true,
    ));
    let (orchestrator, _events_rx, _, _) = harness(
        driver,
        FakeLlm::chatty(),
        MemorySink::new(),
        default_options(),
        CancellationToken::new(),
    );

    let identifiers = vec!["A-FAIL".to_string(), "B-OK".to_string(), "C-FAIL".to_string()];
    let outcome = orchestrator.run(identifiers.clone()).await.unwrap();

    assert_eq!(outcome.summary.count, identifiers.len());
    let order: Vec<&str> = outcome
        .summary
        .results
        .iter()
        .map(|entry| entry.identifier.as_str())
        .collect();
    assert_eq!(order, vec!["A-FAIL", "B-OK", "C-FAIL"]);
}

/// Loaded page variants for every combination of {valid title, valid rating}.
const PAGE_TITLE_AND_RATING: &str = r#"<html><div id='dp-container'>
    <span id="productTitle">Widget</span>
    <span data-hook="average-star-rating"><span class="a-icon-alt">4,0 su 5 stelle</span></span>
    </div></html>"#;
const PAGE_TITLE_ONLY: &str = r#"<html><div id='dp-container'>
    <span id="productTitle">Widget</span>
    </div></html>"#;
const PAGE_RATING_ONLY: &str = r#"<html><div id='dp-container'>
    <span data-hook="average-star-rating"><span class="a-icon-alt">4,0 su 5 stelle</span></span>
    </div></html>"#;

#[rstest::rstest]
#[case::title_and_rating(PAGE_TITLE_AND_RATING, true)]
#[case::title_only(PAGE_TITLE_ONLY, false)]
#[case::rating_only(PAGE_RATING_ONLY, false)]
#[case::neither(PAGE_LOADED_NO_DATA, false)]
#[tokio::test(start_paused = true)]
async fn core_predicate_is_the_sole_analysis_gate(
    #[case] page: &'static str,
    #[case] analyzed: bool,
) {
    let driver = Arc::new(FakeDriver::serving(page));
    let llm = FakeLlm::chatty();
    let (orchestrator, _events_rx, _, _) = harness(
        driver,
        llm.clone(),
        MemorySink::new(),
        default_options(),
        CancellationToken::new(),
    );

    let outcome = orchestrator.run(vec!["X1".to_string()]).await.unwrap();

    let entry = &outcome.summary.results[0];
    assert_eq!(entry.success, analyzed);
    assert_eq!(
        llm.calls.load(Ordering::SeqCst) > 0,
        analyzed,
        "analysis runs exactly when the core predicate holds"
    );
}

#[tokio::test(start_paused = true)]
async fn inter_item_delay_is_applied_between_items() {
    let driver = Arc::new(FakeDriver::serving(PAGE_PRODUCT_OK));
    let mut options = default_options();
    options.delay_between_items_secs = 5.0;

    let (orchestrator, _events_rx, _, _) = harness(
        driver,
        FakeLlm::chatty(),
        MemorySink::new(),
        options,
        CancellationToken::new(),
    );

    let started = tokio::time::Instant::now();
    let outcome = orchestrator
        .run(vec!["X1".to_string(), "X2".to_string()])
        .await
        .unwrap();

    assert_eq!(outcome.summary.count, 2);
    // One inter-item pause (not after the last item), plus up to 20% jitter.
    let elapsed = started.elapsed();
    assert!(elapsed >= std::time::Duration::from_secs_f64(5.0));
    assert!(elapsed < std::time::Duration::from_secs_f64(7.0));
}

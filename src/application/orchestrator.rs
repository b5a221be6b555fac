//! Batch orchestrator: the per-job session state machine
//!
//! Drives one authenticated session through an ordered queue of identifiers:
//! navigate → extract → analyze → report → persist, with per-item retry,
//! re-login on block, and durable accumulation of one `ResultEntry` per
//! identifier regardless of outcome. Collaborator failures are folded into
//! recorded errors; only external cancellation stops the machine early.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::analysis::AnalysisAdapter;
use crate::application::navigator::NavigationPolicy;
use crate::application::session_registry::SessionRegistry;
use crate::domain::analysis::AnalysisResult;
use crate::domain::events::{ProgressEvent, StepStatus};
use crate::domain::product::ProductRecord;
use crate::domain::report::{BatchSummary, ItemReport, ReportTimings, ResultEntry};
use crate::domain::repositories::ResultSink;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::html_extractor::ReviewPageExtractor;

/// Runtime options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_reviews: usize,
    pub delay_between_items_secs: f64,
    pub max_retries: u32,
}

impl BatchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_reviews: config.extraction.max_reviews,
            delay_between_items_secs: config.batch.delay_between_items_secs,
            max_retries: config.batch.max_retries,
        }
    }
}

/// Job-level state, owned exclusively by the orchestrator.
#[derive(Debug)]
pub struct BatchState {
    pub identifiers: Vec<String>,
    pub cursor: usize,
    pub session_id: String,
    pub auth_ok: bool,
    pub results: Vec<ResultEntry>,
}

impl BatchState {
    fn new(identifiers: Vec<String>) -> Self {
        Self {
            identifiers,
            cursor: 0,
            session_id: format!("sess_{}", short_id()),
            auth_ok: false,
            results: Vec::new(),
        }
    }
}

/// Per-identifier transient state, reset whenever the cursor moves.
#[derive(Debug)]
struct ItemAttempt {
    identifier: String,
    retry_count: u32,
    record: ProductRecord,
    success: bool,
    errors: Vec<String>,
    sentiment: Option<AnalysisResult>,
    themes: Option<AnalysisResult>,
    report: Option<ItemReport>,
    scrape_duration: f64,
    block_retry_used: bool,
}

impl ItemAttempt {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            retry_count: 0,
            record: ProductRecord::empty(identifier),
            success: false,
            errors: Vec::new(),
            sentiment: None,
            themes: None,
            report: None,
            scrape_duration: 0.0,
            block_retry_used: false,
        }
    }
}

/// The states of the batch machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    OpenSession,
    PickNext,
    ScrapeItem,
    Analyze,
    BuildReport,
    PersistResult,
    Advance,
    Finalize,
    Terminal,
}

/// What a finished (or cancelled) run hands back to the job layer.
#[derive(Debug)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub summary_path: Option<PathBuf>,
    pub cancelled: bool,
    pub auth_ok: bool,
}

pub struct BatchOrchestrator {
    registry: Arc<SessionRegistry>,
    navigator: NavigationPolicy,
    extractor: ReviewPageExtractor,
    analysis: AnalysisAdapter,
    sink: Arc<dyn ResultSink>,
    events: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancellationToken,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        navigator: NavigationPolicy,
        extractor: ReviewPageExtractor,
        analysis: AnalysisAdapter,
        sink: Arc<dyn ResultSink>,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
        options: BatchOptions,
    ) -> Self {
        Self {
            registry,
            navigator,
            extractor,
            analysis,
            sink,
            events,
            cancel,
            options,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        // Subscribers may be gone; progress is advisory.
        let _ = self.events.send(event);
    }

    /// Run the whole batch. The only error path is a session that could
    /// never be created; everything else is folded into the outcome.
    pub async fn run(
        &self,
        identifiers: Vec<String>,
    ) -> Result<BatchOutcome, crate::domain::errors::PipelineError> {
        let mut state = BatchState::new(identifiers);
        let mut attempt = ItemAttempt::new("");
        let mut auth_duration = 0.0_f64;
        let mut finalized: Option<(BatchSummary, Option<PathBuf>)> = None;
        let mut phase = Phase::OpenSession;

        info!("🚀 Starting batch: {}", state.identifiers.join(", "));

        loop {
            if self.cancel.is_cancelled() && phase != Phase::Terminal {
                return Ok(self.cancelled_outcome(state).await);
            }

            phase = match phase {
                Phase::OpenSession => {
                    self.emit(ProgressEvent::StartAgent {
                        status: StepStatus::Running,
                    });
                    self.emit(ProgressEvent::Login {
                        status: StepStatus::Running,
                        ok: None,
                    });

                    let started = Instant::now();
                    let session = self.registry.acquire(&state.session_id).await?;
                    state.auth_ok = session.auth_ok();
                    auth_duration = started.elapsed().as_secs_f64();

                    self.emit(ProgressEvent::Login {
                        status: StepStatus::Done,
                        ok: Some(state.auth_ok),
                    });
                    self.emit(ProgressEvent::StartAgent {
                        status: StepStatus::Done,
                    });
                    Phase::PickNext
                }

                Phase::PickNext => {
                    if state.cursor >= state.identifiers.len() {
                        info!("✅ All identifiers processed");
                        Phase::Finalize
                    } else {
                        let identifier = state.identifiers[state.cursor].clone();
                        info!(
                            "🎯 Next identifier: {identifier} ({}/{})",
                            state.cursor + 1,
                            state.identifiers.len()
                        );
                        attempt = ItemAttempt::new(&identifier);
                        self.emit(ProgressEvent::NavigateProduct {
                            status: StepStatus::Running,
                            identifier,
                        });
                        Phase::ScrapeItem
                    }
                }

                Phase::ScrapeItem => {
                    self.emit(ProgressEvent::ScrapeReviews {
                        status: StepStatus::Running,
                        identifier: attempt.identifier.clone(),
                        reviews_extracted: None,
                        error: None,
                    });

                    // Each scrape pass reports its own failure reasons.
                    attempt.errors.clear();
                    let started = Instant::now();
                    self.scrape_item(&state, &mut attempt).await;
                    attempt.scrape_duration += started.elapsed().as_secs_f64();

                    self.emit(ProgressEvent::ScrapeReviews {
                        status: if attempt.success {
                            StepStatus::Done
                        } else {
                            StepStatus::Error
                        },
                        identifier: attempt.identifier.clone(),
                        reviews_extracted: Some(attempt.record.reviews.len()),
                        error: attempt.errors.first().cloned(),
                    });

                    if attempt.success {
                        Phase::Analyze
                    } else if attempt.retry_count < self.options.max_retries {
                        attempt.retry_count += 1;
                        info!(
                            "🔄 Retrying {} (retry {}/{})",
                            attempt.identifier, attempt.retry_count, self.options.max_retries
                        );
                        Phase::ScrapeItem
                    } else {
                        // A repeatedly failing item never reaches the LLM.
                        Phase::PersistResult
                    }
                }

                Phase::Analyze => {
                    self.emit(ProgressEvent::LlmSentiment {
                        status: StepStatus::Running,
                        identifier: attempt.identifier.clone(),
                    });
                    let sentiment = self.analysis.analyze_sentiment(&attempt.record).await;
                    self.emit(ProgressEvent::LlmSentiment {
                        status: StepStatus::Done,
                        identifier: attempt.identifier.clone(),
                    });

                    self.emit(ProgressEvent::LlmThemes {
                        status: StepStatus::Running,
                        identifier: attempt.identifier.clone(),
                    });
                    let themes = self.analysis.analyze_themes(&attempt.record).await;
                    self.emit(ProgressEvent::LlmThemes {
                        status: StepStatus::Done,
                        identifier: attempt.identifier.clone(),
                    });

                    attempt.sentiment = Some(sentiment);
                    attempt.themes = Some(themes);
                    Phase::BuildReport
                }

                Phase::BuildReport => {
                    let timings = ReportTimings {
                        auth_duration,
                        scrape_duration: attempt.scrape_duration,
                    };
                    attempt.report = Some(ItemReport::assemble(
                        &attempt.record,
                        attempt.success,
                        &attempt.errors,
                        attempt.sentiment.as_ref(),
                        attempt.themes.as_ref(),
                        &timings,
                        state.auth_ok,
                    ));
                    self.emit(ProgressEvent::BuildReport {
                        status: StepStatus::Done,
                        identifier: attempt.identifier.clone(),
                    });
                    Phase::PersistResult
                }

                Phase::PersistResult => {
                    let path = match &attempt.report {
                        Some(report) => self.sink.persist_item(report).await,
                        None => None,
                    };

                    if let Some(saved) = &path {
                        self.emit(ProgressEvent::ReportSaved {
                            status: StepStatus::Done,
                            identifier: attempt.identifier.clone(),
                            path: Some(saved.display().to_string()),
                        });
                    }

                    state.results.push(ResultEntry::from_record(
                        &attempt.record,
                        path,
                        attempt.success,
                        attempt.errors.clone(),
                    ));
                    Phase::Advance
                }

                Phase::Advance => {
                    let delay = self.options.delay_between_items_secs;
                    if delay > 0.0 && state.cursor + 1 < state.identifiers.len() {
                        // Human-like pacing: the configured delay plus jitter.
                        let jitter = fastrand::f64() * 0.2 * delay;
                        tokio::time::sleep(Duration::from_secs_f64(delay + jitter)).await;
                    }
                    state.cursor += 1;
                    Phase::PickNext
                }

                Phase::Finalize => {
                    self.registry.release(&state.session_id).await;

                    let summary = BatchSummary::new(state.results.clone());
                    let summary_path = self.sink.persist_summary(&summary).await;
                    self.emit(ProgressEvent::Done {
                        status: StepStatus::Done,
                        summary_path: summary_path.as_ref().map(|p| p.display().to_string()),
                    });

                    finalized = Some((summary, summary_path));
                    Phase::Terminal
                }

                Phase::Terminal => break,
            };
        }

        let (summary, summary_path) = finalized.unwrap_or_else(|| {
            // Unreachable in practice: Terminal is only entered via Finalize.
            (BatchSummary::new(state.results.clone()), None)
        });

        info!("🏁 Batch completed ({} results)", summary.count);
        Ok(BatchOutcome {
            summary,
            summary_path,
            cancelled: false,
            auth_ok: state.auth_ok,
        })
    }

    /// One scrape pass: navigation (with block handling) plus extraction.
    /// Failures become recorded errors on the attempt, never an early return
    /// out of the state machine.
    async fn scrape_item(&self, state: &BatchState, attempt: &mut ItemAttempt) {
        let session = match self.registry.acquire(&state.session_id).await {
            Ok(session) => session,
            Err(e) => {
                attempt.record = ProductRecord::empty(&attempt.identifier);
                attempt.success = false;
                attempt.errors.push(e.to_string());
                return;
            }
        };

        session.handle_cookie_banner_once().await;
        let driver = session.driver();

        let mut navigation = self
            .navigator
            .navigate_with_retry(driver, &attempt.identifier, self.navigator.max_attempts())
            .await;

        // On a blocked page, re-login and re-navigate with a reduced attempt
        // budget. At most once per identifier, across scrape retries too.
        if navigation.is_err() && !attempt.block_retry_used {
            if let Some(block) = self.navigator.detect_block(driver).await {
                attempt.block_retry_used = true;
                info!("🔁 {block} → re-login and retry");

                self.emit(ProgressEvent::Login {
                    status: StepStatus::Running,
                    ok: None,
                });
                let ok = session.login().await;
                self.emit(ProgressEvent::Login {
                    status: StepStatus::Done,
                    ok: Some(ok),
                });

                navigation = self
                    .navigator
                    .navigate_with_retry(
                        driver,
                        &attempt.identifier,
                        self.navigator.block_retry_attempts(),
                    )
                    .await;
            }
        }

        if let Err(e) = navigation {
            self.emit(ProgressEvent::NavigateProduct {
                status: StepStatus::Error,
                identifier: attempt.identifier.clone(),
            });
            attempt.record = ProductRecord::empty(&attempt.identifier);
            attempt.success = false;
            attempt.errors.push(e.to_string());
            return;
        }

        self.emit(ProgressEvent::NavigateProduct {
            status: StepStatus::Done,
            identifier: attempt.identifier.clone(),
        });

        let snapshot = driver.snapshot().await;
        let record = self.extractor.extract(
            &snapshot,
            &attempt.identifier,
            self.options.max_reviews,
            session.auth_ok(),
        );

        attempt.success = record.has_core_data();
        if !attempt.success {
            attempt
                .errors
                .push(crate::domain::errors::PipelineError::ExtractionIncomplete.to_string());
        }
        attempt.record = record;
    }

    async fn cancelled_outcome(&self, state: BatchState) -> BatchOutcome {
        warn!(
            "🛑 Batch cancelled at item {}/{}",
            state.cursor + 1,
            state.identifiers.len()
        );
        self.registry.release_all().await;
        self.emit(ProgressEvent::Cancelled {
            status: StepStatus::Done,
        });

        BatchOutcome {
            summary: BatchSummary::new(state.results.clone()),
            summary_path: None,
            cancelled: true,
            auth_ok: state.auth_ok,
        }
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

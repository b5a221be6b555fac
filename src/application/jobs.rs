//! Transport-agnostic job control surface
//!
//! Wraps batch runs as jobs: create, stream progress events (terminated by
//! an end marker), fetch a report rendering, cancel. Concurrent jobs pass
//! through a counting admission gate; each job owns its session registry so
//! no two jobs ever share an authenticated context.

use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, Semaphore, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::application::analysis::AnalysisAdapter;
use crate::application::navigator::NavigationPolicy;
use crate::application::orchestrator::{BatchOptions, BatchOrchestrator};
use crate::application::session_registry::SessionRegistry;
use crate::domain::events::{ProgressEvent, StepStatus};
use crate::domain::report::{ItemReport, ResultEntry};
use crate::domain::repositories::ResultSink;
use crate::domain::services::{DriverFactory, LlmClient};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::html_extractor::ReviewPageExtractor;
use crate::infrastructure::report_sink::FileReportSink;

/// Options recognized at job creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    pub max_reviews: Option<usize>,
    pub delay_between_items: Option<f64>,
    pub headless: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

/// One element of a job's event stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum JobEvent {
    Progress {
        job_id: String,
        #[serde(flatten)]
        event: ProgressEvent,
    },
    /// End marker: always the last element of the stream.
    StreamEnd { job_id: String, step: String },
}

impl JobEvent {
    fn stream_end(job_id: &str) -> Self {
        Self::StreamEnd {
            job_id: job_id.to_string(),
            step: "_stream_end".to_string(),
        }
    }

    pub fn is_stream_end(&self) -> bool {
        matches!(self, Self::StreamEnd { .. })
    }
}

/// One batch job and its stream plumbing.
pub struct Job {
    pub id: String,
    identifiers: Vec<String>,
    options: JobOptions,
    status: RwLock<JobStatus>,
    cancel: CancellationToken,
    events_tx: mpsc::UnboundedSender<JobEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<JobEvent>>>,
    results: RwLock<Vec<ResultEntry>>,
}

impl Job {
    fn new(identifiers: Vec<String>, options: JobOptions) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: format!("job_{}", &Uuid::new_v4().simple().to_string()[..8]),
            identifiers,
            options,
            status: RwLock::new(JobStatus::Pending),
            cancel: CancellationToken::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            results: RwLock::new(Vec::new()),
        })
    }

    fn send(&self, event: JobEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Registry and runner for batch jobs.
pub struct JobManager {
    config: AppConfig,
    factory: Arc<dyn DriverFactory>,
    llm: Arc<dyn LlmClient>,
    jobs: RwLock<HashMap<String, Arc<Job>>>,
    permits: Arc<Semaphore>,
}

impl JobManager {
    pub fn new(config: AppConfig, factory: Arc<dyn DriverFactory>, llm: Arc<dyn LlmClient>) -> Self {
        let permits = Arc::new(Semaphore::new(config.batch.max_concurrent_jobs.max(1)));
        Self {
            config,
            factory,
            llm,
            jobs: RwLock::new(HashMap::new()),
            permits,
        }
    }

    /// Create a job and spawn its runner. Fails on an empty identifier list.
    pub async fn create_job(
        &self,
        identifiers: Vec<String>,
        options: JobOptions,
    ) -> Result<String, anyhow::Error> {
        if identifiers.is_empty() {
            anyhow::bail!("Identifier list is empty");
        }

        let job = Job::new(identifiers, options);
        let job_id = job.id.clone();
        self.jobs.write().await.insert(job_id.clone(), job.clone());
        info!("Created {job_id} ({} identifiers)", job.identifiers.len());

        let config = self.config.clone();
        let factory = self.factory.clone();
        let llm = self.llm.clone();
        let permits = self.permits.clone();
        tokio::spawn(run_job(job, config, factory, llm, permits));

        Ok(job_id)
    }

    /// The job's event stream, terminated by the end marker. Single
    /// consumer: a second call for the same job returns `None`.
    pub async fn stream_events(
        &self,
        job_id: &str,
    ) -> Option<UnboundedReceiverStream<JobEvent>> {
        let job = self.jobs.read().await.get(job_id).cloned()?;
        let receiver = job.events_rx.lock().await.take()?;
        Some(UnboundedReceiverStream::new(receiver))
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        let job = self.jobs.read().await.get(job_id).cloned()?;
        let status = *job.status.read().await;
        Some(status)
    }

    pub async fn results(&self, job_id: &str) -> Option<Vec<ResultEntry>> {
        let job = self.jobs.read().await.get(job_id).cloned()?;
        let results = job.results.read().await.clone();
        Some(results)
    }

    /// Text rendering of a persisted item report. With no identifier, the
    /// first entry that produced a report is used.
    pub async fn get_report(&self, job_id: &str, identifier: Option<&str>) -> Option<String> {
        let results = self.results(job_id).await?;
        let entry = match identifier {
            Some(id) => results.iter().find(|entry| entry.identifier == id)?,
            None => results.iter().find(|entry| entry.path.is_some())?,
        };

        let path = entry.path.as_ref()?;
        let content = tokio::fs::read_to_string(path).await.ok()?;
        let report: ItemReport = serde_json::from_str(&content).ok()?;
        Some(report.render_text())
    }

    /// Request cancellation. Idempotent; returns false only for unknown ids.
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        let Some(job) = self.jobs.read().await.get(job_id).cloned() else {
            return false;
        };

        if job.status.read().await.is_terminal() {
            return true;
        }

        info!("🛑 Cancelling {job_id}");
        job.cancel.cancel();
        true
    }
}

/// Drives one job to completion under the admission gate.
async fn run_job(
    job: Arc<Job>,
    mut config: AppConfig,
    factory: Arc<dyn DriverFactory>,
    llm: Arc<dyn LlmClient>,
    permits: Arc<Semaphore>,
) {
    let Ok(_permit) = permits.acquire_owned().await else {
        return;
    };
    *job.status.write().await = JobStatus::Running;

    // Job options override the configured defaults.
    if let Some(max_reviews) = job.options.max_reviews {
        config.extraction.max_reviews = max_reviews;
    }
    if let Some(delay) = job.options.delay_between_items {
        config.batch.delay_between_items_secs = delay;
    }
    if let Some(headless) = job.options.headless {
        config.session.headless = headless;
    }

    let registry = Arc::new(SessionRegistry::new(factory));
    let navigator = NavigationPolicy::new(config.navigation.clone(), config.session.base_url.clone());
    let extractor = match ReviewPageExtractor::new() {
        Ok(extractor) => extractor,
        Err(e) => {
            error!("❌ {}: extractor setup failed: {e}", job.id);
            job.send(JobEvent::Progress {
                job_id: job.id.clone(),
                event: ProgressEvent::Error {
                    status: StepStatus::Error,
                    error: e.to_string(),
                },
            });
            job.send(JobEvent::stream_end(&job.id));
            *job.status.write().await = JobStatus::Error;
            return;
        }
    };
    let analysis = AnalysisAdapter::new(llm, config.analysis.clone());
    let sink: Arc<dyn ResultSink> = Arc::new(FileReportSink::new(config.output.directory.clone()));

    // Forward orchestrator progress into the job stream, tagged by job id.
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let forwarder_job = job.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            forwarder_job.send(JobEvent::Progress {
                job_id: forwarder_job.id.clone(),
                event,
            });
        }
    });

    let orchestrator = BatchOrchestrator::new(
        registry,
        navigator,
        extractor,
        analysis,
        sink,
        progress_tx,
        job.cancel.clone(),
        BatchOptions::from_config(&config),
    );

    let outcome = orchestrator.run(job.identifiers.clone()).await;
    // Drop the orchestrator (and with it the progress sender) so the
    // forwarder drains and exits before the end marker goes out.
    drop(orchestrator);
    let _ = forwarder.await;

    match outcome {
        Ok(outcome) => {
            *job.results.write().await = outcome.summary.results;
            *job.status.write().await = if outcome.cancelled {
                JobStatus::Cancelled
            } else {
                JobStatus::Done
            };
        }
        Err(e) => {
            error!("❌ {} failed: {e}", job.id);
            job.send(JobEvent::Progress {
                job_id: job.id.clone(),
                event: ProgressEvent::Error {
                    status: StepStatus::Error,
                    error: e.to_string(),
                },
            });
            *job.status.write().await = JobStatus::Error;
        }
    }

    job.send(JobEvent::stream_end(&job.id));
}

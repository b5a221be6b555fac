//! Progress events emitted by the batch orchestrator
//!
//! Each event serializes to `{"step": ..., "status": ..., ...}` so any
//! subscriber (UI, log sink, SSE bridge) can consume the stream without
//! knowing the enum. Consumers must treat unknown extra fields as opaque.

use serde::{Deserialize, Serialize};

/// Status of a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Done,
    Error,
}

/// One progress event, tagged by stage name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Session bring-up for the whole batch.
    StartAgent { status: StepStatus },

    /// The single login attempt at session open (and re-logins on block).
    Login {
        status: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ok: Option<bool>,
    },

    NavigateProduct {
        status: StepStatus,
        identifier: String,
    },

    ScrapeReviews {
        status: StepStatus,
        identifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reviews_extracted: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    LlmSentiment {
        status: StepStatus,
        identifier: String,
    },

    LlmThemes {
        status: StepStatus,
        identifier: String,
    },

    BuildReport {
        status: StepStatus,
        identifier: String,
    },

    ReportSaved {
        status: StepStatus,
        identifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Batch finished; carries the summary file location when the write
    /// succeeded.
    Done {
        status: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary_path: Option<String>,
    },

    /// A whole-job failure (the per-step errors ride on their own events).
    Error { status: StepStatus, error: String },

    /// The job was cancelled externally.
    Cancelled { status: StepStatus },
}

impl ProgressEvent {
    /// The wire name of the step, as it appears in the serialized form.
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::StartAgent { .. } => "start_agent",
            Self::Login { .. } => "login",
            Self::NavigateProduct { .. } => "navigate_product",
            Self::ScrapeReviews { .. } => "scrape_reviews",
            Self::LlmSentiment { .. } => "llm_sentiment",
            Self::LlmThemes { .. } => "llm_themes",
            Self::BuildReport { .. } => "build_report",
            Self::ReportSaved { .. } => "report_saved",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

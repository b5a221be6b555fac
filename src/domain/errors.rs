//! Pipeline error taxonomy
//!
//! Every member is recovered locally by the component that detects it and
//! folded into a recorded error string plus a continue/retry/skip decision.
//! None of these abort the batch state machine.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Product navigation failed for {identifier} (after {attempts} attempts)")]
    NavigationFailure { identifier: String, attempts: u32 },

    #[error("Blocked by site: {marker}")]
    BlockDetected { marker: String },

    #[error("Core product data missing")]
    ExtractionIncomplete,

    #[error("LLM timeout after {seconds}s")]
    AnalysisTimeout { seconds: u64 },

    #[error("JSON parsing failed")]
    AnalysisParseFailure,

    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

impl PipelineError {
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }
}

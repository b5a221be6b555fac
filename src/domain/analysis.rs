//! Analysis adapter outcomes
//!
//! The language model returns free-form text; the adapter normalizes it into
//! an [`AnalysisResult`] whose payload stays a JSON value (the model defines
//! the inner shape, the pipeline does not).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which analysis a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Sentiment,
    Themes,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sentiment => "sentiment",
            Self::Themes => "themes",
        }
    }
}

/// Normalized outcome of one analysis call.
///
/// Failure modes (no reviews, timeout, unparseable output) are folded into
/// `data` as placeholder objects, never surfaced as errors: malformed model
/// output must not abort the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub kind: AnalysisKind,
    pub data: Value,
    pub parsing_failed: bool,
    pub duration_secs: f64,
    pub errors: Vec<String>,
}

impl AnalysisResult {
    pub fn new(kind: AnalysisKind, data: Value, duration_secs: f64) -> Self {
        Self {
            kind,
            data,
            parsing_failed: false,
            duration_secs,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_parsing_failed(mut self) -> Self {
        self.parsing_failed = true;
        self
    }
}

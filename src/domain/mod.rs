//! Domain module - Core business logic and entities
//!
//! This module contains the data model of the batch pipeline (records,
//! reports, events, errors) and the traits behind which the external
//! collaborators live.

pub mod analysis;
pub mod errors;
pub mod events;
pub mod product;
pub mod report;
pub mod repositories;
pub mod services;

// Re-export commonly used items
pub use analysis::{AnalysisKind, AnalysisResult};
pub use errors::PipelineError;
pub use events::{ProgressEvent, StepStatus};
pub use product::{ProductRecord, Review, TITLE_PLACEHOLDER};
pub use report::{BatchSummary, ItemReport, ReportTimings, ResultEntry};
pub use repositories::ResultSink;
pub use services::{DriverFactory, LlmClient, PageDriver, PageSnapshot};

//! review-agent - Batch Review Scraping and LLM Analysis
//!
//! Drives many product identifiers through one authenticated automation
//! session: navigation with retry and block handling, best-effort extraction,
//! sequential sentiment/theme analysis, and durable per-item reports plus a
//! batch summary. Jobs are controlled through a transport-agnostic manager
//! that streams typed progress events.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export the surface most callers need
pub use application::{
    BatchOptions, BatchOrchestrator, BatchOutcome, JobEvent, JobManager, JobOptions, JobStatus,
    SessionRegistry,
};
pub use domain::{
    BatchSummary, ItemReport, PipelineError, ProductRecord, ProgressEvent, ResultEntry,
};
pub use infrastructure::{AppConfig, ConfigManager};

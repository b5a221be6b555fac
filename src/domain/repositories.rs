//! Persistence interfaces for batch results
//!
//! Trait definitions for the durable side of the pipeline; the file-backed
//! implementation lives in the infrastructure layer.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::report::{BatchSummary, ItemReport};

/// Durable writer for per-item reports and batch summaries.
///
/// Both operations are deliberately infallible at the signature level:
/// persistence failures are logged and reported as a missing path, never as
/// an error that could fail the item or the batch.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Write one per-item report; returns the storage path, or `None` when
    /// the write failed.
    async fn persist_item(&self, report: &ItemReport) -> Option<PathBuf>;

    /// Write the batch summary at job end; independent of item persistence.
    async fn persist_summary(&self, summary: &BatchSummary) -> Option<PathBuf>;
}

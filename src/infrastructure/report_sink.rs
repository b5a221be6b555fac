//! File-backed result sink
//!
//! Writes per-item reports and the batch summary as pretty-printed JSON
//! under the configured output directory. File names are deterministic from
//! the identifier plus a timestamp, matching `batch_report_{id}_{ts}.json`
//! and `batch_summary_{batch_id}.json`.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

use crate::domain::errors::PipelineError;
use crate::domain::report::{BatchSummary, ItemReport};
use crate::domain::repositories::ResultSink;

pub struct FileReportSink {
    output_dir: PathBuf,
}

impl FileReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> std::io::Result<()> {
        fs::create_dir_all(&self.output_dir).await?;
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content).await
    }
}

#[async_trait]
impl ResultSink for FileReportSink {
    async fn persist_item(&self, report: &ItemReport) -> Option<PathBuf> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.output_dir.join(format!(
            "batch_report_{}_{timestamp}.json",
            report.metadata.identifier
        ));

        match self.write_json(&path, report).await {
            Ok(()) => {
                info!("📁 Report saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                let err = PipelineError::PersistenceFailure(e.to_string());
                error!("❌ {err} (report for {})", report.metadata.identifier);
                None
            }
        }
    }

    async fn persist_summary(&self, summary: &BatchSummary) -> Option<PathBuf> {
        let path = self
            .output_dir
            .join(format!("batch_summary_{}.json", summary.batch_id));

        match self.write_json(&path, summary).await {
            Ok(()) => {
                info!("📦 Batch summary saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                let err = PipelineError::PersistenceFailure(e.to_string());
                error!("❌ {err} (batch summary)");
                None
            }
        }
    }
}

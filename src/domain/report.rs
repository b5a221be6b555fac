//! Persisted report schemas: per-item reports, summary entries, batch summary
//!
//! One `ResultEntry` exists per identifier by the time a job finishes, even
//! when extraction or navigation failed entirely. The per-item `ItemReport`
//! only exists for items whose extraction succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::domain::analysis::AnalysisResult;
use crate::domain::product::ProductRecord;

/// Per-item report, persisted as one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub metadata: ReportMetadata,
    pub performance_metrics: PerformanceMetrics,
    pub product_data: ProductData,
    pub llm_analysis: LlmAnalysis,
    pub error_summary: ErrorSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub auth_duration: f64,
    pub scrape_duration: f64,
    pub sentiment_duration: f64,
    pub theme_duration: f64,
    pub total_duration: f64,
    pub authenticated: bool,
    pub scraping_success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductData {
    pub title: String,
    pub rating_average: f64,
    pub total_reviews: u64,
    pub price: Option<String>,
    pub reviews_extracted: usize,
    pub authenticated_extraction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub sentiment: Value,
    pub themes: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub scraping_errors: Vec<String>,
    pub analysis_errors: Vec<String>,
    pub total_errors: usize,
}

/// Inputs for report assembly that are not part of the extraction record.
#[derive(Debug, Clone, Default)]
pub struct ReportTimings {
    pub auth_duration: f64,
    pub scrape_duration: f64,
}

impl ItemReport {
    /// Assemble the unified report from extraction and analysis results.
    pub fn assemble(
        record: &ProductRecord,
        scraping_success: bool,
        scraping_errors: &[String],
        sentiment: Option<&AnalysisResult>,
        themes: Option<&AnalysisResult>,
        timings: &ReportTimings,
        authenticated: bool,
    ) -> Self {
        let sentiment_duration = sentiment.map_or(0.0, |s| s.duration_secs);
        let theme_duration = themes.map_or(0.0, |t| t.duration_secs);
        let total_duration =
            timings.auth_duration + timings.scrape_duration + sentiment_duration + theme_duration;

        let analysis_errors: Vec<String> = sentiment
            .iter()
            .chain(themes.iter())
            .flat_map(|r| r.errors.iter().cloned())
            .collect();

        Self {
            metadata: ReportMetadata {
                identifier: record.identifier.clone(),
                timestamp: Utc::now(),
            },
            performance_metrics: PerformanceMetrics {
                auth_duration: timings.auth_duration,
                scrape_duration: timings.scrape_duration,
                sentiment_duration,
                theme_duration,
                total_duration,
                authenticated,
                scraping_success,
            },
            product_data: ProductData {
                title: record.title.clone(),
                rating_average: record.rating_average,
                total_reviews: record.total_reviews,
                price: record.price.clone(),
                reviews_extracted: record.reviews.len(),
                authenticated_extraction: record.authenticated,
            },
            llm_analysis: LlmAnalysis {
                sentiment: sentiment.map_or(Value::Null, |s| s.data.clone()),
                themes: themes.map_or(Value::Null, |t| t.data.clone()),
            },
            error_summary: ErrorSummary {
                total_errors: scraping_errors.len() + analysis_errors.len(),
                scraping_errors: scraping_errors.to_vec(),
                analysis_errors,
            },
        }
    }

    /// Plain-text rendering served by the job control surface.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("PRODUCT REPORT — {}\n", self.metadata.identifier));
        out.push_str(&format!("Generated: {}\n\n", self.metadata.timestamp.to_rfc3339()));

        out.push_str("PRODUCT\n");
        out.push_str(&format!("  Title: {}\n", self.product_data.title));
        out.push_str(&format!(
            "  Rating: {} ({} reviews)\n",
            self.product_data.rating_average, self.product_data.total_reviews
        ));
        if let Some(price) = &self.product_data.price {
            out.push_str(&format!("  Price: {price}\n"));
        }
        out.push_str(&format!(
            "  Reviews extracted: {} (authenticated: {})\n\n",
            self.product_data.reviews_extracted, self.product_data.authenticated_extraction
        ));

        out.push_str("ANALYSIS\n");
        out.push_str(&format!(
            "  Sentiment: {}\n",
            serde_json::to_string_pretty(&self.llm_analysis.sentiment).unwrap_or_default()
        ));
        out.push_str(&format!(
            "  Themes: {}\n\n",
            serde_json::to_string_pretty(&self.llm_analysis.themes).unwrap_or_default()
        ));

        out.push_str("PERFORMANCE\n");
        out.push_str(&format!(
            "  auth {:.2}s | scrape {:.2}s | sentiment {:.2}s | themes {:.2}s | total {:.2}s\n",
            self.performance_metrics.auth_duration,
            self.performance_metrics.scrape_duration,
            self.performance_metrics.sentiment_duration,
            self.performance_metrics.theme_duration,
            self.performance_metrics.total_duration,
        ));

        if self.error_summary.total_errors > 0 {
            out.push_str(&format!("\nERRORS ({})\n", self.error_summary.total_errors));
            for error in self
                .error_summary
                .scraping_errors
                .iter()
                .chain(self.error_summary.analysis_errors.iter())
            {
                out.push_str(&format!("  - {error}\n"));
            }
        }

        out
    }
}

/// One summary line per identifier, recorded regardless of success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntry {
    pub identifier: String,
    pub title: String,
    pub rating_average: f64,
    pub total_reviews: u64,
    pub reviews_extracted: usize,
    pub path: Option<PathBuf>,
    pub success: bool,
    pub errors: Vec<String>,
}

impl ResultEntry {
    pub fn from_record(
        record: &ProductRecord,
        path: Option<PathBuf>,
        success: bool,
        errors: Vec<String>,
    ) -> Self {
        Self {
            identifier: record.identifier.clone(),
            title: record.title.clone(),
            rating_average: record.rating_average,
            total_reviews: record.total_reviews,
            reviews_extracted: record.reviews.len(),
            path,
            success,
            errors,
        }
    }
}

/// Batch-level summary, persisted once at job end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub results: Vec<ResultEntry>,
}

impl BatchSummary {
    pub fn new(results: Vec<ResultEntry>) -> Self {
        let now = Utc::now();
        Self {
            batch_id: now.format("%Y%m%d_%H%M%S").to_string(),
            timestamp: now,
            count: results.len(),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{AnalysisKind, AnalysisResult};
    use serde_json::json;

    fn sample_record() -> ProductRecord {
        let mut record = ProductRecord::empty("B000TEST01");
        record.title = "Espresso Machine".to_string();
        record.rating_average = 4.5;
        record.total_reviews = 321;
        record
    }

    #[test]
    fn assemble_totals_durations_and_errors() {
        let record = sample_record();
        let sentiment = AnalysisResult::new(AnalysisKind::Sentiment, json!({"overall": "positive"}), 2.0)
            .with_errors(vec!["JSON parsing failed".to_string()]);
        let themes = AnalysisResult::new(AnalysisKind::Themes, json!({"strengths": []}), 3.0);
        let timings = ReportTimings {
            auth_duration: 1.0,
            scrape_duration: 4.0,
        };

        let report = ItemReport::assemble(
            &record,
            true,
            &["one scrape error".to_string()],
            Some(&sentiment),
            Some(&themes),
            &timings,
            true,
        );

        assert_eq!(report.performance_metrics.total_duration, 10.0);
        assert_eq!(report.error_summary.total_errors, 2);
        assert_eq!(report.product_data.title, "Espresso Machine");
        assert_eq!(report.llm_analysis.sentiment["overall"], "positive");
    }

    #[test]
    fn render_text_includes_identifier_and_errors() {
        let record = sample_record();
        let report = ItemReport::assemble(
            &record,
            true,
            &["navigation hiccup".to_string()],
            None,
            None,
            &ReportTimings::default(),
            false,
        );

        let text = report.render_text();
        assert!(text.contains("B000TEST01"));
        assert!(text.contains("navigation hiccup"));
    }

    #[test]
    fn summary_count_matches_results() {
        let entry = ResultEntry::from_record(&sample_record(), None, true, Vec::new());
        let summary = BatchSummary::new(vec![entry.clone(), entry]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.results.len(), summary.count);
    }
}

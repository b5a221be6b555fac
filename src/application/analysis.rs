//! Analysis adapter: sentiment and theme analysis over extracted reviews
//!
//! Both analysis kinds share one code path: bounded review selection, one
//! LLM call under a hard timeout, and lenient JSON extraction with a
//! raw-text fallback. Malformed model output never aborts the pipeline.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::analysis::{AnalysisKind, AnalysisResult};
use crate::domain::errors::PipelineError;
use crate::domain::product::ProductRecord;
use crate::domain::services::LlmClient;
use crate::infrastructure::config::AnalysisConfig;

pub struct AnalysisAdapter {
    llm: Arc<dyn LlmClient>,
    config: AnalysisConfig,
}

impl AnalysisAdapter {
    pub fn new(llm: Arc<dyn LlmClient>, config: AnalysisConfig) -> Self {
        Self { llm, config }
    }

    /// Sentiment analysis over the record's reviews.
    pub async fn analyze_sentiment(&self, record: &ProductRecord) -> AnalysisResult {
        let texts: Vec<String> = record
            .reviews
            .iter()
            .filter(|review| review.has_substantial_text(self.config.min_review_chars))
            .take(self.config.max_sentiment_reviews)
            .map(|review| format!("[{}★] {}", review.rating, truncate_chars(&review.text, 200)))
            .collect();

        if texts.is_empty() {
            warn!("⚠️  No reviews for sentiment analysis on {}", record.identifier);
            return AnalysisResult::new(
                AnalysisKind::Sentiment,
                json!({
                    "error": "No reviews available",
                    "overall_sentiment": "neutral",
                    "confidence": 0.0,
                }),
                0.0,
            )
            .with_errors(vec!["No reviews for sentiment analysis".to_string()]);
        }

        let prompt = sentiment_prompt(&texts.join("\n\n"));
        self.run(AnalysisKind::Sentiment, &prompt).await
    }

    /// Theme and insight extraction over the record's reviews.
    pub async fn analyze_themes(&self, record: &ProductRecord) -> AnalysisResult {
        let texts: Vec<String> = record
            .reviews
            .iter()
            .filter(|review| !review.text.trim().is_empty())
            .take(self.config.max_theme_reviews)
            .map(|review| truncate_chars(&review.text, 150))
            .collect();

        if texts.is_empty() {
            return AnalysisResult::new(
                AnalysisKind::Themes,
                json!({"error": "No reviews for theme analysis"}),
                0.0,
            )
            .with_errors(vec!["No reviews for theme analysis".to_string()]);
        }

        let prompt = theme_prompt(&texts.join("\n"), record);
        self.run(AnalysisKind::Themes, &prompt).await
    }

    /// One LLM call with the shared timeout and lenient-parse behavior.
    async fn run(&self, kind: AnalysisKind, prompt: &str) -> AnalysisResult {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        let response = match tokio::time::timeout(timeout, self.llm.complete(prompt)).await {
            Err(_) => {
                let duration = started.elapsed().as_secs_f64();
                let err = PipelineError::AnalysisTimeout {
                    seconds: self.config.timeout_seconds,
                };
                warn!("⏰ {err} for {} ({duration:.2}s)", kind.as_str());
                return AnalysisResult::new(
                    kind,
                    json!({"error": "timeout", "overall_sentiment": "neutral"}),
                    duration,
                )
                .with_errors(vec![err.to_string()]);
            }
            Ok(Err(e)) => {
                let duration = started.elapsed().as_secs_f64();
                warn!("❌ LLM error for {}: {e}", kind.as_str());
                return AnalysisResult::new(kind, json!({"error": e.to_string()}), duration)
                    .with_errors(vec![e.to_string()]);
            }
            Ok(Ok(text)) => text,
        };

        let duration = started.elapsed().as_secs_f64();
        match extract_json_object(&response).and_then(|json| serde_json::from_str::<Value>(json).ok())
        {
            Some(data) => {
                info!("✅ {} analysis completed in {duration:.2}s", kind.as_str());
                AnalysisResult::new(kind, data, duration)
            }
            None => {
                warn!("⚠️  {} analysis: falling back to raw response", kind.as_str());
                let mut fallback = json!({
                    "raw_response": response,
                    "parsing_failed": true,
                });
                if kind == AnalysisKind::Sentiment {
                    fallback["overall_sentiment"] = json!("neutral");
                    fallback["confidence"] = json!(0.5);
                }
                AnalysisResult::new(kind, fallback, duration)
                    .with_parsing_failed()
                    .with_errors(vec![PipelineError::AnalysisParseFailure.to_string()])
            }
        }
    }
}

fn sentiment_prompt(reviews: &str) -> String {
    format!(
        r#"Analyze the sentiment of these pre-extracted product reviews:

REVIEWS:
{reviews}

Answer ONLY with valid JSON:
{{
    "overall_sentiment": "positive|neutral|negative",
    "confidence": 0.0,
    "distribution": {{"positive": 0, "neutral": 0, "negative": 0}},
    "key_points": ["point1", "point2", "point3"],
    "rating_consistency": "high|medium|low"
}}
"#
    )
}

fn theme_prompt(reviews: &str, record: &ProductRecord) -> String {
    format!(
        r#"Extract themes and insights from these product reviews:

REVIEWS:
{reviews}

PRODUCT CONTEXT:
- Title: {}
- Rating: {}/5
- Total reviews: {}

Answer ONLY with JSON:
{{
    "strengths": ["strength1", "strength2"],
    "weaknesses": ["weakness1", "weakness2"],
    "emerging_themes": ["theme1", "theme2"],
    "recommendations": ["action1", "action2"],
    "keywords": ["keyword1", "keyword2"]
}}
"#,
        record.title, record.rating_average, record.total_reviews
    )
}

/// First balanced-brace JSON object substring of `text`, if any.
///
/// Brace counting is string-aware so braces inside JSON strings do not
/// unbalance the scan.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Char-safe prefix, so truncation never splits a multi-byte character.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

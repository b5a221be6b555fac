//! Language-model client for the analysis layer
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint. The client only
//! moves text: prompt construction, timeouts, and lenient JSON extraction
//! belong to the analysis adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::PipelineError;
use crate::domain::services::LlmClient;
use crate::infrastructure::config::LlmConfig;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a local or remote Ollama-compatible model server.
pub struct OllamaClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            // Generation can be slow; the analysis adapter enforces the
            // pipeline-level timeout on top of this transport bound.
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| PipelineError::driver(format!("Failed to create LLM client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        debug!("📡 LLM call: model={} prompt_chars={}", self.config.model, prompt.len());

        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::driver(format!("LLM request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::driver(format!(
                "LLM server returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::driver(format!("LLM response unreadable: {e}")))?;

        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_for_generate_endpoint() {
        let request = GenerateRequest {
            model: "llama3.1:8b",
            prompt: "hello",
            stream: false,
            options: GenerateOptions { temperature: 0.2 },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "llama3.1:8b");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["temperature"], 0.2);
    }
}

//! Batch runner: process a list of identifiers through one session and
//! print progress events as JSON lines.
//!
//! Identifiers come from the command line (comma-separated) or the
//! `REVIEW_AGENT_IDS` environment variable. Options follow the same pattern:
//! `REVIEW_AGENT_MAX_REVIEWS`, `REVIEW_AGENT_DELAY_SECS`, `HEADLESS`.

use std::sync::Arc;
use futures::StreamExt;
use tracing::{error, info};

use review_agent::application::{JobManager, JobOptions};
use review_agent::infrastructure::config::ConfigManager;
use review_agent::infrastructure::http_driver::HttpDriverFactory;
use review_agent::infrastructure::llm_client::OllamaClient;
use review_agent::infrastructure::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigManager::new()?.load_config().await?;
    logging::init_logging_with_config(&config.logging)?;

    let identifiers = parse_identifiers();
    if identifiers.is_empty() {
        error!("No identifiers given. Pass a comma-separated list or set REVIEW_AGENT_IDS.");
        std::process::exit(2);
    }

    let options = JobOptions {
        max_reviews: env_parse("REVIEW_AGENT_MAX_REVIEWS"),
        delay_between_items: env_parse("REVIEW_AGENT_DELAY_SECS"),
        headless: std::env::var("HEADLESS")
            .ok()
            .map(|v| v.eq_ignore_ascii_case("true")),
    };

    let factory = Arc::new(HttpDriverFactory::new(config.session.clone()));
    let llm = Arc::new(OllamaClient::new(config.analysis.llm.clone())?);
    let manager = JobManager::new(config, factory, llm);

    info!("🚀 Starting batch job: {}", identifiers.join(", "));
    let job_id = manager.create_job(identifiers, options).await?;

    let mut stream = manager
        .stream_events(&job_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("Job stream unavailable"))?;
    while let Some(event) = stream.next().await {
        if event.is_stream_end() {
            break;
        }
        println!("{}", serde_json::to_string(&event)?);
    }

    let status = manager.status(&job_id).await;
    info!("🏁 Job {job_id} finished: {status:?}");

    for entry in manager.results(&job_id).await.unwrap_or_default() {
        info!(
            "  {} success={} rating={} reviews={} path={:?}",
            entry.identifier, entry.success, entry.rating_average, entry.reviews_extracted, entry.path,
        );
    }

    Ok(())
}

fn parse_identifiers() -> Vec<String> {
    let raw = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REVIEW_AGENT_IDS").ok())
        .unwrap_or_default();

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

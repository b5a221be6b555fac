//! Infrastructure layer for configuration, logging, and external integrations
//!
//! Real implementations of the collaborator seams: the HTTP-backed page
//! driver, the HTML extraction adapter, the LLM client, and the file-backed
//! result sink.

pub mod config;
pub mod html_extractor;
pub mod http_driver;
pub mod llm_client;
pub mod logging;
pub mod report_sink;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager};
pub use html_extractor::{ReviewPageExtractor, ReviewSelectors, page_matches};
pub use http_driver::{Credentials, HttpDriverFactory, HttpPageDriver};
pub use llm_client::OllamaClient;
pub use report_sink::FileReportSink;

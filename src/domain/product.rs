//! Normalized product and review records extracted from a retail page
//!
//! Extraction is best-effort per field: a missing field stays at its
//! placeholder/default and never aborts extraction of the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when the product title could not be extracted.
pub const TITLE_PLACEHOLDER: &str = "N/A";

/// One customer review pulled from the product page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub title: Option<String>,
    pub rating: f64,
    pub text: String,
}

impl Review {
    /// Whether the review carries enough text to feed into analysis.
    pub fn has_substantial_text(&self, min_chars: usize) -> bool {
        self.text.trim().len() > min_chars
    }
}

/// Normalized extraction result for one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub identifier: String,
    pub title: String,
    pub rating_average: f64,
    pub total_reviews: u64,
    pub price: Option<String>,
    pub reviews: Vec<Review>,
    pub scraped_at: DateTime<Utc>,
    pub authenticated: bool,
}

impl ProductRecord {
    /// An empty record for an identifier whose extraction never ran or failed
    /// outright.
    pub fn empty(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: TITLE_PLACEHOLDER.to_string(),
            rating_average: 0.0,
            total_reviews: 0,
            price: None,
            reviews: Vec::new(),
            scraped_at: Utc::now(),
            authenticated: false,
        }
    }

    /// The success predicate that gates downstream analysis: a real title and
    /// a positive aggregate rating. Review extraction does not participate.
    pub fn has_core_data(&self) -> bool {
        self.title != TITLE_PLACEHOLDER && self.rating_average > 0.0
    }
}

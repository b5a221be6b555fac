//! HTML parsing and data extraction for retail product pages
//!
//! Converts a raw page snapshot into a [`ProductRecord`]. Every field lookup
//! is independently best-effort: selector groups are tried in order and a
//! miss leaves the field at its placeholder without touching the others.

use anyhow::{Result, anyhow};
use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::domain::product::{ProductRecord, Review};
use crate::domain::services::PageSnapshot;

/// CSS selector groups for product page data extraction.
///
/// Each entry is a comma-joined list tried as one selector; the first match
/// in document order wins.
#[derive(Debug, Clone)]
pub struct ReviewSelectors {
    pub title: String,
    pub rating: String,
    pub review_count: String,
    pub price: String,
    pub review_container: String,
    pub review_title: String,
    pub review_rating: String,
    pub review_text: String,
}

impl Default for ReviewSelectors {
    fn default() -> Self {
        Self {
            title: "#productTitle, [data-cy='title'] h1, h1.a-size-large, .product-title h1"
                .to_string(),
            rating: "[data-hook='average-star-rating'] .a-icon-alt, .a-icon-star .a-icon-alt, [data-cy='reviews-block'] .a-icon-alt"
                .to_string(),
            review_count: "#acrCustomerReviewText, [data-hook='total-review-count'], a[href*='#customerReviews'] span"
                .to_string(),
            price: ".a-price .a-offscreen, .a-price-whole, #priceblock_dealprice, #priceblock_ourprice"
                .to_string(),
            review_container: "[data-hook='review'], .review, [data-cy='review-item']".to_string(),
            review_title: "[data-hook='review-title'], .review-title".to_string(),
            review_rating: "[data-hook='review-star-rating'] .a-icon-alt, .review-rating .a-icon-alt, i.a-icon-star .a-icon-alt"
                .to_string(),
            review_text: "[data-hook='review-body'], .review-text, .cr-original-review-text"
                .to_string(),
        }
    }
}

/// Extractor for product pages with customer reviews.
pub struct ReviewPageExtractor {
    selectors: ReviewSelectors,
    rating_pattern: Regex,
    count_pattern: Regex,
}

impl ReviewPageExtractor {
    pub fn new() -> Result<Self> {
        Self::with_selectors(ReviewSelectors::default())
    }

    pub fn with_selectors(selectors: ReviewSelectors) -> Result<Self> {
        Ok(Self {
            selectors,
            rating_pattern: Regex::new(r"(\d+[,.]?\d*)")
                .map_err(|e| anyhow!("Invalid rating pattern: {e}"))?,
            count_pattern: Regex::new(r"([\d.,]+)")
                .map_err(|e| anyhow!("Invalid count pattern: {e}"))?,
        })
    }

    /// Extract a normalized record from the current page.
    ///
    /// Never fails: fields that cannot be found keep their placeholder and
    /// the caller decides success via [`ProductRecord::has_core_data`].
    pub fn extract(
        &self,
        snapshot: &PageSnapshot,
        identifier: &str,
        max_reviews: usize,
        authenticated: bool,
    ) -> ProductRecord {
        let html = Html::parse_document(&snapshot.content);
        let mut record = ProductRecord::empty(identifier);
        record.scraped_at = Utc::now();
        record.authenticated = authenticated;

        if let Some(title) = first_text(&html, &self.selectors.title) {
            record.title = title;
        }

        if let Some(rating_text) = first_text(&html, &self.selectors.rating) {
            if let Some(rating) = self.parse_rating(&rating_text) {
                record.rating_average = rating;
            }
        }

        if let Some(count_text) = first_text(&html, &self.selectors.review_count) {
            if let Some(count) = self.parse_count(&count_text) {
                record.total_reviews = count;
            }
        }

        record.price = first_text(&html, &self.selectors.price);
        record.reviews = self.extract_reviews(&html, max_reviews);

        debug!(
            "Extracted {}: core={} reviews={} rating={}",
            identifier,
            record.has_core_data(),
            record.reviews.len(),
            record.rating_average,
        );
        record
    }

    /// Pull up to `max_reviews` reviews out of the page, best-effort.
    fn extract_reviews(&self, html: &Html, max_reviews: usize) -> Vec<Review> {
        let Ok(container) = Selector::parse(&self.selectors.review_container) else {
            return Vec::new();
        };

        html.select(&container)
            .take(max_reviews)
            .map(|element| {
                let fragment = Html::parse_fragment(&element.html());
                Review {
                    title: first_text(&fragment, &self.selectors.review_title),
                    rating: first_text(&fragment, &self.selectors.review_rating)
                        .and_then(|text| self.parse_rating(&text))
                        .unwrap_or(0.0),
                    text: first_text(&fragment, &self.selectors.review_text).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Parse an aggregate rating out of text like `4,3 su 5 stelle`.
    fn parse_rating(&self, text: &str) -> Option<f64> {
        let capture = self.rating_pattern.captures(text)?;
        capture.get(1)?.as_str().replace(',', ".").parse().ok()
    }

    /// Parse a review count out of text like `1.234 valutazioni`.
    fn parse_count(&self, text: &str) -> Option<u64> {
        let capture = self.count_pattern.captures(text)?;
        capture
            .get(1)?
            .as_str()
            .replace(['.', ','], "")
            .parse()
            .ok()
    }
}

/// First non-empty text match for a comma-joined selector group.
fn first_text(html: &Html, selector_group: &str) -> Option<String> {
    let selector = Selector::parse(selector_group).ok()?;
    html.select(&selector)
        .map(|element| {
            element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string()
        })
        .find(|text| !text.is_empty())
}

/// Whether any of the given selectors matches the page content.
pub fn page_matches(content: &str, selector_group: &str) -> bool {
    let Ok(selector) = Selector::parse(selector_group) else {
        return false;
    };
    Html::parse_document(content).select(&selector).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r##"
        <html><body>
          <div id="dp-container">
            <h1><span id="productTitle"> Macchina Espresso Deluxe </span></h1>
            <span data-hook="average-star-rating"><span class="a-icon-alt">4,3 su 5 stelle</span></span>
            <span id="acrCustomerReviewText">1.234 valutazioni</span>
            <span class="a-price"><span class="a-offscreen">89,90 €</span></span>
            <div data-hook="review">
              <a data-hook="review-title">Ottima</a>
              <i data-hook="review-star-rating"><span class="a-icon-alt">5,0 su 5 stelle</span></i>
              <span data-hook="review-body">Caffè perfetto ogni mattina, la consiglio davvero.</span>
            </div>
            <div data-hook="review">
              <a data-hook="review-title">Deludente</a>
              <i data-hook="review-star-rating"><span class="a-icon-alt">2,0 su 5 stelle</span></i>
              <span data-hook="review-body">Dopo due settimane perde acqua dal serbatoio.</span>
            </div>
          </div>
        </body></html>
    "##;

    fn snapshot(content: &str) -> PageSnapshot {
        PageSnapshot {
            url: "https://www.example.test/dp/B000TEST01".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn extracts_core_fields_and_reviews() {
        let extractor = ReviewPageExtractor::new().unwrap();
        let record = extractor.extract(&snapshot(PRODUCT_PAGE), "B000TEST01", 15, true);

        assert_eq!(record.title, "Macchina Espresso Deluxe");
        assert_eq!(record.rating_average, 4.3);
        assert_eq!(record.total_reviews, 1234);
        assert_eq!(record.price.as_deref(), Some("89,90 €"));
        assert_eq!(record.reviews.len(), 2);
        assert_eq!(record.reviews[0].rating, 5.0);
        assert!(record.has_core_data());
        assert!(record.authenticated);
    }

    #[test]
    fn max_reviews_bounds_extraction() {
        let extractor = ReviewPageExtractor::new().unwrap();
        let record = extractor.extract(&snapshot(PRODUCT_PAGE), "B000TEST01", 1, false);
        assert_eq!(record.reviews.len(), 1);
    }

    #[test]
    fn missing_fields_leave_placeholders() {
        let extractor = ReviewPageExtractor::new().unwrap();
        let record = extractor.extract(&snapshot("<html><body></body></html>"), "B000TEST01", 15, false);

        assert_eq!(record.title, crate::domain::product::TITLE_PLACEHOLDER);
        assert_eq!(record.rating_average, 0.0);
        assert!(record.reviews.is_empty());
        assert!(!record.has_core_data());
    }

    #[test]
    fn partial_page_keeps_what_it_finds() {
        let extractor = ReviewPageExtractor::new().unwrap();
        let page = r#"<html><body><span id="productTitle">Solo titolo</span></body></html>"#;
        let record = extractor.extract(&snapshot(page), "B000TEST01", 15, false);

        assert_eq!(record.title, "Solo titolo");
        assert_eq!(record.rating_average, 0.0);
        assert!(!record.has_core_data(), "rating is still missing");
    }

    #[test]
    fn rating_parses_dot_and_comma_decimals() {
        let extractor = ReviewPageExtractor::new().unwrap();
        assert_eq!(extractor.parse_rating("4,3 su 5 stelle"), Some(4.3));
        assert_eq!(extractor.parse_rating("4.7 out of 5 stars"), Some(4.7));
        assert_eq!(extractor.parse_rating("no digits"), None);
    }

    #[test]
    fn count_strips_thousands_separators() {
        let extractor = ReviewPageExtractor::new().unwrap();
        assert_eq!(extractor.parse_count("1.234 valutazioni"), Some(1234));
        assert_eq!(extractor.parse_count("56 ratings"), Some(56));
    }

    #[test]
    fn page_matches_finds_loaded_marker() {
        assert!(page_matches(PRODUCT_PAGE, "#productTitle, #dp-container"));
        assert!(!page_matches("<html></html>", "#productTitle"));
    }
}

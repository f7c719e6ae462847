//! Integration tests for the mirroring pipeline
//!
//! These tests use wiremock to stand in for the mirrored site and drive the
//! crawler, the sitemap reader and whole jobs end-to-end.

mod crawl_tests;
mod job_tests;
mod sitemap_tests;

use kagami::config::{FetchConfig, Heuristics, HeuristicsConfig};
use kagami::transport::HttpTransport;
use kagami::Canonicalizer;
use std::sync::Arc;

/// Transport that gives up on the first failure
pub fn test_transport() -> Arc<HttpTransport> {
    let config = FetchConfig {
        timeout_secs: 5,
        max_retries: 0,
        ..FetchConfig::default()
    };
    Arc::new(HttpTransport::new(&config).expect("Failed to build transport"))
}

pub fn test_canonicalizer() -> Canonicalizer {
    Canonicalizer::new(
        Heuristics::compile(&HeuristicsConfig::default()).expect("Default heuristics compile"),
    )
}

/// Wraps a body in a minimal HTML page
pub fn html_page(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
}

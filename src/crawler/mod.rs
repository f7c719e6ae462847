//! Crawler module for page discovery and retrieval
//!
//! This module contains the core crawling logic, including:
//! - The crawl engine driving the frontier
//! - HTML parsing and link extraction
//! - The plain HTTP and headless-render fetch backends
//! - The content materialization protocol run before headless capture

mod backend;
mod chromium;
mod engine;
mod headless;
mod materialize;
mod parser;
mod render;

pub use backend::{FetchBackend, FetchError, FetchedDocument, HttpBackend};
pub use chromium::ChromiumHost;
pub use engine::{CrawlEngine, CrawlOutput, CrawlReport, StepStatus};
pub use headless::HeadlessBackend;
pub use materialize::{
    MaterializationProtocol, MaterializationReport, MaterializeStep, StepContext, StepOutcome,
    StepReport,
};
pub use parser::{extract_title, is_page_candidate, parse_html, title_from_url, ParsedPage};
pub use render::{RenderHost, RenderSession, RenderedPage};

use crate::url::CanonicalUrl;

/// A fetched page
///
/// Produced by the crawl engine; the rewriting stage later replaces `html`
/// with the rewritten document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: CanonicalUrl,
    pub html: String,
    pub title: String,
}

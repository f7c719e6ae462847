//! Crawl engine - frontier-driven page discovery
//!
//! Pages are fetched strictly one at a time. After each fetch the page's
//! links are extracted and enqueued before the next URL is popped, so the
//! visited/frontier bookkeeping never races.

use super::backend::{FetchBackend, FetchError, FetchedDocument};
use super::parser::{parse_html, title_from_url};
use super::Page;
use crate::config::BackendKind;
use crate::output::JobLog;
use crate::state::{CrawlState, PageState};
use crate::url::{CanonicalUrl, Canonicalizer, Origin};
use crate::KagamiError;
use std::time::Instant;

/// What a single [`CrawlEngine::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// A page was fetched and its links enqueued
    Fetched,
    /// The URL had already been visited
    Skipped,
    /// The page answered 404
    NotFound,
    /// The fetch failed; the page was dropped
    Failed,
    /// The frontier was empty
    Idle,
}

/// Counters collected by one crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub pages_fetched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub capped: usize,
    pub sitemap_urls: usize,
    /// Backend-level failures of the preferred backend
    pub backend_errors: u32,
    pub downgraded: bool,
    pub last_error: Option<String>,
}

/// Result of a finished crawl
#[derive(Debug)]
pub struct CrawlOutput {
    /// Fetched pages in fetch order
    pub pages: Vec<Page>,
    pub state: CrawlState,
    pub report: CrawlReport,
}

/// Drives a [`CrawlState`] to completion with one active backend
///
/// The engine prefers its primary backend. When a fallback is configured,
/// backend-level failures of the primary are counted across the whole crawl;
/// once `max_attempts` is reached the fallback replaces the primary for every
/// remaining page. That switch happens at most once.
pub struct CrawlEngine<'a> {
    state: CrawlState,
    canonicalizer: &'a Canonicalizer,
    backend: Box<dyn FetchBackend>,
    fallback: Option<Box<dyn FetchBackend>>,
    max_pages: usize,
    max_attempts: u32,
    start_url: Option<String>,
    pages: Vec<Page>,
    report: CrawlReport,
    log: JobLog,
}

impl<'a> CrawlEngine<'a> {
    pub fn new(
        origin: Origin,
        canonicalizer: &'a Canonicalizer,
        backend: Box<dyn FetchBackend>,
        log: JobLog,
    ) -> Self {
        Self {
            state: CrawlState::new(origin),
            canonicalizer,
            backend,
            fallback: None,
            max_pages: 200,
            max_attempts: 2,
            start_url: None,
            pages: Vec::new(),
            report: CrawlReport::default(),
            log,
        }
    }

    /// Backend taking over after the primary failed `max_attempts` times
    pub fn with_fallback(mut self, fallback: Box<dyn FetchBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Puts the start URL at the head of the frontier, followed by every
    /// sitemap URL not already known
    pub fn seed(&mut self, start: &CanonicalUrl, sitemap_urls: Vec<CanonicalUrl>) {
        self.start_url = Some(start.to_string());
        self.state.enqueue(start.clone());

        let mut added = 0;
        for url in sitemap_urls {
            if self.state.origin().contains(url.as_url()) && self.state.enqueue(url) {
                added += 1;
            }
        }
        self.report.sitemap_urls = added;

        if added > 0 {
            self.log.info(format!("Seeded {added} URLs from sitemaps"));
        }
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn report(&self) -> &CrawlReport {
        &self.report
    }

    /// Backend currently fetching pages
    pub fn active_backend(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Processes the head of the frontier
    pub async fn step(&mut self) -> StepStatus {
        let Some(url) = self.state.pop() else {
            return StepStatus::Idle;
        };

        if !self.state.mark_visited(&url) {
            tracing::trace!("Already visited: {}", url);
            return StepStatus::Skipped;
        }

        tracing::debug!("Fetching {} via {:?}", url, self.backend.kind());

        match self.fetch(&url).await {
            Ok(document) => self.accept(url, document),
            Err(FetchError::NotFound) => {
                tracing::debug!("Skipping {} (404)", url);
                self.state.set_state(&url, PageState::NotFound);
                self.report.not_found += 1;
                StepStatus::NotFound
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                self.log.warn(format!("Skipping {url}: {e}"));
                self.state.set_state(&url, PageState::Failed);
                self.report.failed += 1;
                self.report.last_error = Some(e.to_string());
                StepStatus::Failed
            }
        }
    }

    /// Runs until the frontier is empty or the page cap is reached
    ///
    /// # Errors
    ///
    /// [`KagamiError::NoPagesFetched`] when not a single page could be fetched
    pub async fn run(mut self) -> Result<CrawlOutput, KagamiError> {
        let started = Instant::now();
        tracing::info!(
            "Crawling {} (cap {} pages)",
            self.state.origin(),
            self.max_pages
        );

        while self.pages.len() < self.max_pages {
            match self.step().await {
                StepStatus::Idle => break,
                StepStatus::Fetched if self.pages.len() % 10 == 0 => {
                    tracing::info!(
                        "Progress: {} pages fetched, {} in frontier",
                        self.pages.len(),
                        self.state.frontier_len()
                    );
                }
                _ => {}
            }
        }
        self.report.pages_fetched = self.pages.len();

        self.report.capped = self.state.drain_capped();
        if self.report.capped > 0 {
            tracing::info!(
                "Page cap of {} reached; {} queued URLs left unfetched",
                self.max_pages,
                self.report.capped
            );
            self.log.info(format!(
                "Page cap reached with {} URLs still queued",
                self.report.capped
            ));
        }

        self.backend.shutdown().await;
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.shutdown().await;
        }

        tracing::info!(
            "Crawl completed: {} pages in {:?}",
            self.pages.len(),
            started.elapsed()
        );

        if self.pages.is_empty() {
            let last_error = self
                .report
                .last_error
                .clone()
                .unwrap_or_else(|| "no page returned content".to_string());
            self.log.error(format!("No pages fetched: {last_error}"));
            return Err(KagamiError::NoPagesFetched {
                start_url: self
                    .start_url
                    .clone()
                    .unwrap_or_else(|| self.state.origin().to_string()),
                last_error,
            });
        }

        Ok(CrawlOutput {
            pages: self.pages,
            state: self.state,
            report: self.report,
        })
    }

    /// Fetches with the active backend, downgrading once when the primary
    /// keeps failing
    async fn fetch(&mut self, url: &CanonicalUrl) -> Result<FetchedDocument, FetchError> {
        loop {
            match self.backend.fetch(url).await {
                Err(FetchError::Backend(message)) if self.fallback.is_some() => {
                    self.report.backend_errors += 1;
                    tracing::warn!(
                        "{:?} backend failed on {} (attempt {}/{}): {}",
                        self.backend.kind(),
                        url,
                        self.report.backend_errors,
                        self.max_attempts,
                        message
                    );
                    self.log.warn(format!("Backend failure on {url}: {message}"));
                    self.backend.shutdown().await;

                    if self.report.backend_errors >= self.max_attempts {
                        self.downgrade().await;
                    }
                }
                other => return other,
            }
        }
    }

    async fn downgrade(&mut self) {
        let Some(fallback) = self.fallback.take() else {
            return;
        };

        let mut previous = std::mem::replace(&mut self.backend, fallback);
        previous.shutdown().await;
        self.report.downgraded = true;

        tracing::info!(
            "Switching from {:?} to {:?} backend for the rest of the job",
            previous.kind(),
            self.backend.kind()
        );
        self.log.info(format!(
            "Downgraded to {:?} backend after {} failures",
            self.backend.kind(),
            self.report.backend_errors
        ));
    }

    fn accept(&mut self, url: CanonicalUrl, document: FetchedDocument) -> StepStatus {
        // Redirects inside the origin count as visiting the target too
        let final_url = CanonicalUrl::parse(&document.final_url)
            .ok()
            .filter(|u| self.state.origin().contains(u.as_url()))
            .unwrap_or_else(|| url.clone());

        if final_url.identity() != url.identity() && !self.state.mark_visited(&final_url) {
            tracing::debug!("{} redirected to already visited {}", url, final_url);
            self.state.set_state(&url, PageState::Fetched);
            return StepStatus::Skipped;
        }
        self.state.set_state(&final_url, PageState::Fetched);
        self.state.set_state(&url, PageState::Fetched);

        let parsed = parse_html(
            &document.html,
            final_url.as_url(),
            self.canonicalizer,
            self.state.origin(),
        );

        let mut discovered = 0;
        for link in parsed.links {
            if self.state.enqueue(link) {
                discovered += 1;
            }
        }
        tracing::debug!("{}: {} new links", url, discovered);

        let title = parsed
            .title
            .or_else(|| document.title.filter(|t| !t.trim().is_empty()))
            .unwrap_or_else(|| title_from_url(url.as_url()));

        self.pages.push(Page {
            url,
            html: document.html,
            title,
        });
        StepStatus::Fetched
    }
}

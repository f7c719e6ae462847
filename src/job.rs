//! Job pipeline - one mirror job from start URL to packaged output
//!
//! A job owns its crawl state, asset map and page map; nothing is shared
//! between jobs. Stages run strictly in order:
//!
//! 1. Sitemap discovery and crawl (the only stage that can fail the job)
//! 2. Stylesheets, images, fonts and scripts, each behind its toggle
//! 3. Rewriting of every page and the consolidated stylesheet
//! 4. Titles and slugs, then packaging and the optional markdown report
//!
//! A milestone update goes to the progress sink after each stage.

use crate::assets::{AssetKind, AssetPlan, AssetResolver, CONSOLIDATED_STYLESHEET};
use crate::config::{validate, BackendKind, Heuristics, MirrorConfig};
use crate::crawler::{
    extract_title, title_from_url, ChromiumHost, CrawlEngine, CrawlOutput, FetchBackend,
    HeadlessBackend, HttpBackend, MaterializationProtocol, Page, RenderHost,
};
use crate::output::{
    generate_markdown_summary, DirectoryPackager, JobLog, JobStats, JobSummary, Milestone,
    MirrorOutput, MirrorPage, Packager, PageSummary, ProgressSink, ProgressUpdate,
    TracingProgress,
};
use crate::rewrite::{consolidate, page_slug, rewrite_pages, DocumentRewriter, UrlToLocalPath};
use crate::sitemap;
use crate::transport::{HttpTransport, Transport};
use crate::url::{CanonicalUrl, Canonicalizer, Origin};
use crate::{KagamiError, UrlError};
use chrono::Utc;
use scraper::Html;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opaque job identifier, unique for the lifetime of the process
pub fn next_job_id() -> String {
    let n = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let digest = Sha256::digest(format!("{}:{}:{}", std::process::id(), nanos, n));
    format!("job-{}", &hex::encode(digest)[..10])
}

/// Result of a successful job
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: String,
    /// What was (or would be) handed to the packager
    pub output: MirrorOutput,
    pub stats: JobStats,
    pub summary: JobSummary,
    /// Files written by the packager; 0 when packaging was disabled
    pub files_written: usize,
}

/// One mirror job
pub struct Job {
    id: String,
    config: MirrorConfig,
    config_hash: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    render_host: Option<Arc<dyn RenderHost>>,
    progress: Arc<dyn ProgressSink>,
    packager: Option<Box<dyn Packager + Send + Sync>>,
    log: JobLog,
    stats: JobStats,
    started: Instant,
}

impl Job {
    /// Creates a job writing into `config.output.directory`
    pub fn new(config: MirrorConfig) -> Self {
        let packager = DirectoryPackager::new(&config.output.directory);
        Self {
            id: next_job_id(),
            config,
            config_hash: None,
            transport: None,
            render_host: None,
            progress: Arc::new(TracingProgress),
            packager: Some(Box::new(packager)),
            log: JobLog::new(),
            stats: JobStats::new(),
            started: Instant::now(),
        }
    }

    /// Uses `transport` for every network call instead of an [`HttpTransport`]
    /// built from the configuration
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Renders pages with `host` instead of launching Chromium
    pub fn with_render_host(mut self, host: Arc<dyn RenderHost>) -> Self {
        self.render_host = Some(host);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_packager(mut self, packager: Box<dyn Packager + Send + Sync>) -> Self {
        self.packager = Some(packager);
        self
    }

    /// Skips packaging; the outcome still carries the full [`MirrorOutput`]
    pub fn without_packaging(mut self) -> Self {
        self.packager = None;
        self
    }

    /// Records the hash of the configuration file in the report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle to the job log; stays readable after the job fails
    pub fn log(&self) -> JobLog {
        self.log.clone()
    }

    /// Runs every stage
    ///
    /// # Errors
    ///
    /// - Invalid configuration or start URL
    /// - [`KagamiError::NoPagesFetched`] when the crawl yields nothing
    /// - Packaging failures
    pub async fn run(mut self) -> Result<JobOutcome, KagamiError> {
        self.started = Instant::now();
        let started_at = Utc::now().to_rfc3339();

        validate(&self.config)?;
        let canonicalizer = Canonicalizer::new(Heuristics::compile(&self.config.heuristics)?);
        let start = CanonicalUrl::parse(&self.config.job.start_url)?;
        let origin = Origin::of(start.as_url()).ok_or(UrlError::MissingHost)?;
        let transport: Arc<dyn Transport> = match self.transport.clone() {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config.fetch)?),
        };

        tracing::info!("[{}] Mirroring {}", self.id, start);
        self.log.info(format!("Job {} started for {}", self.id, start));
        self.emit(Milestone::CrawlStarted);

        let crawl = match self
            .crawl(&start, origin.clone(), &canonicalizer, transport.clone())
            .await
        {
            Ok(crawl) => crawl,
            Err(e) => {
                tracing::error!("[{}] Job failed: {}", self.id, e);
                self.log.error(format!("Job failed: {e}"));
                let summary = self.summary(&started_at, &[], Some(e.to_string()));
                self.write_report(&summary);
                return Err(e);
            }
        };
        let mut pages = crawl.pages;
        self.emit(Milestone::HtmlExtracted);

        // Assets
        let toggles = self.config.assets.clone();
        let mut plan = AssetPlan::from_pages(&pages, &canonicalizer);
        let mut resolver = AssetResolver::new(transport.as_ref(), &canonicalizer, self.log.clone());

        if toggles.css {
            self.stats.stylesheets = resolver.fetch_stylesheets(&mut plan).await;
        }
        self.emit(Milestone::CssDone);

        for (kind, enabled, milestone) in [
            (AssetKind::Image, toggles.images, Milestone::ImagesDone),
            (AssetKind::Font, toggles.fonts, Milestone::FontsDone),
            (AssetKind::Script, toggles.scripts, Milestone::ScriptsDone),
        ] {
            if enabled {
                *self.stats.assets_mut(kind) = resolver.download(kind, &plan).await;
            }
            self.emit(milestone);
        }

        let (assets, stored_assets, stylesheets) = resolver.into_parts();

        // Rewriting
        let stylesheet = (toggles.css && !stylesheets.is_empty())
            .then(|| consolidate(&stylesheets, &assets, &canonicalizer));
        let url_to_local = UrlToLocalPath::build(&pages);
        let mut rewriter = DocumentRewriter::new(&assets, &url_to_local, &canonicalizer, &origin);
        if stylesheet.is_some() {
            rewriter = rewriter.with_stylesheet(CONSOLIDATED_STYLESHEET);
        }
        let rewritten = rewrite_pages(&mut pages, &rewriter, &self.log);
        tracing::info!("[{}] Rewrote {}/{} pages", self.id, rewritten, pages.len());
        self.emit(Milestone::RewritingDone);

        // Content
        let mirror_pages: Vec<MirrorPage> = pages
            .into_iter()
            .map(|page| mirror_page(page, &url_to_local, toggles.content))
            .collect();
        self.emit(Milestone::ContentExtracted);

        let output = MirrorOutput {
            pages: mirror_pages,
            assets,
            url_to_local,
            stored_assets,
            stylesheet,
        };

        let files_written = match &self.packager {
            Some(packager) => packager.package(&output)?,
            None => 0,
        };
        self.stats.elapsed = self.started.elapsed();
        self.log.info(format!(
            "Job finished: {} pages, {} assets in {:.1}s",
            output.pages.len(),
            self.stats.assets_downloaded(),
            self.stats.elapsed.as_secs_f64()
        ));
        self.emit(Milestone::PackagingDone);

        let summary = self.summary(&started_at, &output.pages, None);
        self.write_report(&summary);

        Ok(JobOutcome {
            job_id: self.id.clone(),
            output,
            stats: self.stats.clone(),
            summary,
            files_written,
        })
    }

    async fn crawl(
        &mut self,
        start: &CanonicalUrl,
        origin: Origin,
        canonicalizer: &Canonicalizer,
        transport: Arc<dyn Transport>,
    ) -> Result<CrawlOutput, KagamiError> {
        let sitemap_urls = if self.config.job.use_sitemap {
            sitemap::discover(transport.as_ref(), canonicalizer, start).await
        } else {
            Vec::new()
        };

        let http: Box<dyn FetchBackend> = Box::new(HttpBackend::new(transport));
        let backend_kind = self.config.fetch.backend;
        self.stats.initial_backend = Some(backend_kind);

        let engine = match backend_kind {
            BackendKind::Http => CrawlEngine::new(origin, canonicalizer, http, self.log.clone()),
            BackendKind::Headless => {
                let headless = &self.config.headless;
                let host = self
                    .render_host
                    .clone()
                    .unwrap_or_else(|| Arc::new(ChromiumHost::new(headless)) as Arc<dyn RenderHost>);
                let backend = HeadlessBackend::new(
                    host,
                    MaterializationProtocol::standard(headless),
                    Duration::from_secs(headless.navigation_timeout_secs),
                );
                CrawlEngine::new(origin, canonicalizer, Box::new(backend), self.log.clone())
                    .with_fallback(http)
                    .with_max_attempts(headless.max_attempts)
            }
        };

        let mut engine = engine.with_max_pages(self.config.job.max_pages);
        engine.seed(start, sitemap_urls);

        let crawl = engine.run().await?;
        let report = &crawl.report;
        self.stats.pages_fetched = report.pages_fetched;
        self.stats.pages_not_found = report.not_found;
        self.stats.pages_failed = report.failed;
        self.stats.pages_capped = report.capped;
        self.stats.sitemap_urls = report.sitemap_urls;
        self.stats.downgraded = report.downgraded;
        Ok(crawl)
    }

    fn emit(&mut self, step: Milestone) {
        self.stats.elapsed = self.started.elapsed();
        self.progress.update(ProgressUpdate {
            job_id: self.id.clone(),
            step,
            percent: step.percent(),
            log: self.log.snapshot(),
            stats: self.stats.clone(),
        });
    }

    fn summary(&self, started_at: &str, pages: &[MirrorPage], error: Option<String>) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            start_url: self.config.job.start_url.clone(),
            started_at: started_at.to_string(),
            finished_at: Some(Utc::now().to_rfc3339()),
            status: if error.is_some() { "failed" } else { "completed" }.to_string(),
            config_hash: self.config_hash.clone(),
            stats: self.stats.clone(),
            pages: pages
                .iter()
                .map(|page| PageSummary {
                    url: page.url.to_string(),
                    file: page.file.clone(),
                    title: page.title.clone(),
                })
                .collect(),
            log: self.log.snapshot(),
            error,
        }
    }

    /// Writes the markdown report when one is configured; a failure here
    /// never fails the job
    fn write_report(&self, summary: &JobSummary) {
        let Some(path) = &self.config.output.summary_path else {
            return;
        };
        match generate_markdown_summary(summary, Path::new(path)) {
            Ok(()) => tracing::info!("Report written to {}", path),
            Err(e) => tracing::warn!("Could not write report to {}: {}", path, e),
        }
    }
}

/// Runs a job with the default transport, render host and directory packager
pub async fn run_job(
    config: MirrorConfig,
    progress: Arc<dyn ProgressSink>,
) -> Result<JobOutcome, KagamiError> {
    Job::new(config).with_progress(progress).run().await
}

/// Title, slug and file name of a rewritten page
///
/// With content extraction enabled the title is read again from the
/// rewritten document and the slug comes from the URL path; otherwise the
/// crawl-time title is kept and the slug is the file stem.
fn mirror_page(page: Page, url_to_local: &UrlToLocalPath, content: bool) -> MirrorPage {
    let file = url_to_local
        .file_for(&page.url)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.html", page_slug(page.url.as_url())));

    let (title, slug) = if content {
        let title = extract_title(&Html::parse_document(&page.html))
            .unwrap_or_else(|| title_from_url(page.url.as_url()));
        (title, page_slug(page.url.as_url()))
    } else {
        let slug = file.trim_end_matches(".html").to_string();
        (page.title, slug)
    };

    MirrorPage {
        url: page.url,
        html: page.html,
        title,
        slug,
        file,
    }
}

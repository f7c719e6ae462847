//! Job statistics
//!
//! Counters accumulated while a job runs. A snapshot travels with every
//! progress update and ends up in the markdown report.

use crate::assets::AssetKind;
use crate::config::BackendKind;
use std::time::Duration;

/// Downloads of one asset kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetCounts {
    pub downloaded: usize,
    pub failed: usize,
}

impl AssetCounts {
    pub fn total(&self) -> usize {
        self.downloaded + self.failed
    }
}

/// Statistics for one mirror job
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    /// Pages fetched successfully
    pub pages_fetched: usize,

    /// Pages that answered 404
    pub pages_not_found: usize,

    /// Pages skipped because of an error status or transport failure
    pub pages_failed: usize,

    /// Pages still queued when the page cap was reached
    pub pages_capped: usize,

    /// URLs contributed by sitemap discovery
    pub sitemap_urls: usize,

    pub stylesheets: AssetCounts,
    pub images: AssetCounts,
    pub fonts: AssetCounts,
    pub scripts: AssetCounts,

    /// Backend the job started with
    pub initial_backend: Option<BackendKind>,

    /// Whether the headless backend was abandoned for plain HTTP
    pub downgraded: bool,

    pub elapsed: Duration,
}

impl JobStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self, kind: AssetKind) -> &AssetCounts {
        match kind {
            AssetKind::Stylesheet => &self.stylesheets,
            AssetKind::Image => &self.images,
            AssetKind::Font => &self.fonts,
            AssetKind::Script => &self.scripts,
        }
    }

    pub fn assets_mut(&mut self, kind: AssetKind) -> &mut AssetCounts {
        match kind {
            AssetKind::Stylesheet => &mut self.stylesheets,
            AssetKind::Image => &mut self.images,
            AssetKind::Font => &mut self.fonts,
            AssetKind::Script => &mut self.scripts,
        }
    }

    pub fn assets_downloaded(&self) -> usize {
        AssetKind::all()
            .iter()
            .map(|kind| self.assets(*kind).downloaded)
            .sum()
    }

    pub fn assets_failed(&self) -> usize {
        AssetKind::all()
            .iter()
            .map(|kind| self.assets(*kind).failed)
            .sum()
    }

    /// Pages that reached a terminal state through a fetch
    pub fn pages_attempted(&self) -> usize {
        self.pages_fetched + self.pages_not_found + self.pages_failed
    }

    /// Share of attempted pages fetched successfully, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_attempted();
        if attempted == 0 {
            return 0.0;
        }
        (self.pages_fetched as f64 / attempted as f64) * 100.0
    }

    /// Name of the backend that fetched the last page
    pub fn backend_label(&self) -> &'static str {
        match (self.initial_backend, self.downgraded) {
            (Some(BackendKind::Headless), true) => "headless, downgraded to http",
            (Some(BackendKind::Headless), false) => "headless",
            (Some(BackendKind::Http), _) => "http",
            (None, _) => "none",
        }
    }
}

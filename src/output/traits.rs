//! Output collaborator traits and types
//!
//! The core talks to the outside world through two seams: a
//! [`ProgressSink`] receiving milestone updates while a job runs, and a
//! [`Packager`] consuming the finished mirror.

use crate::assets::{AssetMap, StoredAsset};
use crate::output::log::LogEntry;
use crate::output::stats::JobStats;
use crate::rewrite::UrlToLocalPath;
use crate::url::CanonicalUrl;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Fixed points in a job at which progress is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    CrawlStarted,
    HtmlExtracted,
    CssDone,
    ImagesDone,
    FontsDone,
    ScriptsDone,
    RewritingDone,
    ContentExtracted,
    PackagingDone,
}

impl Milestone {
    /// Percent complete reported with this milestone
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::CrawlStarted => 5,
            Milestone::HtmlExtracted => 30,
            Milestone::CssDone => 45,
            Milestone::ImagesDone => 60,
            Milestone::FontsDone => 70,
            Milestone::ScriptsDone => 75,
            Milestone::RewritingDone => 85,
            Milestone::ContentExtracted => 90,
            Milestone::PackagingDone => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Milestone::CrawlStarted => "crawl started",
            Milestone::HtmlExtracted => "html extracted",
            Milestone::CssDone => "css done",
            Milestone::ImagesDone => "images done",
            Milestone::FontsDone => "fonts done",
            Milestone::ScriptsDone => "scripts done",
            Milestone::RewritingDone => "rewriting done",
            Milestone::ContentExtracted => "content extracted",
            Milestone::PackagingDone => "packaging done",
        }
    }

    /// Every milestone in job order
    pub fn all() -> [Milestone; 9] {
        [
            Milestone::CrawlStarted,
            Milestone::HtmlExtracted,
            Milestone::CssDone,
            Milestone::ImagesDone,
            Milestone::FontsDone,
            Milestone::ScriptsDone,
            Milestone::RewritingDone,
            Milestone::ContentExtracted,
            Milestone::PackagingDone,
        ]
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress report
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub job_id: String,
    pub step: Milestone,
    pub percent: u8,
    /// Job log as of this milestone
    pub log: Vec<LogEntry>,
    pub stats: JobStats,
}

/// Receives progress updates; append-only from the job's point of view
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: ProgressUpdate);
}

/// A finished page ready for packaging
#[derive(Debug, Clone)]
pub struct MirrorPage {
    pub url: CanonicalUrl,
    /// Rewritten HTML
    pub html: String,
    pub title: String,
    pub slug: String,
    /// File name relative to the mirror root
    pub file: String,
}

/// Everything the packaging collaborator receives
#[derive(Debug, Clone, Default)]
pub struct MirrorOutput {
    pub pages: Vec<MirrorPage>,
    pub assets: AssetMap,
    pub url_to_local: UrlToLocalPath,
    /// Downloaded asset bodies, keyed by their local path
    pub stored_assets: Vec<StoredAsset>,
    /// Consolidated stylesheet, written to [`crate::assets::CONSOLIDATED_STYLESHEET`]
    pub stylesheet: Option<String>,
}

/// Turns a [`MirrorOutput`] into artifacts
pub trait Packager {
    /// Writes the mirror
    ///
    /// # Returns
    ///
    /// Number of files written
    fn package(&self, output: &MirrorOutput) -> OutputResult<usize>;
}

/// One row of the report's page table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub url: String,
    pub file: String,
    pub title: String,
}

/// Summary of a finished (or failed) job, rendered by the markdown report
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub job_id: String,
    pub start_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// `completed` or `failed`
    pub status: String,
    pub config_hash: Option<String>,
    pub stats: JobStats,
    pub pages: Vec<PageSummary>,
    pub log: Vec<LogEntry>,
    /// Message of the fatal error, if the job failed
    pub error: Option<String>,
}

impl JobSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_percent_increases() {
        let percents: Vec<u8> = Milestone::all().iter().map(|m| m.percent()).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.first(), Some(&5));
        assert_eq!(percents.last(), Some(&100));
    }
}

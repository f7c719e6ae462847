//! Output module: progress reporting, statistics, packaging and reports
//!
//! This module handles:
//! - Forwarding milestone updates to a progress sink
//! - Accumulating job statistics and the structured job log
//! - Writing the finished mirror through a packaging collaborator
//! - Generating the markdown job report

mod directory;
pub mod log;
mod markdown;
mod progress;
pub mod stats;
mod traits;

pub use directory::DirectoryPackager;
pub use log::{JobLog, LogEntry, LogLevel};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use progress::{RecordingProgress, TracingProgress};
pub use stats::{AssetCounts, JobStats};
pub use traits::{
    JobSummary, Milestone, MirrorOutput, MirrorPage, OutputError, OutputResult, Packager,
    PageSummary, ProgressSink, ProgressUpdate,
};

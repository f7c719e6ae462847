//! Progress sinks

use crate::output::traits::{Milestone, ProgressSink, ProgressUpdate};
use std::sync::{Mutex, PoisonError};

/// Logs each milestone through `tracing`
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn update(&self, update: ProgressUpdate) {
        tracing::info!(
            "[{}] {:>3}% {} ({} pages, {} assets)",
            update.job_id,
            update.percent,
            update.step,
            update.stats.pages_fetched,
            update.stats.assets_downloaded()
        );
    }
}

/// Keeps every update in memory
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn milestones(&self) -> Vec<Milestone> {
        self.updates().iter().map(|u| u.step).collect()
    }

    pub fn last(&self) -> Option<ProgressUpdate> {
        self.updates().last().cloned()
    }
}

impl ProgressSink for RecordingProgress {
    fn update(&self, update: ProgressUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }
}

/// Page state definitions for tracking crawl progress
///
/// This module defines all possible states a page can be in during a crawl.
use std::fmt;

/// Represents the current state of a page in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Page is in the frontier waiting to be fetched
    Queued,

    /// Page has been marked visited and is being fetched
    Fetching,

    // ===== Terminal Success States =====
    /// Page was fetched and its links extracted
    Fetched,

    // ===== Terminal Skip States =====
    /// Page returned HTTP 404; skipped without being counted as a failure
    NotFound,

    /// Page was never fetched because the page cap was reached
    CapReached,

    // ===== Terminal Error States =====
    /// Page fetch failed (other 4xx/5xx, transport or backend error)
    Failed,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetching)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Returns true if this represents a silent skip
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::NotFound | Self::CapReached)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Short lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::NotFound => "not_found",
            Self::CapReached => "cap_reached",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Fetching,
            Self::Fetched,
            Self::NotFound,
            Self::CapReached,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

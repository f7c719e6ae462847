//! Transport module
//!
//! Byte- and text-level fetching with timeout and retry. Everything that
//! touches the network outside the headless browser goes through the
//! [`Transport`] trait so the crawl and asset stages can be exercised
//! against mock servers.

mod http;

pub use http::{build_http_client, HttpTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl TransportError {
    /// Whether a retry has a chance of succeeding
    ///
    /// Connection failures, timeouts and 5xx responses are transient; 4xx
    /// responses and client construction errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Timeout(_) | Self::Connect { .. } | Self::Request { .. } => true,
            Self::Body { .. } | Self::ClientBuild(_) => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A text response
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub body: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: String,
}

impl TextResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A binary response
#[derive(Debug, Clone)]
pub struct BytesResponse {
    pub bytes: Vec<u8>,
    pub status: u16,
    pub content_type: Option<String>,
}

impl BytesResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch capability consumed by the crawler, sitemap reader and asset resolver
///
/// Implementations retry transient failures themselves. A non-2xx response
/// that survives the retries is returned as a normal response carrying its
/// status, never as an error, so callers decide how to classify it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` and decodes the body as text
    async fn fetch_text(&self, url: &str) -> Result<TextResponse, TransportError>;

    /// Fetches `url` as raw bytes
    async fn fetch_bytes(&self, url: &str) -> Result<BytesResponse, TransportError>;
}

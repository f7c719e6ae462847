//! Fetch backends
//!
//! A backend turns a canonical URL into an HTML document. Two
//! implementations exist: [`HttpBackend`] issues a plain request and
//! [`super::HeadlessBackend`] renders the page in a browser first.

use crate::config::BackendKind;
use crate::transport::Transport;
use crate::url::CanonicalUrl;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Why a backend could not produce a page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP 404; the page is skipped silently
    #[error("not found")]
    NotFound,

    /// Any other non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// The network layer gave up
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend itself broke (browser crash, launch failure, CDP error)
    #[error("backend error: {0}")]
    Backend(String),
}

/// Raw result of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub html: String,
    /// URL after redirects
    pub final_url: String,
    /// Title reported by the backend, if it has one
    pub title: Option<String>,
}

/// One way of retrieving pages
#[async_trait]
pub trait FetchBackend: Send {
    fn kind(&self) -> BackendKind;

    async fn fetch(&mut self, url: &CanonicalUrl) -> Result<FetchedDocument, FetchError>;

    /// Releases external resources; the backend may be used again afterwards
    async fn shutdown(&mut self) {}
}

/// Plain HTTP backend: the response body is the page
pub struct HttpBackend {
    transport: Arc<dyn Transport>,
}

impl HttpBackend {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl FetchBackend for HttpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn fetch(&mut self, url: &CanonicalUrl) -> Result<FetchedDocument, FetchError> {
        let response = self
            .transport
            .fetch_text(url.as_str())
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match response.status {
            404 => Err(FetchError::NotFound),
            status if !(200..300).contains(&status) => Err(FetchError::Status(status)),
            _ => Ok(FetchedDocument {
                html: response.body,
                final_url: response.final_url,
                title: None,
            }),
        }
    }
}

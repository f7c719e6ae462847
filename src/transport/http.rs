//! HTTP transport implementation
//!
//! This module handles all plain HTTP requests, including:
//! - Building HTTP clients with the configured user agent
//! - Following at most `max-redirects` redirects
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::FetchConfig;
use crate::transport::{BytesResponse, TextResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The `[fetch]` section of the job configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(TransportError)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use kagami::config::FetchConfig;
/// use kagami::transport::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, TransportError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(!config.reject_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| TransportError::ClientBuild(e.to_string()))
}

/// [`Transport`] backed by `reqwest`
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx/3xx | Return |
/// | HTTP 4xx | Return immediately, never retried |
/// | HTTP 5xx | Retry; after the last retry the response is returned |
/// | Timeout / connect / request error | Retry; after the last retry the error is returned |
///
/// The delay before retry `n` (starting at 0) is `retry-base-delay-ms * 2^n`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_http_client(config)?,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    async fn send_with_retry(&self, url: &str) -> Result<Response, TransportError> {
        let mut attempt = 0u32;

        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < self.max_retries {
                        tracing::debug!(
                            "HTTP {} for {}, retry {}/{}",
                            status.as_u16(),
                            url,
                            attempt + 1,
                            self.max_retries
                        );
                        self.backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let error = classify_error(url, &e);
                    if error.is_transient() && attempt < self.max_retries {
                        tracing::debug!(
                            "{}, retry {}/{}",
                            error,
                            attempt + 1,
                            self.max_retries
                        );
                        self.backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let factor = 2u32.saturating_pow(attempt);
        tokio::time::sleep(self.base_delay.saturating_mul(factor)).await;
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> Result<TextResponse, TransportError> {
        let response = self.send_with_retry(url).await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = content_type_of(&response);

        let body = response.text().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(TextResponse {
            body,
            status,
            content_type,
            final_url,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<BytesResponse, TransportError> {
        let response = self.send_with_retry(url).await?;
        let status = response.status().as_u16();
        let content_type = content_type_of(&response);

        let bytes = response.bytes().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(BytesResponse {
            bytes: bytes.to_vec(),
            status,
            content_type,
        })
    }
}

fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Maps a reqwest error onto the transport taxonomy
fn classify_error(url: &str, e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(url.to_string())
    } else if e.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else if e.is_redirect() || e.is_builder() {
        // too many redirects or an unusable URL will not improve on retry
        TransportError::Body {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

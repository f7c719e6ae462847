//! Headless-render backend

use super::backend::{FetchBackend, FetchError, FetchedDocument};
use super::materialize::{MaterializationProtocol, StepContext};
use super::render::{RenderHost, RenderSession};
use crate::config::BackendKind;
use crate::url::CanonicalUrl;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Renders each page in a browser and runs the materialization protocol
/// before capturing its HTML
///
/// The browser is launched lazily on the first fetch and torn down by
/// [`FetchBackend::shutdown`]; a later fetch launches a new one.
pub struct HeadlessBackend {
    host: Arc<dyn RenderHost>,
    session: Option<Box<dyn RenderSession>>,
    protocol: MaterializationProtocol,
    navigation_timeout: Duration,
    pages_rendered: usize,
}

impl HeadlessBackend {
    pub fn new(
        host: Arc<dyn RenderHost>,
        protocol: MaterializationProtocol,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            host,
            session: None,
            protocol,
            navigation_timeout,
            pages_rendered: 0,
        }
    }

    async fn session(&mut self) -> Result<&mut Box<dyn RenderSession>, FetchError> {
        if self.session.is_none() {
            let session = self
                .host
                .launch()
                .await
                .map_err(|e| FetchError::Backend(format!("{e:#}")))?;
            self.session = Some(session);
        }

        self.session
            .as_mut()
            .ok_or_else(|| FetchError::Backend("browser session unavailable".to_string()))
    }
}

#[async_trait]
impl FetchBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    async fn fetch(&mut self, url: &CanonicalUrl) -> Result<FetchedDocument, FetchError> {
        let timeout = self.navigation_timeout;
        let page = self
            .session()
            .await?
            .open(url.as_str(), timeout)
            .await
            .map_err(|e| FetchError::Backend(format!("{e:#}")))?;

        match page.status() {
            404 => {
                let _ = page.close().await;
                return Err(FetchError::NotFound);
            }
            status if status >= 400 => {
                let _ = page.close().await;
                return Err(FetchError::Status(status));
            }
            _ => {}
        }

        let ctx = StepContext {
            first_page: self.pages_rendered == 0,
        };
        let report = self.protocol.run(page.as_ref(), ctx).await;
        tracing::debug!(
            "Materialized {} ({}/{} steps completed)",
            url,
            report.completed(),
            report.steps.len()
        );

        let html = page.content().await;
        let title = page.title().await.ok().flatten();
        let final_url = page.final_url().to_string();
        let _ = page.close().await;

        let html = html.map_err(|e| FetchError::Backend(format!("{e:#}")))?;
        self.pages_rendered += 1;

        Ok(FetchedDocument {
            html,
            final_url,
            title,
        })
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::debug!("Browser shutdown: {e:#}");
            }
        }
    }
}

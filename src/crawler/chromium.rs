//! Chromium render host using chromiumoxide.

use super::render::{RenderHost, RenderSession, RenderedPage};
use crate::config::HeadlessConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Status lookup through the Navigation Timing API; 0 when unavailable
const STATUS_SCRIPT: &str = "(() => { \
    const nav = performance.getEntriesByType('navigation')[0]; \
    return nav && nav.responseStatus ? nav.responseStatus : 0; })()";

/// Launches headless Chromium through the DevTools protocol
#[derive(Debug, Clone)]
pub struct ChromiumHost {
    executable: Option<PathBuf>,
}

impl ChromiumHost {
    pub fn new(config: &HeadlessConfig) -> Self {
        Self {
            executable: config.chrome_path.as_ref().map(PathBuf::from),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--hide-scrollbars")
            .window_size(1366, 900);

        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))
    }
}

#[async_trait]
impl RenderHost for ChromiumHost {
    async fn launch(&self) -> Result<Box<dyn RenderSession>> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::trace!("CDP handler event error");
                }
            }
        });

        tracing::debug!("Chromium launched");
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
        }))
    }
}

/// One running Chromium process
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<Box<dyn RenderedPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = page.close().await;
                bail!("navigation to {url} failed: {e}");
            }
            Err(_) => {
                let _ = page.close().await;
                bail!("navigation to {url} timed out after {}s", timeout.as_secs());
            }
        }

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        let mut rendered = ChromiumPage {
            page,
            status: 200,
            final_url,
        };
        rendered.status = match rendered.evaluate(STATUS_SCRIPT).await {
            Ok(value) => value
                .as_u64()
                .and_then(|s| u16::try_from(s).ok())
                .filter(|s| *s > 0)
                .unwrap_or(200),
            Err(_) => 200,
        };

        Ok(Box::new(rendered))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        tracing::debug!("Chromium closed");
        closed.map(|_| ()).context("failed to close Chromium")
    }
}

/// A tab in a [`ChromiumSession`]
pub struct ChromiumPage {
    page: Page,
    status: u16,
    final_url: String,
}

#[async_trait]
impl RenderedPage for ChromiumPage {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("invalid evaluate params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn title(&self) -> Result<Option<String>> {
        self.page.get_title().await.context("failed to get title")
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn final_url(&self) -> &str {
        &self.final_url
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("failed to close page")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_with_explicit_path() {
        let config = HeadlessConfig {
            chrome_path: Some("/opt/chromium/chrome".to_string()),
            ..HeadlessConfig::default()
        };
        let host = ChromiumHost::new(&config);
        assert_eq!(host.executable, Some(PathBuf::from("/opt/chromium/chrome")));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_open_and_evaluate() {
        let host = ChromiumHost::new(&HeadlessConfig::default());
        let mut session = host.launch().await.expect("failed to launch");

        let page = session
            .open("data:text/html,<title>T</title><h1>Hello</h1>", Duration::from_secs(10))
            .await
            .expect("navigation failed");

        let value = page
            .evaluate("(async () => document.querySelector('h1').textContent)()")
            .await
            .expect("JS execution failed");
        assert_eq!(value.as_str(), Some("Hello"));
        assert!(page.content().await.unwrap().contains("<h1>Hello</h1>"));
        assert_eq!(page.title().await.unwrap().as_deref(), Some("T"));

        page.close().await.expect("close failed");
        session.close().await.expect("shutdown failed");
    }
}

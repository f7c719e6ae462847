//! Render host abstraction for the headless backend.
//!
//! A [`RenderHost`] launches one browser per crawl attempt, the resulting
//! [`RenderSession`] opens pages, and each [`RenderedPage`] can run scripts
//! and hand back its final HTML. The browser plumbing reports errors through
//! `anyhow`; the backend converts them at its boundary.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Something that can start a scriptable browser
#[async_trait]
pub trait RenderHost: Send + Sync {
    /// Launches a fresh browser instance
    async fn launch(&self) -> Result<Box<dyn RenderSession>>;
}

/// A running browser
#[async_trait]
pub trait RenderSession: Send {
    /// Opens `url` in a new tab and waits for navigation to finish
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<Box<dyn RenderedPage>>;

    /// Terminates the browser
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A loaded page inside a render session
#[async_trait]
pub trait RenderedPage: Send + Sync {
    /// Evaluates a script, awaiting a returned promise, and returns its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Serialized DOM of the page as it is now
    async fn content(&self) -> Result<String>;

    /// Document title, if any
    async fn title(&self) -> Result<Option<String>>;

    /// HTTP status of the main document
    fn status(&self) -> u16;

    /// URL after redirects
    fn final_url(&self) -> &str;

    /// Closes the tab
    async fn close(self: Box<Self>) -> Result<()>;
}

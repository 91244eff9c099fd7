//! The seam between the analysis pipeline and whatever renders pages.
//!
//! Every stage reads the DOM through [`PageHandle::content`] and parses the
//! snapshot itself, so a driver only needs to load pages and serialize them.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Page lifecycle milestones a driver can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// A single isolated tab.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Load `url`, resolving once `wait_until` is reached or failing after `timeout`.
    async fn navigate(&self, url: &str, wait_until: LoadState, timeout: Duration) -> Result<()>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

    /// Resolve once any element matches the CSS `selector`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    /// Current document URL, after any redirects.
    async fn url(&self) -> Result<String>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    async fn close(&self) -> Result<()>;
}

/// One driver instance is shared by every company in a run.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>>;

    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Default budget applied to driver operations that are not given one.
    pub timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Starts a driver. Failing here is fatal for a whole batch.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserDriver>>;
}

/// Bound any driver future by `timeout`, whether or not the driver honours its own budget.
pub async fn with_timeout<T, F>(timeout: Duration, action: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(crate::error::ScanError::timeout(action, timeout)),
    }
}

//! In-memory page used by the unit tests.

use crate::driver::{LoadState, PageHandle};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct State {
    url: String,
    /// Served in order by `content`; the last one repeats.
    snapshots: Vec<String>,
    evaluated: Vec<String>,
}

pub struct FixturePage {
    state: Mutex<State>,
    routes: HashMap<String, String>,
    reads: AtomicUsize,
    never_idle: bool,
    failing_content: bool,
    scroll_metrics: Option<(f64, f64)>,
    pub closed: AtomicBool,
}

impl FixturePage {
    pub fn new(url: &str, html: &str) -> Self {
        Self::with_snapshots(url, vec![html.to_string()])
    }

    pub fn with_snapshots(url: &str, snapshots: Vec<String>) -> Self {
        Self {
            state: Mutex::new(State {
                url: url.to_string(),
                snapshots,
                evaluated: Vec::new(),
            }),
            routes: HashMap::new(),
            reads: AtomicUsize::new(0),
            never_idle: false,
            failing_content: false,
            scroll_metrics: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Serve `html` when `url` is navigated to.
    pub fn route(mut self, url: &str, html: &str) -> Self {
        self.routes.insert(url.to_string(), html.to_string());
        self
    }

    pub fn never_idle(mut self) -> Self {
        self.never_idle = true;
        self
    }

    pub fn failing_content(mut self) -> Self {
        self.failing_content = true;
        self
    }

    pub fn with_scroll_metrics(mut self, scroll_height: f64, viewport_height: f64) -> Self {
        self.scroll_metrics = Some((scroll_height, viewport_height));
        self
    }

    pub fn content_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.state.lock().unwrap().evaluated.clone()
    }
}

#[async_trait]
impl PageHandle for FixturePage {
    async fn navigate(&self, url: &str, _wait_until: LoadState, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(html) = self.routes.get(url) {
            state.url = url.to_string();
            state.snapshots = vec![html.clone()];
            Ok(())
        } else if state.url == url {
            Ok(())
        } else {
            Err(ScanError::Navigation {
                url: url.to_string(),
                reason: "no route".to_string(),
            })
        }
    }

    async fn wait_for_load_state(&self, state: LoadState, _timeout: Duration) -> Result<()> {
        if self.never_idle && state == LoadState::NetworkIdle {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let html = self.content().await?;
        let parsed = scraper::Selector::parse(selector).unwrap();
        if scraper::Html::parse_document(&html).select(&parsed).next().is_some() {
            Ok(())
        } else {
            Err(ScanError::timeout("waiting for selector", timeout))
        }
    }

    async fn content(&self) -> Result<String> {
        if self.failing_content {
            return Err(ScanError::Driver("target closed".to_string()));
        }
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let idx = n.min(state.snapshots.len().saturating_sub(1));
        Ok(state.snapshots.get(idx).cloned().unwrap_or_default())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.state.lock().unwrap().evaluated.push(script.to_string());
        match self.scroll_metrics {
            Some((scroll_height, viewport_height)) => Ok(serde_json::json!({
                "scrollHeight": scroll_height,
                "viewportHeight": viewport_height,
            })),
            None => Err(ScanError::Unsupported("evaluate".to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

//! A browser-less driver that fetches pages over plain HTTP.
//!
//! Pages are never rendered, so script-built content is invisible and
//! `evaluate` is unsupported. Good enough for server-rendered sites and for
//! exercising the pipeline against fixtures.

use crate::driver::{BrowserDriver, DriverLauncher, LaunchOptions, LoadState, PageHandle};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; Formscout/0.1)";

pub struct HttpDriver {
    client: Client,
    closed: AtomicBool,
    open_pages: Arc<AtomicUsize>,
    // Close flags of every page handed out, so `close` can reap abandoned ones.
    pages: Mutex<Vec<Arc<AtomicBool>>>,
}

impl HttpDriver {
    pub fn new(options: &LaunchOptions) -> Result<Self> {
        let user_agent = options
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(options.timeout)
            .connect_timeout(options.timeout / 2)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()
            .map_err(|e| ScanError::Launch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            closed: AtomicBool::new(false),
            open_pages: Arc::new(AtomicUsize::new(0)),
            pages: Mutex::new(Vec::new()),
        })
    }

    pub fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ScanError::Driver("driver has been closed".to_string()));
        }
        let closed = Arc::new(AtomicBool::new(false));
        {
            let mut pages = self.pages.lock().await;
            pages.retain(|flag| !flag.load(Ordering::Acquire));
            pages.push(closed.clone());
            self.open_pages.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            snapshot: Mutex::new(None),
            closed,
            open_pages: self.open_pages.clone(),
        }))
    }

    /// Stop handing out pages and close every page still open, including
    /// pages whose owner went away without closing them.
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let mut reaped = 0;
        for flag in self.pages.lock().await.drain(..) {
            if !flag.swap(true, Ordering::AcqRel) {
                self.open_pages.fetch_sub(1, Ordering::Relaxed);
                reaped += 1;
            }
        }
        if reaped > 0 {
            debug!("HTTP driver closed {} abandoned page(s)", reaped);
        }
        Ok(())
    }
}

/// Launches an [`HttpDriver`]. `headless` has no meaning here and is ignored.
#[derive(Debug, Default, Clone)]
pub struct HttpLauncher;

#[async_trait]
impl DriverLauncher for HttpLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserDriver>> {
        info!("Launching HTTP driver (timeout {:?})", options.timeout);
        Ok(Arc::new(HttpDriver::new(options)?))
    }
}

struct Snapshot {
    url: String,
    body: String,
}

pub struct HttpPage {
    client: Client,
    snapshot: Mutex<Option<Snapshot>>,
    closed: Arc<AtomicBool>,
    open_pages: Arc<AtomicUsize>,
}

impl HttpPage {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ScanError::Driver("page has been closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageHandle for HttpPage {
    async fn navigate(&self, url: &str, wait_until: LoadState, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        url::Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("Fetching {} (wait until {})", url, wait_until.as_str());
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(url, timeout, e))?;

        let final_url = response.url().to_string();
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, timeout, e))?;

        debug!(
            "Fetched {} -> {} ({}, {} bytes in {:?})",
            url,
            final_url,
            status,
            body.len(),
            start.elapsed()
        );

        *self.snapshot.lock().await = Some(Snapshot {
            url: final_url,
            body,
        });
        Ok(())
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> Result<()> {
        // The body is complete once navigate returns.
        self.ensure_open()
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let body = self.content().await?;
        if document_matches(&body, selector)? {
            Ok(())
        } else {
            // A static document never changes, so waiting longer cannot help.
            Err(ScanError::timeout(
                format!("waiting for selector '{}'", selector),
                timeout,
            ))
        }
    }

    async fn content(&self) -> Result<String> {
        self.ensure_open()?;
        self.snapshot
            .lock()
            .await
            .as_ref()
            .map(|s| s.body.clone())
            .ok_or_else(|| ScanError::Driver("no document loaded".to_string()))
    }

    async fn url(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self
            .snapshot
            .lock()
            .await
            .as_ref()
            .map(|s| s.url.clone())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Err(ScanError::Unsupported(
            "script evaluation requires a rendering driver".to_string(),
        ))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.open_pages.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

fn document_matches(html: &str, selector: &str) -> Result<bool> {
    let parsed = Selector::parse(selector)
        .map_err(|e| ScanError::Driver(format!("invalid selector '{}': {:?}", selector, e)))?;
    Ok(Html::parse_document(html).select(&parsed).next().is_some())
}

/// Timeouts and failures to reach the page are navigation faults. Anything
/// that goes wrong after the response started (a truncated or undecodable
/// body) stays a raw HTTP error.
fn classify_request_error(url: &str, timeout: Duration, error: reqwest::Error) -> ScanError {
    if error.is_timeout() {
        ScanError::timeout(format!("loading {}", url), timeout)
    } else if error.is_body() || error.is_decode() {
        ScanError::HttpError(error)
    } else {
        ScanError::Navigation {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

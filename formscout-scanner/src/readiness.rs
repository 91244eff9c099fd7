//! Deciding when a script-heavy page has rendered enough to be read.

use crate::driver::{LoadState, PageHandle, with_timeout};
use crate::poll::{PollPolicy, Probe, poll_until};
use crate::result::DynamicContentResult;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub dom_content_timeout: Duration,
    /// Network idle is best effort: running out of this budget is not a failure.
    pub network_idle_timeout: Duration,
    /// Pause for deferred scripts after the load states settle.
    pub settle_delay: Duration,
    pub content_poll: PollPolicy,
    /// Body text must be longer than this many characters.
    pub min_content_length: usize,
    /// How long to wait for navigational elements on a homepage.
    pub element_timeout: Duration,
    /// Re-reading a homepage that has no links yet.
    pub link_poll: PollPolicy,
    pub max_scroll_steps: u32,
    pub scroll_step_pause: Duration,
    pub scroll_bottom_pause: Duration,
    pub scroll_top_pause: Duration,
    /// Pause after lazy-load scrolling before the DOM is read.
    pub post_scroll_delay: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            dom_content_timeout: Duration::from_secs(10),
            network_idle_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(3),
            content_poll: PollPolicy::new(3, Duration::from_secs(2)),
            min_content_length: 100,
            element_timeout: Duration::from_secs(5),
            link_poll: PollPolicy::new(3, Duration::from_secs(2)),
            max_scroll_steps: 5,
            scroll_step_pause: Duration::from_secs(1),
            scroll_bottom_pause: Duration::from_secs(1),
            scroll_top_pause: Duration::from_millis(500),
            post_scroll_delay: Duration::from_secs(2),
        }
    }
}

impl ReadinessConfig {
    /// No pauses. For drivers whose documents are complete once loaded, such as `HttpDriver`.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            content_poll: PollPolicy::new(1, Duration::ZERO),
            link_poll: PollPolicy::new(1, Duration::ZERO),
            scroll_step_pause: Duration::ZERO,
            scroll_bottom_pause: Duration::ZERO,
            scroll_top_pause: Duration::ZERO,
            post_scroll_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Wait until the page has visible content. Never fails; problems come back as `loaded: false`.
pub async fn wait_for_dynamic_content(
    page: &dyn PageHandle,
    config: &ReadinessConfig,
) -> DynamicContentResult {
    if let Err(e) = with_timeout(
        config.dom_content_timeout,
        "waiting for DOM content",
        page.wait_for_load_state(LoadState::DomContentLoaded, config.dom_content_timeout),
    )
    .await
    {
        return DynamicContentResult::not_loaded(e.to_string());
    }

    settle(page, config).await;

    let min_len = config.min_content_length;
    let outcome = poll_until(config.content_poll, |attempt| async move {
        match page.content().await {
            Ok(html) => {
                let len = visible_text_length(&html);
                debug!("Content check {}: {} chars of body text", attempt, len);
                if len > min_len {
                    Probe::Ready(Ok(len))
                } else {
                    Probe::Pending(Some(Ok(len)))
                }
            }
            Err(e) => Probe::Ready(Err(e)),
        }
    })
    .await;

    match outcome.into_value() {
        Some(Ok(len)) if len > min_len => DynamicContentResult::loaded(),
        Some(Err(e)) => DynamicContentResult::not_loaded(e.to_string()),
        _ => DynamicContentResult::not_loaded("Page loaded but no content found"),
    }
}

/// Best-effort network idle followed by the fixed settle delay.
pub async fn settle(page: &dyn PageHandle, config: &ReadinessConfig) {
    // Sites with constant background traffic never go idle.
    if let Err(e) = with_timeout(
        config.network_idle_timeout,
        "waiting for network idle",
        page.wait_for_load_state(LoadState::NetworkIdle, config.network_idle_timeout),
    )
    .await
    {
        debug!("Network idle not reached, continuing: {}", e);
    }

    if !config.settle_delay.is_zero() {
        tokio::time::sleep(config.settle_delay).await;
    }
}

/// Length in characters of the trimmed `<body>` text.
pub fn visible_text_length(html: &str) -> usize {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").unwrap();
    document
        .select(&body_selector)
        .next()
        .map(|body| body.text().collect::<String>().trim().chars().count())
        .unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollMetrics {
    scroll_height: f64,
    viewport_height: f64,
}

const SCROLL_METRICS_SCRIPT: &str = "({ scrollHeight: document.documentElement.scrollHeight, viewportHeight: window.innerHeight })";

/// Number of viewport-sized steps needed to reach the bottom, capped at `max_steps`.
pub fn lazy_load_steps(scroll_height: f64, viewport_height: f64, max_steps: u32) -> u32 {
    if viewport_height <= 0.0 || scroll_height <= 0.0 {
        return 0;
    }
    let steps = (scroll_height / viewport_height).ceil();
    if steps >= max_steps as f64 {
        max_steps
    } else {
        steps as u32
    }
}

/// Scroll down in viewport steps, then to the bottom, then back to the top,
/// so lazily mounted sections (forms included) get rendered. Never fails.
pub async fn trigger_lazy_load(page: &dyn PageHandle, config: &ReadinessConfig) {
    let metrics = match page.evaluate(SCROLL_METRICS_SCRIPT).await {
        Ok(value) => match serde_json::from_value::<ScrollMetrics>(value) {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("Lazy-load skipped, unreadable scroll metrics: {}", e);
                return;
            }
        },
        Err(e) => {
            warn!("Lazy-load skipped: {}", e);
            return;
        }
    };

    let steps = lazy_load_steps(
        metrics.scroll_height,
        metrics.viewport_height,
        config.max_scroll_steps,
    );
    debug!(
        "Scrolling {} step(s) over {}px (viewport {}px)",
        steps, metrics.scroll_height, metrics.viewport_height
    );

    let mut plan: Vec<(String, Duration)> = (0..=steps)
        .map(|i| {
            (
                format!("window.scrollTo(0, {})", metrics.viewport_height * i as f64),
                config.scroll_step_pause,
            )
        })
        .collect();
    plan.push((
        "window.scrollTo(0, document.documentElement.scrollHeight)".to_string(),
        config.scroll_bottom_pause,
    ));
    plan.push(("window.scrollTo(0, 0)".to_string(), config.scroll_top_pause));

    for (script, pause) in plan {
        if let Err(e) = page.evaluate(&script).await {
            warn!("Lazy-load scroll interrupted: {}", e);
            return;
        }
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

/// Name the client-side framework that rendered the page, when its DOM markers are present.
pub fn detect_spa_framework(html: &str) -> Option<&'static str> {
    let document = Html::parse_document(html);
    let matches = |css: &str| {
        Selector::parse(css)
            .map(|sel| document.select(&sel).next().is_some())
            .unwrap_or(false)
    };

    if matches("[data-reactroot], [data-reactid]") {
        return Some("React");
    }

    let any_element = Selector::parse("*").unwrap();
    let vue_scoped = document.select(&any_element).any(|el| {
        el.value()
            .attrs()
            .any(|(name, _)| name.starts_with("data-v-"))
    });
    if vue_scoped || matches("[data-server-rendered]") {
        return Some("Vue");
    }

    if matches("[ng-version]") {
        return Some("Angular");
    }
    if matches("script#__NEXT_DATA__") {
        return Some("Next.js");
    }
    if html.contains("window.__NUXT__") || matches("#__nuxt") {
        return Some("Nuxt");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixturePage;

    fn filler(chars: usize) -> String {
        "あ".repeat(chars)
    }

    #[test]
    fn test_visible_text_length_counts_chars_not_bytes() {
        let html = format!("<html><body>  <p>{}</p>  </body></html>", filler(10));
        assert_eq!(visible_text_length(&html), 10);
        assert_eq!(visible_text_length(""), 0);
    }

    #[test]
    fn test_lazy_load_steps() {
        assert_eq!(lazy_load_steps(3000.0, 1000.0, 5), 3);
        assert_eq!(lazy_load_steps(3001.0, 1000.0, 5), 4);
        assert_eq!(lazy_load_steps(20000.0, 800.0, 5), 5);
        assert_eq!(lazy_load_steps(500.0, 0.0, 5), 0);
    }

    #[tokio::test]
    async fn test_content_ready_on_first_poll() {
        let page = FixturePage::new("https://example.jp/", &format!("<body>{}</body>", filler(150)));
        let result = wait_for_dynamic_content(&page, &ReadinessConfig::immediate()).await;
        assert_eq!(result, DynamicContentResult::loaded());
    }

    #[tokio::test]
    async fn test_content_appears_on_later_poll() {
        let page = FixturePage::with_snapshots(
            "https://example.jp/",
            vec![
                "<body><div id='app'></div></body>".to_string(),
                format!("<body><div id='app'>{}</div></body>", filler(101)),
            ],
        );
        let config = ReadinessConfig {
            content_poll: PollPolicy::new(3, Duration::ZERO),
            ..ReadinessConfig::immediate()
        };
        let result = wait_for_dynamic_content(&page, &config).await;
        assert!(result.loaded);
        assert_eq!(page.content_reads(), 2);
    }

    #[tokio::test]
    async fn test_thin_page_is_not_loaded() {
        let page = FixturePage::new("https://example.jp/", "<body><p>Loading...</p></body>");
        let config = ReadinessConfig {
            content_poll: PollPolicy::new(3, Duration::ZERO),
            ..ReadinessConfig::immediate()
        };
        let result = wait_for_dynamic_content(&page, &config).await;
        assert!(!result.loaded);
        assert_eq!(result.error.as_deref(), Some("Page loaded but no content found"));
        assert_eq!(page.content_reads(), 3);
    }

    #[tokio::test]
    async fn test_network_idle_timeout_is_tolerated() {
        let page = FixturePage::new("https://example.jp/", &format!("<body>{}</body>", filler(200)))
            .never_idle();
        let config = ReadinessConfig {
            network_idle_timeout: Duration::from_millis(10),
            ..ReadinessConfig::immediate()
        };
        let result = wait_for_dynamic_content(&page, &config).await;
        assert!(result.loaded);
    }

    #[tokio::test]
    async fn test_content_error_degrades_to_not_loaded() {
        let page = FixturePage::new("https://example.jp/", "").failing_content();
        let result = wait_for_dynamic_content(&page, &ReadinessConfig::immediate()).await;
        assert!(!result.loaded);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_trigger_lazy_load_scrolls_down_then_back() {
        let page = FixturePage::new("https://example.jp/", "<body></body>")
            .with_scroll_metrics(2500.0, 1000.0);
        trigger_lazy_load(&page, &ReadinessConfig::immediate()).await;

        let scripts = page.evaluated();
        // metrics read, 0..=3 steps, bottom, top
        assert_eq!(scripts.len(), 1 + 4 + 2);
        assert_eq!(scripts[1], "window.scrollTo(0, 0)");
        assert_eq!(scripts[4], "window.scrollTo(0, 3000)");
        assert!(scripts[5].contains("scrollHeight"));
        assert_eq!(scripts.last().unwrap(), "window.scrollTo(0, 0)");
    }

    #[tokio::test]
    async fn test_trigger_lazy_load_swallows_driver_errors() {
        // FixturePage without scroll metrics rejects evaluate, like HttpDriver.
        let page = FixturePage::new("https://example.jp/", "<body></body>");
        trigger_lazy_load(&page, &ReadinessConfig::immediate()).await;
        assert_eq!(page.evaluated().len(), 1);
    }

    #[test]
    fn test_detect_spa_framework() {
        assert_eq!(detect_spa_framework("<div data-reactroot=''></div>"), Some("React"));
        assert_eq!(detect_spa_framework("<div data-v-1a2b3c=''>x</div>"), Some("Vue"));
        assert_eq!(detect_spa_framework("<app-root ng-version='17.0.0'></app-root>"), Some("Angular"));
        assert_eq!(
            detect_spa_framework("<script id='__NEXT_DATA__' type='application/json'>{}</script>"),
            Some("Next.js")
        );
        assert_eq!(detect_spa_framework("<div id='__nuxt'></div>"), Some("Nuxt"));
        assert_eq!(detect_spa_framework("<p>plain</p>"), None);
    }
}

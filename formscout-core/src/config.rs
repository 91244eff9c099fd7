use formscout_scanner::driver::LaunchOptions;
use formscout_scanner::locator::{ContactKeywords, Language, LocatorOptions};
use formscout_scanner::poll::PollPolicy;
use formscout_scanner::readiness::ReadinessConfig;
use std::time::Duration;

/// Settings for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Budget for each navigation and content wait, in milliseconds.
    pub timeout_ms: u64,
    /// Extra attempts for a company whose pipeline hit a transient fault.
    pub max_retries: u32,
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Appended to the built-in contact keywords.
    pub contact_page_keywords: Vec<String>,
    pub preferred_language: Language,
    /// Companies analysed at the same time.
    pub concurrency: usize,
    pub readiness: ReadinessConfig,
    pub retry_delay: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 2,
            headless: true,
            user_agent: None,
            contact_page_keywords: Vec::new(),
            preferred_language: Language::Auto,
            concurrency: 3,
            readiness: ReadinessConfig::default(),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            user_agent: self.user_agent.clone(),
            timeout: self.timeout(),
        }
    }

    pub fn contact_keywords(&self) -> ContactKeywords {
        ContactKeywords::new(&self.contact_page_keywords)
    }

    pub fn locator_options(&self) -> LocatorOptions {
        LocatorOptions {
            language: self.preferred_language.clone(),
            return_all_matches: false,
        }
    }

    /// One first attempt plus `max_retries`.
    pub fn retry_policy(&self) -> PollPolicy {
        PollPolicy::new(self.max_retries.saturating_add(1), self.retry_delay)
    }
}

//! The per-company pipeline: homepage, contact page, readiness, extraction, assessment.
//!
//! A company never fails the caller. Every outcome, including driver faults,
//! ends up as an [`AnalysisResult`].

use crate::config::AnalyzerConfig;
use crate::model::{AnalysisResult, CompanyInput};
use formscout_scanner::assessor::assess_fillability;
use formscout_scanner::driver::{BrowserDriver, LoadState, PageHandle, with_timeout};
use formscout_scanner::error::ScanError;
use formscout_scanner::extractor::{extract_forms_from_html, select_contact_form};
use formscout_scanner::locator::{
    ContactKeywords, has_contact_form, load_homepage, locate_contact_page,
};
use formscout_scanner::poll::{Probe, poll_until};
use formscout_scanner::readiness::{
    detect_spa_framework, trigger_lazy_load, wait_for_dynamic_content,
};
use std::fmt;
use tracing::{debug, info, warn};

pub const CONTACT_PAGE_NOT_FOUND: &str = "Contact page not found";
pub const NO_FORM_ON_CONTACT_PAGE: &str = "No form found on contact page";
pub const FORM_NOT_EXTRACTED: &str = "Could not extract form structure";

/// Where a company is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Navigating,
    LocatingContactPage,
    ContactNotFound,
    AwaitingContent,
    Extracting,
    FormNotFound,
    Assessing,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Navigating => "navigating",
            Stage::LocatingContactPage => "locating contact page",
            Stage::ContactNotFound => "contact not found",
            Stage::AwaitingContent => "awaiting content",
            Stage::Extracting => "extracting",
            Stage::FormNotFound => "form not found",
            Stage::Assessing => "assessing",
            Stage::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::ContactNotFound | Stage::FormNotFound | Stage::Done)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A driver fault and how far the company got before it.
#[derive(Debug)]
pub struct StageFault {
    pub stage: Stage,
    pub error: ScanError,
    form_page_url: Option<String>,
    dynamic_content_loaded: bool,
}

impl StageFault {
    pub fn into_result(self, company: &CompanyInput) -> AnalysisResult {
        AnalysisResult {
            form_page_found: self.form_page_url.is_some(),
            form_page_url: self.form_page_url,
            dynamic_content_loaded: self.dynamic_content_loaded,
            ..AnalysisResult::with_error(company, format!("{}: {}", self.stage, self.error))
        }
    }
}

struct Tracker<'a> {
    company: &'a CompanyInput,
    stage: Stage,
    form_page_url: Option<String>,
    dynamic_content_loaded: bool,
}

impl<'a> Tracker<'a> {
    fn new(company: &'a CompanyInput) -> Self {
        Self {
            company,
            stage: Stage::Pending,
            form_page_url: None,
            dynamic_content_loaded: false,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!("{}: {} -> {}", self.company.name, self.stage, next);
        self.stage = next;
    }

    fn fault(self, error: ScanError) -> StageFault {
        StageFault {
            stage: self.stage,
            error,
            form_page_url: self.form_page_url,
            dynamic_content_loaded: self.dynamic_content_loaded,
        }
    }
}

/// Analyse one company on a fresh page, retrying transient faults up to `max_retries` times.
pub async fn analyze_company(
    driver: &dyn BrowserDriver,
    company: &CompanyInput,
    config: &AnalyzerConfig,
    keywords: &ContactKeywords,
) -> AnalysisResult {
    let outcome = poll_until(config.retry_policy(), |attempt| async move {
        match analyze_once(driver, company, config, keywords).await {
            Err(fault) if fault.error.is_transient() => {
                warn!(
                    "{}: attempt {} failed while {}: {}",
                    company.name, attempt, fault.stage, fault.error
                );
                Probe::Pending(Some(Err(fault)))
            }
            other => Probe::Ready(other),
        }
    })
    .await;

    let result = match outcome.into_value() {
        Some(Ok(result)) => result,
        Some(Err(fault)) => fault.into_result(company),
        None => AnalysisResult::with_error(company, "Analysis did not run"),
    };

    info!(
        "{}: {}{}",
        company.name,
        result.fillability_status,
        result
            .error_message
            .as_deref()
            .map(|e| format!(" ({})", e))
            .unwrap_or_default()
    );
    result
}

async fn analyze_once(
    driver: &dyn BrowserDriver,
    company: &CompanyInput,
    config: &AnalyzerConfig,
    keywords: &ContactKeywords,
) -> Result<AnalysisResult, StageFault> {
    let mut tracker = Tracker::new(company);
    tracker.advance(Stage::Navigating);

    let page = match with_timeout(config.timeout(), "opening page", driver.new_page()).await {
        Ok(page) => page,
        Err(e) => return Err(tracker.fault(e)),
    };

    let outcome = run_pipeline(page.as_ref(), &mut tracker, config, keywords).await;

    if let Err(e) = page.close().await {
        warn!("Failed to close page for {}: {}", company.name, e);
    }

    outcome.map_err(|e| tracker.fault(e))
}

async fn run_pipeline(
    page: &dyn PageHandle,
    tracker: &mut Tracker<'_>,
    config: &AnalyzerConfig,
    keywords: &ContactKeywords,
) -> Result<AnalysisResult, ScanError> {
    let company = tracker.company;
    let timeout = config.timeout();
    let readiness = &config.readiness;

    load_homepage(page, &company.url, readiness, timeout).await?;

    tracker.advance(Stage::LocatingContactPage);
    let contact = with_timeout(
        timeout,
        "locating contact page",
        locate_contact_page(page, &company.url, keywords, &config.locator_options(), readiness),
    )
    .await?;

    let contact_url = match contact.url {
        Some(url) if contact.found => url,
        _ => {
            tracker.advance(Stage::ContactNotFound);
            let reason = contact
                .error
                .unwrap_or_else(|| CONTACT_PAGE_NOT_FOUND.to_string());
            return Ok(AnalysisResult::with_error(company, reason));
        }
    };
    tracker.advance(Stage::AwaitingContent);
    with_timeout(
        timeout,
        "loading contact page",
        page.navigate(&contact_url, LoadState::DomContentLoaded, timeout),
    )
    .await?;
    // Only a contact page that actually loaded counts as found.
    tracker.form_page_url = Some(contact_url.clone());

    let dynamic = with_timeout(timeout, "waiting for dynamic content", async {
        Ok(wait_for_dynamic_content(page, readiness).await)
    })
    .await?;
    if let Some(reason) = &dynamic.error {
        debug!("{}: contact page not fully rendered: {}", company.name, reason);
    }
    tracker.dynamic_content_loaded = dynamic.loaded;

    if tokio::time::timeout(timeout, trigger_lazy_load(page, readiness))
        .await
        .is_err()
    {
        warn!("{}: lazy-load scrolling timed out", company.name);
    }
    if !readiness.post_scroll_delay.is_zero() {
        tokio::time::sleep(readiness.post_scroll_delay).await;
    }

    tracker.advance(Stage::Extracting);
    let html = with_timeout(timeout, "reading contact page", page.content()).await?;

    let found = AnalysisResult {
        form_page_found: true,
        form_page_url: Some(contact_url),
        dynamic_content_loaded: dynamic.loaded,
        spa_framework: detect_spa_framework(&html).map(str::to_string),
        ..AnalysisResult::new(company)
    };

    if !has_contact_form(&html) {
        tracker.advance(Stage::FormNotFound);
        return Ok(AnalysisResult {
            error_message: Some(NO_FORM_ON_CONTACT_PAGE.to_string()),
            ..found
        });
    }

    let Some(form) = select_contact_form(extract_forms_from_html(&html)) else {
        tracker.advance(Stage::FormNotFound);
        return Ok(AnalysisResult {
            error_message: Some(FORM_NOT_EXTRACTED.to_string()),
            ..found
        });
    };

    tracker.advance(Stage::Assessing);
    let assessment = assess_fillability(&form);

    tracker.advance(Stage::Done);
    Ok(AnalysisResult {
        fillability_status: assessment.status,
        form_structure: Some(form),
        mapped_fields: Some(assessment.mapped_fields),
        unmapped_required_fields: Some(assessment.unmapped_required_fields),
        ..found
    })
}

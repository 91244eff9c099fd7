use crate::analyze::analyze_company;
use crate::config::AnalyzerConfig;
use crate::model::{AnalysisResult, CompanyInput};
use formscout_scanner::driver::{BrowserDriver, DriverLauncher};
use formscout_scanner::error::ScanError;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Called once per finished company with `(completed, total, company_name)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

pub struct AnalyzeOptions {
    pub companies: Vec<CompanyInput>,
    pub config: AnalyzerConfig,
    pub show_progress_bars: bool,
}

/// Analyse every company on one shared driver, `config.concurrency` at a time.
///
/// Only a failed launch is an error. Results come back in input order, one
/// per company, however each company fared.
pub async fn analyze_companies(
    launcher: &dyn DriverLauncher,
    options: AnalyzeOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<Vec<AnalysisResult>, ScanError> {
    let AnalyzeOptions {
        companies,
        config,
        show_progress_bars,
    } = options;

    let driver = launcher.launch(&config.launch_options()).await?;
    info!("Analysing {} companies", companies.len());

    let results = run_batches(
        driver.clone(),
        &companies,
        config,
        show_progress_bars,
        progress_callback,
    )
    .await;

    if let Err(e) = driver.close().await {
        warn!("Failed to close browser driver: {}", e);
    }
    Ok(results)
}

async fn run_batches(
    driver: Arc<dyn BrowserDriver>,
    companies: &[CompanyInput],
    config: AnalyzerConfig,
    show_progress_bars: bool,
    progress_callback: Option<ProgressCallback>,
) -> Vec<AnalysisResult> {
    let total = companies.len();
    let concurrency = config.concurrency.max(1);
    let keywords = Arc::new(config.contact_keywords());
    let config = Arc::new(config);

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let completed = Arc::new(AtomicUsize::new(0));
    let notify: Arc<dyn Fn(&str) + Send + Sync> = {
        let progress_bar = progress_bar.clone();
        Arc::new(move |name: &str| {
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(pb) = &progress_bar {
                pb.set_message(name.to_string());
                pb.inc(1);
            }
            if let Some(callback) = &progress_callback {
                callback(done, total, name);
            }
        })
    };

    let mut results = Vec::with_capacity(total);
    for (batch, chunk) in companies.chunks(concurrency).enumerate() {
        debug!("Starting batch {} with {} companies", batch + 1, chunk.len());

        let tasks: Vec<_> = chunk
            .iter()
            .cloned()
            .map(|company| {
                let driver = driver.clone();
                let config = config.clone();
                let keywords = keywords.clone();
                let notify = notify.clone();
                tokio::spawn(async move {
                    let result = analyze_company(driver.as_ref(), &company, &config, &keywords).await;
                    notify(&company.name);
                    result
                })
            })
            .collect();

        for (company, joined) in chunk.iter().zip(join_all(tasks).await) {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    let error = ScanError::from(e);
                    warn!("Analysis task for {} failed: {}", company.name, error);
                    notify(&company.name);
                    results.push(AnalysisResult::with_error(
                        company,
                        format!("Analysis task failed: {}", error),
                    ));
                }
            }
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Analysis complete");
    }
    results
}

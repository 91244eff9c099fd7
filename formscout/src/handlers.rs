use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use formscout_core::batch::{AnalyzeOptions, ProgressCallback, analyze_companies};
use formscout_core::config::AnalyzerConfig;
use formscout_core::model::CompanyInput;
use formscout_core::report::{
    ReportFormat, ReportSummary, render_report, report_filename, save_report,
};
use formscout_scanner::assessor::{assess_fillability, field_mapping_report, fillability_percentage};
use formscout_scanner::driver::{BrowserDriver, DriverLauncher, LoadState, PageHandle, with_timeout};
use formscout_scanner::extractor::extract_contact_form;
use formscout_scanner::http_driver::HttpLauncher;
use formscout_scanner::locator::{ContactKeywords, Language, LocatorOptions, find_contact_page};
use formscout_scanner::readiness::{ReadinessConfig, trigger_lazy_load, wait_for_dynamic_content};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

// Helper functions for the analyze handler

/// Load companies from either a companies file or a single URL argument
pub fn load_companies_from_source(
    url: Option<&Url>,
    name: Option<&String>,
    companies_file: Option<&PathBuf>,
) -> Result<Vec<CompanyInput>, String> {
    if let Some(companies_file_path) = companies_file {
        load_companies_from_file(companies_file_path)
    } else if let Some(url) = url {
        let name = name
            .cloned()
            .unwrap_or_else(|| company_name_from_url(url.as_str()));
        Ok(vec![CompanyInput::new(name, url.as_str())])
    } else {
        Err("Either --url or --companies-file must be provided".to_string())
    }
}

/// Load and parse companies from a file
pub fn load_companies_from_file(path: &PathBuf) -> Result<Vec<CompanyInput>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read companies file {}: {}", path.display(), e))?;

    let companies: Vec<CompanyInput> = content.lines().filter_map(parse_company_line).collect();

    if companies.is_empty() {
        return Err(format!("No valid companies found in {}", path.display()));
    }

    Ok(companies)
}

/// Parse `name,url` or a bare URL. Blank lines and `#` comments yield `None`.
pub fn parse_company_line(line: &str) -> Option<CompanyInput> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    match line.split_once(',') {
        Some((name, url)) => {
            let url = parse_url_line(url.trim())?;
            let name = match name.trim() {
                "" => company_name_from_url(&url),
                name => name.to_string(),
            };
            Some(CompanyInput::new(name, url))
        }
        None => {
            let url = parse_url_line(line)?;
            Some(CompanyInput::new(company_name_from_url(&url), url))
        }
    }
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // Try to parse as-is
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

fn company_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Build the run configuration from `analyze` arguments.
pub fn analyzer_config_from_args(sub_matches: &ArgMatches) -> AnalyzerConfig {
    let defaults = AnalyzerConfig::default();
    AnalyzerConfig {
        timeout_ms: sub_matches
            .get_one::<u64>("timeout")
            .copied()
            .unwrap_or(defaults.timeout_ms),
        max_retries: sub_matches
            .get_one::<u32>("max-retries")
            .copied()
            .unwrap_or(defaults.max_retries),
        concurrency: sub_matches
            .get_one::<usize>("concurrency")
            .copied()
            .unwrap_or(defaults.concurrency)
            .max(1),
        preferred_language: parse_language(sub_matches.get_one::<String>("lang")),
        contact_page_keywords: sub_matches
            .get_many::<String>("keyword")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        // The bundled driver serves complete documents, so rendering waits are skipped.
        readiness: ReadinessConfig::immediate(),
        ..defaults
    }
}

fn parse_language(value: Option<&String>) -> Language {
    value
        .map(|v| v.parse::<Language>().unwrap_or_default())
        .unwrap_or_default()
}

/// Write a report into `output_dir` under a timestamped name and return its path.
pub fn write_report(content: &str, output_dir: &str, format: ReportFormat) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::tilde(output_dir);
    let path = Path::new(expanded.as_ref()).join(report_filename(format, chrono::Utc::now()));
    save_report(content, &path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(path)
}

pub fn print_banner() {
    println!(
        "{} {}",
        "formscout".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!("{}\n", "contact form discovery and fillability analysis".dimmed());
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_summary(summary: &ReportSummary) {
    let breakdown = &summary.fillability_breakdown;
    print_divider();
    println!("Companies analysed:    {}", summary.total_companies);
    println!(
        "Contact pages found:   {:.1}%",
        summary.form_discovery_success_rate
    );
    println!(
        "Content rendered:      {:.1}%",
        summary.dynamic_content_success_rate
    );
    println!("{}", format!("  Full:     {}", breakdown.full).green());
    println!("{}", format!("  Partial:  {}", breakdown.partial).yellow());
    println!("{}", format!("  None:     {}", breakdown.none).red());
    println!("{}", format!("  No form:  {}", breakdown.no_form).dimmed());
    print_divider();
}

fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    Some(spinner)
}

async fn open_page(timeout: Duration) -> anyhow::Result<(Arc<dyn BrowserDriver>, Box<dyn PageHandle>)> {
    let options = AnalyzerConfig {
        timeout_ms: timeout.as_millis() as u64,
        ..AnalyzerConfig::default()
    }
    .launch_options();
    let driver = HttpLauncher
        .launch(&options)
        .await
        .context("Failed to start the page driver")?;
    let page = driver.new_page().await.context("Failed to open a page")?;
    Ok((driver, page))
}

async fn close_page(driver: Arc<dyn BrowserDriver>, page: Box<dyn PageHandle>) {
    if let Err(e) = page.close().await {
        tracing::warn!("Failed to close page: {}", e);
    }
    if let Err(e) = driver.close().await {
        tracing::warn!("Failed to close driver: {}", e);
    }
}

pub async fn handle_analyze(sub_matches: &ArgMatches, quiet: bool) {
    let url = sub_matches.get_one::<Url>("url");
    let name = sub_matches.get_one::<String>("name");
    let companies_file = sub_matches.get_one::<PathBuf>("companies-file");
    let output_dir = sub_matches.get_one::<String>("output-dir");
    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    // Load companies from source
    let companies = match load_companies_from_source(url, name, companies_file) {
        Ok(companies) => companies,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let config = analyzer_config_from_args(sub_matches);

    if !quiet {
        println!("🔎 Analysing {} compan{}", companies.len(), if companies.len() == 1 { "y" } else { "ies" });
        println!("Concurrency: {}", config.concurrency);
        println!("Timeout: {} ms", config.timeout_ms);
        println!("Language: {}\n", config.preferred_language);
    }

    let options = AnalyzeOptions {
        companies,
        config,
        show_progress_bars: !quiet,
    };

    let progress_callback: ProgressCallback = Arc::new(|completed, total, name| {
        info!("[{}/{}] {} analysed", completed, total, name);
    });

    let results = match analyze_companies(&HttpLauncher, options, Some(progress_callback)).await {
        Ok(results) => results,
        Err(e) => {
            eprintln!("✗ Analysis failed: {}", e);
            std::process::exit(1);
        }
    };

    let summary = ReportSummary::from_results(results);
    let report = match render_report(format, &summary) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ Failed to render report: {}", e);
            std::process::exit(1);
        }
    };

    match output_dir {
        Some(dir) => match write_report(&report, dir, format) {
            Ok(path) => {
                if !quiet {
                    println!("\n✓ Analysis complete!\n");
                    print_summary(&summary);
                }
                println!("✓ Report saved to {}", path.display());
            }
            Err(e) => {
                eprintln!("✗ {:#}", e);
                std::process::exit(1);
            }
        },
        None => {
            if !quiet {
                println!("\n✓ Analysis complete!\n");
            }
            println!("{}", report);
        }
    }
}

pub async fn handle_find_contact(sub_matches: &ArgMatches, quiet: bool) {
    let url = match sub_matches.get_one::<Url>("url") {
        Some(url) => url.clone(),
        None => {
            eprintln!("✗ --url is required");
            std::process::exit(1);
        }
    };
    let options = LocatorOptions {
        language: parse_language(sub_matches.get_one::<String>("lang")),
        return_all_matches: sub_matches.get_flag("all"),
    };

    let timeout = AnalyzerConfig::default().timeout();
    let (driver, page) = match open_page(timeout).await {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    };

    let spinner = spinner(&format!("Searching {} for a contact page", url), quiet);
    let result = find_contact_page(
        page.as_ref(),
        url.as_str(),
        &ContactKeywords::default(),
        &options,
        &ReadinessConfig::immediate(),
        timeout,
    )
    .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    close_page(driver, page).await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            eprintln!("✗ Failed to load {}: {}", url, e);
            std::process::exit(1);
        }
    };

    match (&result.url, &result.error) {
        (Some(contact_url), _) => println!("{} {}", "✓ Contact page:".green().bold(), contact_url),
        (None, Some(reason)) => println!("{} {}", "✗".red().bold(), reason),
        _ => {}
    }

    if let Some(candidates) = &result.all_candidate_urls {
        println!("\nCandidates ({}):", candidates.len());
        for (idx, candidate) in candidates.iter().enumerate() {
            println!("  {:>2}. {}", idx + 1, candidate);
        }
    }

    if !result.found {
        std::process::exit(1);
    }
}

pub async fn handle_extract_form(sub_matches: &ArgMatches, quiet: bool) {
    let url = match sub_matches.get_one::<Url>("url") {
        Some(url) => url.clone(),
        None => {
            eprintln!("✗ --url is required");
            std::process::exit(1);
        }
    };

    let timeout = AnalyzerConfig::default().timeout();
    let readiness = ReadinessConfig::immediate();
    let (driver, page) = match open_page(timeout).await {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    };

    let spinner = spinner(&format!("Extracting the form on {}", url), quiet);
    let loaded = with_timeout(
        timeout,
        "loading page",
        page.navigate(url.as_str(), LoadState::DomContentLoaded, timeout),
    )
    .await;

    let form = match loaded {
        Ok(()) => {
            let dynamic = wait_for_dynamic_content(page.as_ref(), &readiness).await;
            if let Some(reason) = &dynamic.error {
                info!("Page content not fully rendered: {}", reason);
            }
            trigger_lazy_load(page.as_ref(), &readiness).await;
            Ok(extract_contact_form(page.as_ref()).await)
        }
        Err(e) => Err(e),
    };
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    close_page(driver, page).await;

    let form = match form {
        Ok(Some(form)) => form,
        Ok(None) => {
            eprintln!("✗ No form found on {}", url);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("✗ Failed to load {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let output = serde_json::json!({
        "url": url.as_str(),
        "form": form,
        "fillability": assess_fillability(&form),
        "fillabilityPercentage": fillability_percentage(&form),
        "fieldMapping": field_mapping_report(&form),
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("✗ Failed to serialize form: {}", e);
            std::process::exit(1);
        }
    }
}

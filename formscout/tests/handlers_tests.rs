use formscout::ReportFormat;
use formscout::handlers::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};
use url::Url;

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com");
    assert_eq!(result, Some("http://example.com".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_parse_company_line_with_name() {
    let company = parse_company_line("Acme Corp, https://acme.example").unwrap();
    assert_eq!(company.name, "Acme Corp");
    assert_eq!(company.url, "https://acme.example");
}

#[test]
fn test_parse_company_line_bare_url_uses_host() {
    let company = parse_company_line("www.widgets.example").unwrap();
    assert_eq!(company.name, "widgets.example");
    assert_eq!(company.url, "http://www.widgets.example");
}

#[test]
fn test_parse_company_line_empty_name_uses_host() {
    let company = parse_company_line(",https://shop.example/jp/").unwrap();
    assert_eq!(company.name, "shop.example");
}

#[test]
fn test_parse_company_line_skips_blank_and_comments() {
    assert!(parse_company_line("").is_none());
    assert!(parse_company_line("   ").is_none());
    assert!(parse_company_line("# customers from the fair").is_none());
}

#[test]
fn test_load_companies_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "# name,url")?;
    writeln!(temp_file, "Acme,https://acme.example")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "株式会社サンプル,https://sample.example.jp")?;
    writeln!(temp_file, "widgets.example")?;

    let path = PathBuf::from(temp_file.path());
    let companies = load_companies_from_file(&path)?;

    assert_eq!(companies.len(), 3);
    assert_eq!(companies[0].name, "Acme");
    assert_eq!(companies[1].name, "株式会社サンプル");
    assert_eq!(companies[1].url, "https://sample.example.jp");
    assert_eq!(companies[2].url, "http://widgets.example");

    Ok(())
}

#[test]
fn test_load_companies_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();
    writeln!(temp_file, "# nothing here").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_companies_from_file(&path);

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid companies"));
}

#[test]
fn test_load_companies_from_missing_file() {
    let result = load_companies_from_file(&PathBuf::from("/nonexistent/companies.csv"));
    assert!(result.unwrap_err().contains("Failed to read companies file"));
}

#[test]
fn test_load_companies_from_source_single_url() {
    let url = Url::parse("https://www.example.com").unwrap();
    let result = load_companies_from_source(Some(&url), None, None).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "example.com");
    assert_eq!(result[0].url, "https://www.example.com/");
}

#[test]
fn test_load_companies_from_source_named_url() {
    let url = Url::parse("https://example.com").unwrap();
    let name = "Example KK".to_string();
    let result = load_companies_from_source(Some(&url), Some(&name), None).unwrap();
    assert_eq!(result[0].name, "Example KK");
}

#[test]
fn test_load_companies_from_source_no_input() {
    let result = load_companies_from_source(None, None, None);
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .contains("Either --url or --companies-file must be provided")
    );
}

#[test]
fn test_write_report_into_new_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let output_dir = dir.path().join("reports");

    let path = write_report("{}", output_dir.to_str().unwrap(), ReportFormat::Json)?;

    assert!(path.starts_with(&output_dir));
    let file_name = path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.starts_with("contact-form-analysis-"));
    assert!(file_name.ends_with(".json"));
    assert_eq!(std::fs::read_to_string(&path)?, "{}");
    Ok(())
}

#[test]
fn test_write_report_fails_on_file_as_directory() -> Result<(), Box<dyn std::error::Error>> {
    let blocker = NamedTempFile::new()?;
    let result = write_report("x", blocker.path().to_str().unwrap(), ReportFormat::Csv);

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to write report"));
    Ok(())
}

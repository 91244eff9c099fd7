//! Finding a company's contact page from its homepage links.
//!
//! Collection is the only part that touches the driver. Filtering, scoring
//! and ranking are pure functions over the collected links, so a frozen
//! snapshot always ranks the same way.

use crate::driver::{LoadState, PageHandle, with_timeout};
use crate::error::{Result, ScanError};
use crate::poll::{Probe, poll_until};
use crate::readiness::{ReadinessConfig, settle};
use crate::result::ContactPageResult;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const NO_LINKS_FOUND: &str = "No links found on page";
pub const NO_CONTACT_LINK_FOUND: &str = "No contact page link found";
pub const NO_JAPANESE_CONTACT_PAGE: &str =
    "No Japanese contact page found. Only non-Japanese language pages are available.";

const BUILTIN_KEYWORDS: &[&str] = &[
    "contact",
    "contact us",
    "get in touch",
    "inquiry",
    "inquiries",
    "reach us",
    "support",
    "help",
    "お問い合わせ",
    "お問合せ",
    "問い合わせ",
    "問合せ",
    "コンタクト",
    "連絡",
    "ご相談",
];

const JAPANESE_PATH_SEGMENTS: &[&str] = &[
    "/ja/", "/jp/", "/jp-ja/", "/ja-jp/", "/ja_jp/", "/jp_ja/", "/japanese/",
];

static CONTACT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(contact|inquiry|support|toiawase|otoiawase)(/|$|-)").unwrap()
});

static OTHER_LANGUAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(de|fr|es|it|cn|kr|tw|en|us|uk|gb|zh)([-_/]|$)").unwrap()
});

/// Immutable keyword set: the built-in multilingual terms plus any extras for this run.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactKeywords {
    keywords: Vec<String>,
}

impl Default for ContactKeywords {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ContactKeywords {
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = BUILTIN_KEYWORDS.iter().map(|k| k.to_string()).collect();
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        Self { keywords }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// `haystack` must already be lowercased.
    fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// Preferred site language. Only `Japanese` changes scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    Auto,
    Japanese,
    Other(String),
}

impl Language {
    pub fn is_japanese(&self) -> bool {
        matches!(self, Language::Japanese)
    }
}

impl FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Ok(match code.as_str() {
            "" | "auto" => Language::Auto,
            "ja" | "jp-ja" => Language::Japanese,
            _ => Language::Other(code),
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Auto => f.write_str("auto"),
            Language::Japanese => f.write_str("ja"),
            Language::Other(code) => f.write_str(code),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocatorOptions {
    pub language: Language,
    /// Fill `all_candidate_urls` with every surviving candidate.
    pub return_all_matches: bool,
}

/// An anchor as seen on the homepage. `href` is already absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub href: String,
    pub text: String,
    pub aria_label: String,
}

impl LinkCandidate {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
            aria_label: String::new(),
        }
    }

    pub fn with_aria_label(mut self, aria_label: impl Into<String>) -> Self {
        self.aria_label = aria_label.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLink {
    pub link: LinkCandidate,
    pub score: i32,
}

/// Every `http(s)` anchor in the document, resolved against `base`, in document order.
///
/// `mailto:`, `tel:` and `javascript:` anchors are dropped on purpose: they
/// never lead to a page that can hold a form.
pub fn collect_links(html: &str, base: &Url) -> Vec<LinkCandidate> {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").unwrap();

    document
        .select(&anchor_selector)
        .filter_map(|anchor| {
            let raw = anchor.value().attr("href")?.trim();
            let resolved = base.join(raw).ok()?;
            if !matches!(resolved.scheme(), "http" | "https") {
                return None;
            }
            Some(LinkCandidate {
                href: resolved.to_string(),
                text: collapse_whitespace(&anchor.text().collect::<String>()),
                aria_label: anchor.value().attr("aria-label").unwrap_or("").trim().to_string(),
            })
        })
        .collect()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A link is a candidate when a keyword appears in its text, aria-label or
/// href, or when its path looks like a contact page.
pub fn is_contact_candidate(link: &LinkCandidate, keywords: &ContactKeywords) -> bool {
    let haystack = format!("{} {} {}", link.text, link.aria_label, link.href).to_lowercase();
    keywords.matches(&haystack) || CONTACT_PATH.is_match(&link.href)
}

pub fn is_japanese_path(href: &str) -> bool {
    let href = href.to_lowercase();
    JAPANESE_PATH_SEGMENTS.iter().any(|seg| href.contains(seg))
}

pub fn has_other_language_path(href: &str) -> bool {
    OTHER_LANGUAGE_PATH.is_match(href)
}

pub fn score_link(link: &LinkCandidate, language: &Language, base: &Url) -> i32 {
    let text = link.text.to_lowercase();
    let href = link.href.to_lowercase();
    let mut score = 0;

    if language.is_japanese() {
        if has_other_language_path(&href) {
            return -1000;
        }
        if is_japanese_path(&href) {
            score += 500;
        }
    }

    score += match text.as_str() {
        "お問い合わせ" | "問い合わせ" | "お問合せ" | "問合せ" => 200,
        "コンタクト" | "連絡" | "ご相談" => 150,
        "contact" | "contact us" => 100,
        "inquiry" | "inquiries" => 90,
        _ => 0,
    };

    if href.contains("/contact-us") {
        score += 80;
    }
    if href.contains("/contact") {
        score += 70;
    }
    if href.contains("/inquiry") || href.contains("/toiawase") {
        score += 70;
    }
    if href.contains("/support") {
        score += 60;
    }

    let segments = base
        .join(&link.href)
        .map(|u| u.path().split('/').count())
        .unwrap_or(1);
    score -= segments as i32 * 2;

    if link.aria_label.to_lowercase().contains("contact") {
        score += 20;
    }

    score
}

/// Filter to contact candidates and rank them best first.
///
/// The sort is stable, so equal scores keep document order. In Japanese
/// mode only positively scored links survive.
pub fn rank_candidates(
    links: &[LinkCandidate],
    keywords: &ContactKeywords,
    language: &Language,
    base: &Url,
) -> Vec<ScoredLink> {
    let mut scored: Vec<ScoredLink> = links
        .iter()
        .filter(|link| is_contact_candidate(link, keywords))
        .map(|link| ScoredLink {
            link: link.clone(),
            score: score_link(link, language, base),
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));

    for (i, s) in scored.iter().take(10).enumerate() {
        debug!(
            "{}. [score {}] {} (text: {:?}, ja: {}, other lang: {})",
            i + 1,
            s.score,
            s.link.href,
            s.link.text,
            is_japanese_path(&s.link.href),
            has_other_language_path(&s.link.href)
        );
    }

    if language.is_japanese() {
        scored.retain(|s| s.score > 0);
    }
    scored
}

/// Pick the contact page out of an already collected link list.
pub fn locate_in_links(
    links: &[LinkCandidate],
    keywords: &ContactKeywords,
    options: &LocatorOptions,
    base: &Url,
) -> ContactPageResult {
    if links.is_empty() {
        return ContactPageResult::with_error(NO_LINKS_FOUND);
    }
    if !links.iter().any(|l| is_contact_candidate(l, keywords)) {
        return ContactPageResult::with_error(NO_CONTACT_LINK_FOUND);
    }

    let ranked = rank_candidates(links, keywords, &options.language, base);
    debug!("{} contact link(s) out of {} total", ranked.len(), links.len());

    let urls: Vec<String> = ranked
        .iter()
        .filter_map(|s| base.join(&s.link.href).ok().map(|u| u.to_string()))
        .collect();

    match urls.first() {
        Some(best) => {
            let best = best.clone();
            ContactPageResult::found(best, options.return_all_matches.then_some(urls))
        }
        None if options.language.is_japanese() => {
            ContactPageResult::with_error(NO_JAPANESE_CONTACT_PAGE)
        }
        None => ContactPageResult::with_error(NO_CONTACT_LINK_FOUND),
    }
}

/// Load `homepage_url` and find its contact page.
///
/// Failing to load the homepage is an `Err`; failing to find a contact
/// link is an `Ok` with `found: false`.
pub async fn find_contact_page(
    page: &dyn PageHandle,
    homepage_url: &str,
    keywords: &ContactKeywords,
    options: &LocatorOptions,
    readiness: &ReadinessConfig,
    timeout: Duration,
) -> Result<ContactPageResult> {
    load_homepage(page, homepage_url, readiness, timeout).await?;
    locate_contact_page(page, homepage_url, keywords, options, readiness).await
}

/// Navigate to the homepage and give its navigation time to render.
pub async fn load_homepage(
    page: &dyn PageHandle,
    homepage_url: &str,
    readiness: &ReadinessConfig,
    timeout: Duration,
) -> Result<()> {
    with_timeout(
        timeout,
        "loading homepage",
        page.navigate(homepage_url, LoadState::DomContentLoaded, timeout),
    )
    .await?;

    settle(page, readiness).await;

    if let Err(e) = with_timeout(
        readiness.element_timeout,
        "waiting for navigation elements",
        page.wait_for_selector("nav, header, a", readiness.element_timeout),
    )
    .await
    {
        debug!("No navigation elements on {}: {}", homepage_url, e);
    }
    Ok(())
}

/// Rank the links of the already loaded homepage.
pub async fn locate_contact_page(
    page: &dyn PageHandle,
    homepage_url: &str,
    keywords: &ContactKeywords,
    options: &LocatorOptions,
    readiness: &ReadinessConfig,
) -> Result<ContactPageResult> {
    let current = page.url().await?;
    let base = Url::parse(&current)
        .or_else(|_| Url::parse(homepage_url))
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", homepage_url, e)))?;

    let outcome = poll_until(readiness.link_poll, |attempt| {
        let base = &base;
        async move {
            match page.content().await {
                Ok(html) => {
                    let links = collect_links(&html, base);
                    if links.is_empty() {
                        debug!("No links on attempt {}", attempt);
                        Probe::Pending(Some(Ok(links)))
                    } else {
                        Probe::Ready(Ok(links))
                    }
                }
                Err(e) => Probe::Ready(Err(e)),
            }
        }
    })
    .await;

    let links = outcome.into_value().transpose()?.unwrap_or_default();
    let result = locate_in_links(&links, keywords, options, &base);

    match (&result.url, &result.error) {
        (Some(url), _) => info!("Contact page for {}: {}", homepage_url, url),
        (None, Some(reason)) => info!("No contact page for {}: {}", homepage_url, reason),
        _ => {}
    }
    Ok(result)
}

/// Whether the document contains at least one `<form>`.
pub fn has_contact_form(html: &str) -> bool {
    let form_selector = Selector::parse("form").unwrap();
    Html::parse_document(html).select(&form_selector).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixturePage;

    fn base() -> Url {
        Url::parse("https://example.co.jp/").unwrap()
    }

    fn ja() -> LocatorOptions {
        LocatorOptions {
            language: Language::Japanese,
            return_all_matches: true,
        }
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("ja".parse::<Language>().unwrap(), Language::Japanese);
        assert_eq!("JP-JA".parse::<Language>().unwrap(), Language::Japanese);
        assert_eq!("".parse::<Language>().unwrap(), Language::Auto);
        assert_eq!("auto".parse::<Language>().unwrap(), Language::Auto);
        assert_eq!("en".parse::<Language>().unwrap(), Language::Other("en".to_string()));
    }

    #[test]
    fn test_keywords_merge_extras_once() {
        let keywords = ContactKeywords::new(["Kontakt", "contact", "  "]);
        assert_eq!(keywords.len(), BUILTIN_KEYWORDS.len() + 1);
        assert!(keywords.iter().any(|k| k == "kontakt"));
        assert_eq!(ContactKeywords::default().len(), BUILTIN_KEYWORDS.len());
    }

    #[test]
    fn test_collect_links_resolves_and_skips_non_http() {
        let html = r#"
            <nav>
              <a href="/ja/contact/">お問い合わせ</a>
              <a href="mailto:info@example.co.jp">contact</a>
              <a href="javascript:void(0)">menu</a>
              <a href="tel:+81-3-0000-0000">Contact by phone</a>
              <a aria-label="Contact us" href="https://example.co.jp/form">
                 <span>Get   in</span> touch
              </a>
              <a>no href</a>
            </nav>"#;
        let links = collect_links(html, &base());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "https://example.co.jp/ja/contact/");
        assert_eq!(links[1].text, "Get in touch");
        assert_eq!(links[1].aria_label, "Contact us");
    }

    #[test]
    fn test_mail_and_phone_only_contact_is_not_found() {
        let html = r#"<footer>
              <a href="mailto:info@example.co.jp">お問い合わせ</a>
              <a href="tel:0120-000-000">Contact</a>
            </footer>"#;
        assert!(collect_links(html, &base()).is_empty());
    }

    #[test]
    fn test_url_pattern_without_keyword_is_candidate() {
        let keywords = ContactKeywords::default();
        let link = LinkCandidate::new("https://example.co.jp/otoiawase/", "→");
        assert!(is_contact_candidate(&link, &keywords));
        let link = LinkCandidate::new("https://example.co.jp/about/", "会社概要");
        assert!(!is_contact_candidate(&link, &keywords));
    }

    #[test]
    fn test_score_components() {
        let b = base();
        let auto = Language::Auto;

        // text 200 + /contact 70 - depth (/ja/contact/ -> 4 segments) * 2
        let jp = LinkCandidate::new("https://example.co.jp/ja/contact/", "お問い合わせ");
        assert_eq!(score_link(&jp, &auto, &b), 200 + 70 - 8);
        assert_eq!(score_link(&jp, &Language::Japanese, &b), 500 + 200 + 70 - 8);

        // /contact-us also contains /contact
        let us = LinkCandidate::new("https://example.co.jp/contact-us", "Contact Us")
            .with_aria_label("Contact");
        assert_eq!(score_link(&us, &auto, &b), 100 + 80 + 70 - 4 + 20);

        let en = LinkCandidate::new("https://example.co.jp/en/contact/", "お問い合わせ");
        assert_eq!(score_link(&en, &Language::Japanese, &b), -1000);
    }

    #[test]
    fn test_japanese_homepage_scenario() {
        let links = vec![
            LinkCandidate::new("https://example.co.jp/ja/contact", "お問い合わせ"),
            LinkCandidate::new("https://example.co.jp/en/contact", "Contact"),
        ];
        let result = locate_in_links(&links, &ContactKeywords::default(), &ja(), &base());
        assert!(result.found);
        assert_eq!(result.url.as_deref(), Some("https://example.co.jp/ja/contact"));
        assert_eq!(
            result.all_candidate_urls,
            Some(vec!["https://example.co.jp/ja/contact".to_string()])
        );
    }

    #[test]
    fn test_japanese_mode_with_only_foreign_pages() {
        let links = vec![
            LinkCandidate::new("https://example.co.jp/en/contact", "Contact"),
            LinkCandidate::new("https://example.co.jp/us-en/support/", "Support"),
            LinkCandidate::new("https://example.co.jp/zh/inquiry", "Inquiry"),
        ];
        let result = locate_in_links(&links, &ContactKeywords::default(), &ja(), &base());
        assert!(!result.found);
        assert_eq!(result.error.as_deref(), Some(NO_JAPANESE_CONTACT_PAGE));
    }

    #[test]
    fn test_japanese_exclusivity_over_mixed_sets() {
        let hrefs = [
            "/en/contact", "/ja/contact", "/contact", "/de/kontakt/contact", "/jp/inquiry/",
            "/fr-fr/contact", "/support", "/uk/help", "/zh_cn/contact", "/toiawase",
        ];
        let keywords = ContactKeywords::default();
        for start in 0..hrefs.len() {
            let links: Vec<LinkCandidate> = hrefs
                .iter()
                .cycle()
                .skip(start)
                .take(4)
                .map(|h| LinkCandidate::new(base().join(h).unwrap().to_string(), "contact"))
                .collect();
            let result = locate_in_links(&links, &keywords, &ja(), &base());
            let all_foreign = links.iter().all(|l| has_other_language_path(&l.href));
            if all_foreign {
                assert!(!result.found);
            }
            if let Some(url) = result.url {
                assert!(!has_other_language_path(&url), "{} leaked through", url);
            }
        }
    }

    #[test]
    fn test_ranking_is_deterministic_and_stable() {
        let links = vec![
            LinkCandidate::new("https://example.co.jp/contact/a", "contact"),
            LinkCandidate::new("https://example.co.jp/contact/b", "contact"),
            LinkCandidate::new("https://example.co.jp/about", "About"),
        ];
        let keywords = ContactKeywords::default();
        let first = rank_candidates(&links, &keywords, &Language::Auto, &base());
        let second = rank_candidates(&links, &keywords, &Language::Auto, &base());
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].score, first[1].score);
        assert!(first[0].link.href.ends_with("/a"));
    }

    #[test]
    fn test_discovery_failures() {
        let keywords = ContactKeywords::default();
        let opts = LocatorOptions::default();
        assert_eq!(
            locate_in_links(&[], &keywords, &opts, &base()).error.as_deref(),
            Some(NO_LINKS_FOUND)
        );
        let links = vec![LinkCandidate::new("https://example.co.jp/news", "News")];
        assert_eq!(
            locate_in_links(&links, &keywords, &opts, &base()).error.as_deref(),
            Some(NO_CONTACT_LINK_FOUND)
        );
    }

    #[test]
    fn test_extra_keywords_widen_candidates() {
        let links = vec![LinkCandidate::new("https://example.de/kontaktformular", "Kontakt")];
        let opts = LocatorOptions::default();
        assert!(!locate_in_links(&links, &ContactKeywords::default(), &opts, &base()).found);
        assert!(locate_in_links(&links, &ContactKeywords::new(["kontakt"]), &opts, &base()).found);
    }

    #[tokio::test]
    async fn test_find_contact_page_on_fixture() {
        let page = FixturePage::new("https://example.co.jp/", "")
            .route(
                "https://example.co.jp/",
                r#"<header><a href="/en/contact">Contact</a><a href="/ja/contact">お問い合わせ</a></header>"#,
            );
        let result = find_contact_page(
            &page,
            "https://example.co.jp/",
            &ContactKeywords::default(),
            &ja(),
            &ReadinessConfig::immediate(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(result.url.as_deref(), Some("https://example.co.jp/ja/contact"));
    }

    #[tokio::test]
    async fn test_find_contact_page_retries_empty_homepage() {
        let page = FixturePage::with_snapshots(
            "https://example.co.jp/",
            vec![
                "<div id='root'></div>".to_string(),
                "<div id='root'></div>".to_string(),
                "<div id='root'><a href='/contact'>Contact</a></div>".to_string(),
            ],
        );
        let readiness = ReadinessConfig {
            link_poll: crate::poll::PollPolicy::new(3, Duration::ZERO),
            ..ReadinessConfig::immediate()
        };
        let result = find_contact_page(
            &page,
            "https://example.co.jp/",
            &ContactKeywords::default(),
            &LocatorOptions::default(),
            &readiness,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(result.found);
    }

    #[tokio::test]
    async fn test_find_contact_page_propagates_navigation_failure() {
        let page = FixturePage::new("https://example.co.jp/", "");
        let err = find_contact_page(
            &page,
            "https://unreachable.example/",
            &ContactKeywords::default(),
            &LocatorOptions::default(),
            &ReadinessConfig::immediate(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_has_contact_form() {
        assert!(has_contact_form("<main><form><input name='q'></form></main>"));
        assert!(!has_contact_form("<main><input name='q'></main>"));
    }
}

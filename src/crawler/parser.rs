//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags, canonical links and a raw `href=` scan)
//! - Page title

use crate::sitemap::is_feed_like;
use crate::url::{is_fetchable, is_valid_internal_url, CanonicalUrl, Canonicalizer, Origin};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Raw `href=` attributes, quoted or not
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>`]+))"#)
        .expect("hardcoded regex pattern is valid")
});

/// Extensions of resources that are never crawled as pages
const NON_PAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "ico", "bmp", "tif", "tiff", "css",
    "js", "mjs", "json", "xml", "rss", "atom", "pdf", "doc", "docx", "xls", "xlsx", "ppt",
    "pptx", "zip", "rar", "7z", "gz", "tar", "mp3", "mp4", "m4a", "wav", "ogg", "webm", "mov",
    "avi", "woff", "woff2", "ttf", "otf", "eot", "txt", "csv", "exe", "dmg",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title>, else the first <h1>)
    pub title: Option<String>,

    /// Crawlable same-origin links, deduplicated by page identity
    pub links: Vec<CanonicalUrl>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// Two independent passes run and their results are unioned:
///
/// 1. Structured: `<a href>` and `<link rel="canonical" href>`
/// 2. Raw text: every `href=` attribute value the regex can see, which
///    catches links inside malformed markup
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` links, fragment-only hrefs
/// - Off-origin URLs and URLs with the host embedded in the path
/// - Non-page resources (images, media, archives, css, js, pdf, feeds)
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the page was fetched from
/// * `canonicalizer` - Resolves raw hrefs
/// * `origin` - The crawl origin
pub fn parse_html(
    html: &str,
    base_url: &Url,
    canonicalizer: &Canonicalizer,
    origin: &Origin,
) -> ParsedPage {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let mut hrefs = structured_hrefs(&document);
    hrefs.extend(raw_hrefs(html));

    let mut seen = HashSet::new();
    let links = hrefs
        .iter()
        .filter_map(|href| resolve_link(href, base_url, canonicalizer, origin))
        .filter(|url| seen.insert(url.identity()))
        .collect();

    ParsedPage { title, links }
}

/// Extracts the page title, falling back to the first `<h1>`
pub fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title").or_else(|| first_text(document, "h1"))
}

/// Title derived from the URL path, used when the document has none
pub fn title_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut s| s.rfind(|seg| !seg.is_empty()))
        .unwrap_or_default();

    if segment.is_empty() {
        return url.host_str().unwrap_or("Home").to_string();
    }

    let stem = segment
        .rsplit_once('.')
        .map_or(segment, |(stem, _)| stem)
        .replace(['-', '_'], " ");

    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => segment.to_string(),
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
}

fn structured_hrefs(document: &Html) -> Vec<String> {
    let mut hrefs = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                hrefs.push(href.to_string());
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                hrefs.push(href.to_string());
            }
        }
    }

    hrefs
}

fn raw_hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or(caps.get(2)).or(caps.get(3)))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .collect()
}

/// Resolves a link href and keeps it only if it is a crawlable page
fn resolve_link(
    href: &str,
    base_url: &Url,
    canonicalizer: &Canonicalizer,
    origin: &Origin,
) -> Option<CanonicalUrl> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let url = canonicalizer.resolve(href, base_url)?;

    if !is_valid_internal_url(url.as_url(), origin) || !is_fetchable(url.as_url()) {
        return None;
    }

    if !is_page_candidate(url.as_url()) {
        return None;
    }

    Some(url)
}

/// True unless the URL points at a known non-page resource
pub fn is_page_candidate(url: &Url) -> bool {
    if is_feed_like(url.as_str()) {
        return false;
    }

    let last = url.path().rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((_, ext)) => !NON_PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Heuristics, HeuristicsConfig};

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::new(Heuristics::compile(&HeuristicsConfig::default()).unwrap())
    }

    fn parse(html: &str, base: &str) -> ParsedPage {
        let base = Url::parse(base).unwrap();
        let origin = Origin::of(&base).unwrap();
        parse_html(html, &base, &canonicalizer(), &origin)
    }

    fn link_strs(page: &ParsedPage) -> Vec<&str> {
        page.links.iter().map(|u| u.as_str()).collect()
    }

    #[test]
    fn test_extract_title() {
        let page = parse(
            "<html><head><title>  My   Page </title></head><body><h1>H</h1></body></html>",
            "https://example.com/",
        );
        assert_eq!(page.title, Some("My Page".to_string()));
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let page = parse("<body><h1>Welcome <b>home</b></h1></body>", "https://example.com/");
        assert_eq!(page.title, Some("Welcome home".to_string()));
    }

    #[test]
    fn test_title_from_url() {
        let url = Url::parse("https://example.com/blog/my-first_post.html").unwrap();
        assert_eq!(title_from_url(&url), "My first post");

        let url = Url::parse("https://example.com/team/").unwrap();
        assert_eq!(title_from_url(&url), "Team");

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(title_from_url(&url), "example.com");
    }

    #[test]
    fn test_extract_links() {
        let html = r##"
            <a href="/about">About</a>
            <a href="contact">Contact</a>
            <a href="https://other.com/x">Other</a>
            <a href="mailto:a@example.com">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="#top">Top</a>
            <a href="/report.pdf">PDF</a>
            <a href="/photo.JPG">Photo</a>
            <link rel="canonical" href="https://example.com/blog/">
        "##;

        let page = parse(html, "https://example.com/blog/");
        assert_eq!(
            link_strs(&page),
            vec![
                "https://example.com/about",
                "https://example.com/blog/contact",
                "https://example.com/blog/",
            ]
        );
    }

    #[test]
    fn test_raw_scan_catches_malformed_markup() {
        let html = r#"<div><a class="x" href='/hidden' <span>broken</a>
            <script>var t = '<a href="/from-script">';</script>
            <a href=/unquoted>u</a>"#;

        let page = parse(html, "https://example.com/");
        let links = link_strs(&page);
        assert!(links.contains(&"https://example.com/hidden"));
        assert!(links.contains(&"https://example.com/from-script"));
        assert!(links.contains(&"https://example.com/unquoted"));
    }

    #[test]
    fn test_links_deduplicated_by_identity() {
        let html = r#"<a href="/about">1</a><a href="/about/">2</a><a href="/about#team">3</a>"#;
        let page = parse(html, "https://example.com/");
        assert_eq!(link_strs(&page), vec!["https://example.com/about"]);
    }

    #[test]
    fn test_www_variant_is_internal() {
        let html = r#"<a href="https://www.example.com/team">Team</a>"#;
        let page = parse(html, "https://example.com/");
        assert_eq!(link_strs(&page), vec!["https://www.example.com/team"]);
    }

    #[test]
    fn test_is_page_candidate() {
        let ok = |s: &str| is_page_candidate(&Url::parse(s).unwrap());
        assert!(ok("https://example.com/about"));
        assert!(ok("https://example.com/index.php"));
        assert!(ok("https://example.com/page.html"));
        assert!(!ok("https://example.com/a.css"));
        assert!(!ok("https://example.com/feed/"));
        assert!(!ok("https://example.com/archive.zip"));
    }
}

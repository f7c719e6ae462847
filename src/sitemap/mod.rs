//! Sitemap reader
//!
//! Discovery is advisory: every fetch or parse failure is swallowed and
//! simply contributes no URLs.

mod parser;

pub use parser::{is_feed_like, parse_sitemap, SitemapDocument};

use crate::transport::Transport;
use crate::url::{is_valid_internal_url, CanonicalUrl, Canonicalizer, Origin};
use std::collections::HashSet;
use url::Url;

/// Conventional sitemap locations, tried in order
pub const SITEMAP_CANDIDATES: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/wp-sitemap.xml",
    "/sitemap-index.xml",
    "/post-sitemap.xml",
    "/page-sitemap.xml",
];

/// Child sitemaps followed per level of an index tree
pub const MAX_CHILD_SITEMAPS: usize = 100;

/// Index nesting followed below the root sitemap
const MAX_SITEMAP_DEPTH: usize = 4;

/// Finds the page URLs advertised by the site's sitemaps
///
/// The candidates in [`SITEMAP_CANDIDATES`] are tried in order against the
/// start URL's scheme and host; the first one that yields any page wins.
/// Results are same-origin, canonical, free of feed URLs and deduplicated by
/// page identity, in document order.
pub async fn discover(
    transport: &dyn Transport,
    canonicalizer: &Canonicalizer,
    start: &CanonicalUrl,
) -> Vec<CanonicalUrl> {
    let Some(origin) = Origin::of(start.as_url()) else {
        return Vec::new();
    };

    for candidate in SITEMAP_CANDIDATES {
        let Ok(root) = start.as_url().join(candidate) else {
            continue;
        };

        let urls = expand(transport, canonicalizer, &origin, root).await;
        if !urls.is_empty() {
            tracing::info!("Sitemap {} yielded {} URLs", candidate, urls.len());
            return urls;
        }
        tracing::debug!("Sitemap candidate {} yielded nothing", candidate);
    }

    Vec::new()
}

/// Breadth-first expansion of one sitemap tree
async fn expand(
    transport: &dyn Transport,
    canonicalizer: &Canonicalizer,
    origin: &Origin,
    root: Url,
) -> Vec<CanonicalUrl> {
    let mut fetched: HashSet<String> = HashSet::new();
    let mut seen_pages: HashSet<String> = HashSet::new();
    let mut pages = Vec::new();
    let mut level = vec![root];

    for depth in 0..=MAX_SITEMAP_DEPTH {
        if level.is_empty() {
            break;
        }

        let mut next = Vec::new();
        for sitemap_url in level {
            if !fetched.insert(sitemap_url.to_string()) {
                continue;
            }

            let Some(doc) = fetch_document(transport, &sitemap_url).await else {
                continue;
            };

            for loc in &doc.pages {
                if is_feed_like(loc) {
                    continue;
                }
                let Some(url) = canonicalizer.resolve(loc, &sitemap_url) else {
                    continue;
                };
                if !is_valid_internal_url(url.as_url(), origin) {
                    continue;
                }
                if seen_pages.insert(url.identity()) {
                    pages.push(url.without_suffix());
                }
            }

            for loc in &doc.children {
                if next.len() >= MAX_CHILD_SITEMAPS {
                    tracing::debug!(
                        "Sitemap level {} capped at {} children",
                        depth + 1,
                        MAX_CHILD_SITEMAPS
                    );
                    break;
                }
                if let Ok(child) = sitemap_url.join(loc) {
                    if !fetched.contains(child.as_str()) && origin.contains(&child) {
                        next.push(child);
                    }
                }
            }
        }

        level = next;
    }

    pages
}

async fn fetch_document(transport: &dyn Transport, url: &Url) -> Option<SitemapDocument> {
    match transport.fetch_text(url.as_str()).await {
        Ok(response) if response.is_success() => Some(parse_sitemap(&response.body)),
        Ok(response) => {
            tracing::trace!("Sitemap {} returned {}", url, response.status);
            None
        }
        Err(e) => {
            tracing::trace!("Sitemap {} failed: {}", url, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Heuristics, HeuristicsConfig};
    use crate::transport::{BytesResponse, TextResponse, TransportError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies and records every request
    struct MapTransport {
        bodies: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MapTransport {
        fn new(entries: &[(&str, String)]) -> Self {
            Self {
                bodies: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MapTransport {
        async fn fetch_text(&self, url: &str) -> Result<TextResponse, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            let (status, body) = match self.bodies.get(url) {
                Some(body) => (200, body.clone()),
                None => (404, String::new()),
            };
            Ok(TextResponse {
                body,
                status,
                content_type: Some("application/xml".to_string()),
                final_url: url.to_string(),
            })
        }

        async fn fetch_bytes(&self, url: &str) -> Result<BytesResponse, TransportError> {
            Err(TransportError::Timeout(url.to_string()))
        }
    }

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::new(Heuristics::compile(&HeuristicsConfig::default()).unwrap())
    }

    fn urlset(locs: &[&str]) -> String {
        let entries: String = locs
            .iter()
            .map(|l| format!("<url><loc>{}</loc></url>", l))
            .collect();
        format!("<urlset>{}</urlset>", entries)
    }

    #[tokio::test]
    async fn test_first_candidate_with_urls_wins() {
        let transport = MapTransport::new(&[
            (
                "https://example.com/wp-sitemap.xml",
                urlset(&["https://example.com/a", "https://example.com/b"]),
            ),
            (
                "https://example.com/page-sitemap.xml",
                urlset(&["https://example.com/never"]),
            ),
        ]);
        let start = CanonicalUrl::parse("https://example.com/").unwrap();

        let urls = discover(&transport, &canonicalizer(), &start).await;
        let urls: Vec<_> = urls.iter().map(|u| u.as_str()).collect();

        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
        let requests = transport.requests.lock().unwrap();
        assert!(!requests.iter().any(|r| r.ends_with("page-sitemap.xml")));
    }

    #[tokio::test]
    async fn test_filters_foreign_feeds_and_duplicates() {
        let transport = MapTransport::new(&[(
            "https://example.com/sitemap.xml",
            urlset(&[
                "https://example.com/a",
                "https://www.example.com/b",
                "https://example.com/a/",
                "https://example.com/a#top",
                "https://other.com/c",
                "https://example.com/feed/",
                "https://example.com/example.com/broken",
            ]),
        )]);
        let start = CanonicalUrl::parse("https://example.com/").unwrap();

        let urls = discover(&transport, &canonicalizer(), &start).await;
        let urls: Vec<_> = urls.iter().map(|u| u.as_str()).collect();

        assert_eq!(
            urls,
            vec!["https://example.com/a", "https://www.example.com/b"]
        );
    }

    #[tokio::test]
    async fn test_self_referential_index_terminates() {
        let index = "<sitemapindex>\
            <sitemap><loc>https://example.com/sitemap.xml</loc></sitemap>\
            <sitemap><loc>https://example.com/more.xml</loc></sitemap>\
            </sitemapindex>"
            .to_string();
        let more = "<sitemapindex>\
            <sitemap><loc>https://example.com/sitemap.xml</loc></sitemap>\
            <sitemap><loc>https://example.com/more.xml</loc></sitemap>\
            </sitemapindex><loc>https://example.com/leaf</loc>"
            .to_string();
        let transport = MapTransport::new(&[
            ("https://example.com/sitemap.xml", index),
            ("https://example.com/more.xml", more),
        ]);
        let start = CanonicalUrl::parse("https://example.com/").unwrap();

        let urls = discover(&transport, &canonicalizer(), &start).await;
        assert_eq!(urls.len(), 1);

        let requests = transport.requests.lock().unwrap();
        let more_fetches = requests.iter().filter(|r| r.ends_with("/more.xml")).count();
        assert_eq!(more_fetches, 1);
    }

    #[tokio::test]
    async fn test_children_capped_per_level() {
        let children: String = (0..150)
            .map(|i| format!("<sitemap><loc>https://example.com/s{}.xml</loc></sitemap>", i))
            .collect();
        let mut entries = vec![(
            "https://example.com/sitemap.xml",
            format!("<sitemapindex>{}</sitemapindex>", children),
        )];
        let names: Vec<String> = (0..150).map(|i| format!("https://example.com/s{}.xml", i)).collect();
        let pages: Vec<String> = (0..150).map(|i| format!("https://example.com/p{}", i)).collect();
        for (name, page) in names.iter().zip(&pages) {
            entries.push((name.as_str(), urlset(&[page.as_str()])));
        }
        let transport = MapTransport::new(&entries);
        let start = CanonicalUrl::parse("https://example.com/").unwrap();

        let urls = discover(&transport, &canonicalizer(), &start).await;
        assert_eq!(urls.len(), MAX_CHILD_SITEMAPS);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let transport = MapTransport::new(&[]);
        let start = CanonicalUrl::parse("https://example.com/").unwrap();

        assert!(discover(&transport, &canonicalizer(), &start).await.is_empty());
        assert_eq!(
            transport.requests.lock().unwrap().len(),
            SITEMAP_CANDIDATES.len()
        );
    }
}

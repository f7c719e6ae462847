//! Tag-agnostic sitemap parsing

use quick_xml::events::Event;
use quick_xml::Reader;

/// Locations found in one sitemap document
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Page locations: `<url><loc>` entries and bare `<loc>` elements
    pub pages: Vec<String>,
    /// Child sitemap locations: `<sitemap><loc>` entries of an index
    pub children: Vec<String>,
}

impl SitemapDocument {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.children.is_empty()
    }
}

/// Parses a sitemap or sitemap index
///
/// Namespaces are ignored and both `urlset` and `sitemapindex` roots are
/// accepted, as is any stray `<loc>` element. Parsing stops at the first XML
/// error and returns whatever was collected up to that point.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = SitemapDocument::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if name == "loc" {
                    text.clear();
                }
                stack.push(name);
            }
            Ok(Event::Text(e)) => {
                if stack.last().is_some_and(|n| n == "loc") {
                    match e.unescape() {
                        Ok(t) => text.push_str(&t),
                        Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if stack.last().is_some_and(|n| n == "loc") {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                if name != "loc" {
                    continue;
                }

                let loc = text.trim().to_string();
                text.clear();
                if loc.is_empty() {
                    continue;
                }

                if stack.last().is_some_and(|parent| parent == "sitemap") {
                    doc.children.push(loc);
                } else {
                    doc.pages.push(loc);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Sitemap XML error at {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
    }

    doc
}

/// True for feed-like URLs (RSS, Atom, WordPress `/feed/`) that are not pages
pub fn is_feed_like(url: &str) -> bool {
    let lower = url.to_lowercase();
    let (path, query) = match lower.split_once('?') {
        Some((p, q)) => (p, q),
        None => (lower.as_str(), ""),
    };
    let path = path.trim_end_matches('/');

    const SUFFIXES: &[&str] = &[
        "/feed", "/rss", "/atom", ".rss", ".atom", "/feed.xml", "/rss.xml", "/atom.xml",
        "/rss2", "/feed.json",
    ];

    SUFFIXES.iter().any(|s| path.ends_with(s))
        || path.contains("/feed/")
        || query.split('&').any(|kv| kv.starts_with("feed="))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/</loc><priority>1.0</priority></url>
          <url><loc> https://example.com/about </loc></url>
        </urlset>"#;

        let doc = parse_sitemap(xml);
        assert_eq!(
            doc.pages,
            vec!["https://example.com/", "https://example.com/about"]
        );
        assert!(doc.children.is_empty());
    }

    #[test]
    fn test_parse_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>https://example.com/post-sitemap.xml</loc></sitemap>
          <sitemap><loc>https://example.com/page-sitemap.xml</loc></sitemap>
        </sitemapindex>"#;

        let doc = parse_sitemap(xml);
        assert!(doc.pages.is_empty());
        assert_eq!(doc.children.len(), 2);
    }

    #[test]
    fn test_bare_loc_and_namespaces() {
        let xml = r#"<root xmlns:s="http://www.sitemaps.org/schemas/sitemap/0.9">
          <s:loc>https://example.com/a</s:loc>
          <loc><![CDATA[https://example.com/b?x=1&y=2]]></loc>
          <loc>https://example.com/c?x=1&amp;y=2</loc>
        </root>"#;

        let doc = parse_sitemap(xml);
        assert_eq!(
            doc.pages,
            vec![
                "https://example.com/a",
                "https://example.com/b?x=1&y=2",
                "https://example.com/c?x=1&y=2",
            ]
        );
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert!(parse_sitemap("<html><body>Not found</body></html>").is_empty());
        assert!(parse_sitemap("").is_empty());
    }

    #[test]
    fn test_feed_detection() {
        assert!(is_feed_like("https://example.com/feed/"));
        assert!(is_feed_like("https://example.com/blog/feed"));
        assert!(is_feed_like("https://example.com/news.rss"));
        assert!(is_feed_like("https://example.com/?feed=rss2"));
        assert!(is_feed_like("https://example.com/comments/feed/atom/"));
        assert!(!is_feed_like("https://example.com/feedback"));
        assert!(!is_feed_like("https://example.com/about"));
    }
}

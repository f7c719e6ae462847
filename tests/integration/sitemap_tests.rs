//! Sitemap discovery against a mock site

use crate::{html_page, test_canonicalizer, test_transport};
use kagami::crawler::{CrawlEngine, HttpBackend};
use kagami::output::JobLog;
use kagami::sitemap;
use kagami::{CanonicalUrl, Origin};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/xml"))
        .mount(server)
        .await;
}

fn urlset(locs: &[String]) -> String {
    let entries: String = locs
        .iter()
        .map(|loc| format!("<url><loc>{loc}</loc></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
    )
}

#[tokio::test]
async fn test_sitemap_index_expands_children() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{base}/sitemap-pages.xml</loc></sitemap>
  <sitemap><loc>{base}/sitemap-posts.xml</loc></sitemap>
</sitemapindex>"#
        ),
    )
    .await;
    mount_xml(
        &server,
        "/sitemap-pages.xml",
        urlset(&[
            format!("{base}/"),
            format!("{base}/about"),
            "https://elsewhere.test/offsite".to_string(),
        ]),
    )
    .await;
    mount_xml(
        &server,
        "/sitemap-posts.xml",
        urlset(&[
            format!("{base}/posts/one"),
            format!("{base}/posts/two"),
            format!("{base}/about/"),
        ]),
    )
    .await;

    let start = CanonicalUrl::parse(&format!("{base}/")).unwrap();
    let urls = sitemap::discover(test_transport().as_ref(), &test_canonicalizer(), &start).await;

    let paths: Vec<&str> = urls.iter().map(|u| u.as_url().path()).collect();
    assert_eq!(paths, vec!["/", "/about", "/posts/one", "/posts/two"]);
}

#[tokio::test]
async fn test_later_candidate_used_when_first_missing() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/wp-sitemap.xml",
        urlset(&[format!("{base}/hello-world")]),
    )
    .await;

    let start = CanonicalUrl::parse(&format!("{base}/")).unwrap();
    let urls = sitemap::discover(test_transport().as_ref(), &test_canonicalizer(), &start).await;

    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].as_url().path(), "/hello-world");
}

#[tokio::test]
async fn test_no_sitemap_yields_nothing() {
    let server = MockServer::start().await;

    let start = CanonicalUrl::parse(&format!("{}/", server.uri())).unwrap();
    let urls = sitemap::discover(test_transport().as_ref(), &test_canonicalizer(), &start).await;

    assert!(urls.is_empty());
}

#[tokio::test]
async fn test_sitemap_urls_seed_unlinked_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/sitemap.xml",
        urlset(&[format!("{base}/hidden")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("Home", "")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("Hidden", "")))
        .expect(1)
        .mount(&server)
        .await;

    let canonicalizer = test_canonicalizer();
    let transport = test_transport();
    let start = CanonicalUrl::parse(&format!("{base}/")).unwrap();
    let sitemap_urls = sitemap::discover(transport.as_ref(), &canonicalizer, &start).await;

    let mut engine = CrawlEngine::new(
        Origin::of(start.as_url()).unwrap(),
        &canonicalizer,
        Box::new(HttpBackend::new(transport)),
        JobLog::new(),
    );
    engine.seed(&start, sitemap_urls);
    let output = engine.run().await.expect("Crawl should succeed");

    assert_eq!(output.report.sitemap_urls, 1);
    let titles: Vec<&str> = output.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "Hidden"]);
}

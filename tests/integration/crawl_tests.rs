//! Crawl engine against a mock site

use crate::{html_page, test_canonicalizer, test_transport};
use kagami::crawler::{CrawlEngine, CrawlOutput, HttpBackend};
use kagami::output::JobLog;
use kagami::{CanonicalUrl, KagamiError, Origin, PageState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, route: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .expect(expected)
        .mount(server)
        .await;
}

async fn crawl(server: &MockServer, max_pages: usize) -> Result<CrawlOutput, KagamiError> {
    let canonicalizer = test_canonicalizer();
    let start = CanonicalUrl::parse(&format!("{}/", server.uri())).unwrap();
    let origin = Origin::of(start.as_url()).unwrap();

    let mut engine = CrawlEngine::new(
        origin,
        &canonicalizer,
        Box::new(HttpBackend::new(test_transport())),
        JobLog::new(),
    )
    .with_max_pages(max_pages);
    engine.seed(&start, Vec::new());
    engine.run().await
}

#[tokio::test]
async fn test_full_crawl_single_origin() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            &format!(
                r#"<a href="/about">About</a>
                <a href="{base}/blog/">Blog</a>
                <a href="https://elsewhere.test/page">Elsewhere</a>
                <a href="mailto:hi@example.com">Mail</a>"#
            ),
        ),
        1,
    )
    .await;
    mount_page(&server, "/about", html_page("About", r#"<a href="/">Home</a>"#), 1).await;
    mount_page(
        &server,
        "/blog/",
        html_page("Blog", r#"<a href="first-post">First</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/blog/first-post", html_page("First Post", ""), 1).await;

    let output = crawl(&server, 50).await.expect("Crawl should succeed");

    let paths: Vec<&str> = output.pages.iter().map(|p| p.url.as_url().path()).collect();
    assert_eq!(paths, vec!["/", "/about", "/blog/", "/blog/first-post"]);
    assert_eq!(output.report.pages_fetched, 4);
    assert_eq!(output.report.failed, 0);

    let titles: Vec<&str> = output.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "About", "Blog", "First Post"]);
}

#[tokio::test]
async fn test_trailing_slash_and_query_variants_fetched_once() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            r##"<a href="/about">About</a>
            <a href="/about/">About again</a>
            <a href="/about?ref=nav#team">About with suffix</a>"##,
        ),
        1,
    )
    .await;
    mount_page(&server, "/about", html_page("About", ""), 1).await;
    mount_page(&server, "/about/", html_page("About", ""), 0).await;

    let output = crawl(&server, 50).await.expect("Crawl should succeed");

    assert_eq!(output.pages.len(), 2);
    assert_eq!(output.pages[1].url.as_url().path(), "/about");
    assert!(output.pages[1].url.as_url().query().is_none());
}

#[tokio::test]
async fn test_not_found_and_failures_are_recorded() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            r#"<a href="/missing">Missing</a><a href="/broken">Broken</a>"#,
        ),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let output = crawl(&server, 50).await.expect("Crawl should succeed");

    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.report.not_found, 1);
    assert_eq!(output.report.failed, 1);

    let missing = CanonicalUrl::parse(&format!("{}/missing", server.uri())).unwrap();
    assert_eq!(output.state.state_of(&missing), Some(PageState::NotFound));
}

#[tokio::test]
async fn test_page_cap_leaves_frontier_unfetched() {
    let server = MockServer::start().await;

    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/page-{i}">Page {i}</a>"#))
        .collect();
    mount_page(&server, "/", html_page("Home", &links), 1).await;
    for i in 1..=5 {
        let expected = if i <= 2 { 1 } else { 0 };
        mount_page(&server, &format!("/page-{i}"), html_page("Page", ""), expected).await;
    }

    let output = crawl(&server, 3).await.expect("Crawl should succeed");

    assert_eq!(output.pages.len(), 3);
    assert_eq!(output.report.capped, 3);
}

#[tokio::test]
async fn test_crawl_fails_when_start_page_unreachable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = crawl(&server, 50).await;

    match result {
        Err(KagamiError::NoPagesFetched { last_error, .. }) => {
            assert!(last_error.contains("503"), "{last_error}");
        }
        other => panic!("Expected NoPagesFetched, got {other:?}"),
    }
}

//! Whole jobs: crawl, assets, rewriting and packaging into a temp directory

use crate::test_transport;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use kagami::config::{BackendKind, MirrorConfig};
use kagami::crawler::{RenderHost, RenderSession};
use kagami::output::{Milestone, RecordingProgress};
use kagami::{Job, KagamiError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = r#"<html><head>
<title>Home</title>
<link rel="stylesheet" href="/css/site.css">
</head><body>
<img src="/img/logo.png" alt="logo">
<a href="/about">About</a>
<script src="/js/app.js"></script>
</body></html>"#;

const ABOUT: &str = r#"<html><head><title>About</title></head><body>
<a href="/">Home</a>
<img src="/img/logo.png">
</body></html>"#;

const SITE_CSS: &str = r#"body { background: url("../img/bg.png"); }"#;

async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    let html = |body: &str| ResponseTemplate::new(200).set_body_raw(body, "text/html");

    mount(&server, "/", html(HOME)).await;
    mount(&server, "/about", html(ABOUT)).await;
    mount(
        &server,
        "/css/site.css",
        ResponseTemplate::new(200).set_body_raw(SITE_CSS, "text/css"),
    )
    .await;
    for image in ["/img/logo.png", "/img/bg.png"] {
        mount(
            &server,
            image,
            ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .await;
    }
    mount(
        &server,
        "/js/app.js",
        ResponseTemplate::new(200).set_body_raw("console.log('hi');", "application/javascript"),
    )
    .await;

    server
}

fn config(server: &MockServer, dir: &Path) -> MirrorConfig {
    let mut config = MirrorConfig::for_url(format!("{}/", server.uri()));
    config.job.use_sitemap = false;
    config.fetch.backend = BackendKind::Http;
    config.fetch.max_retries = 0;
    config.output.directory = dir.join("mirror").display().to_string();
    config.output.summary_path = Some(dir.join("report.md").display().to_string());
    config
}

#[tokio::test]
async fn test_job_writes_self_contained_mirror() {
    let server = mock_site().await;
    let dir = tempfile::tempdir().unwrap();
    let progress = Arc::new(RecordingProgress::new());

    let outcome = Job::new(config(&server, dir.path()))
        .with_transport(test_transport())
        .with_progress(progress.clone())
        .run()
        .await
        .expect("Job should succeed");

    let root = dir.path().join("mirror");
    for file in [
        "index.html",
        "about.html",
        "assets/css/style.css",
        "assets/images/logo.png",
        "assets/images/bg.png",
        "assets/js/app.js",
    ] {
        assert!(root.join(file).exists(), "missing {file}");
    }
    assert_eq!(outcome.files_written, 6);

    let index = fs::read_to_string(root.join("index.html")).unwrap();
    assert!(index.contains(r#"src="assets/images/logo.png""#), "{index}");
    assert!(index.contains(r#"href="about.html""#), "{index}");
    assert!(index.contains(r#"href="assets/css/style.css""#), "{index}");
    assert!(index.contains(r#"src="assets/js/app.js""#), "{index}");
    assert!(!index.contains(&server.uri()), "{index}");

    let about = fs::read_to_string(root.join("about.html")).unwrap();
    assert!(about.contains(r#"href="index.html""#), "{about}");

    let css = fs::read_to_string(root.join("assets/css/style.css")).unwrap();
    assert!(css.contains(r#"url("../../assets/images/bg.png")"#), "{css}");

    assert_eq!(progress.milestones(), Milestone::all().to_vec());
    let last = progress.last().unwrap();
    assert_eq!(last.percent, 100);
    assert_eq!(last.job_id, outcome.job_id);

    let report = fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(report.contains("- **Status**: completed"), "{report}");
    assert!(report.contains("| about.html | About |"), "{report}");
}

#[tokio::test]
async fn test_disabled_toggles_keep_remote_references() {
    let server = mock_site().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = config(&server, dir.path());
    config.assets.images = false;
    config.assets.scripts = false;

    let outcome = Job::new(config)
        .with_transport(test_transport())
        .without_packaging()
        .run()
        .await
        .expect("Job should succeed");

    assert_eq!(outcome.files_written, 0);
    assert!(!dir.path().join("mirror").exists());
    assert!(outcome.output.stored_assets.is_empty());

    let home = &outcome.output.pages[0];
    assert!(home.html.contains(r#"src="/img/logo.png""#), "{}", home.html);
    assert!(home.html.contains(r#"src="/js/app.js""#), "{}", home.html);
    assert!(home.html.contains(r#"href="assets/css/style.css""#), "{}", home.html);
}

#[tokio::test]
async fn test_failed_job_writes_report_and_keeps_log() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;
    let dir = tempfile::tempdir().unwrap();
    let progress = Arc::new(RecordingProgress::new());

    let job = Job::new(config(&server, dir.path()))
        .with_transport(test_transport())
        .with_progress(progress.clone());
    let log = job.log();

    let result = job.run().await;

    assert!(matches!(result, Err(KagamiError::NoPagesFetched { .. })));
    assert_eq!(progress.milestones(), vec![Milestone::CrawlStarted]);
    assert!(log
        .snapshot()
        .iter()
        .any(|entry| entry.message.contains("HTTP status 500")));

    let report = fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(report.contains("- **Status**: failed"), "{report}");
    assert!(report.contains("## Failure"), "{report}");
}

/// A browser that can never be launched
struct UnlaunchableHost {
    launches: AtomicUsize,
}

#[async_trait]
impl RenderHost for UnlaunchableHost {
    async fn launch(&self) -> Result<Box<dyn RenderSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("no chromium executable found"))
    }
}

#[tokio::test]
async fn test_headless_failure_downgrades_to_http() {
    let server = mock_site().await;
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(UnlaunchableHost {
        launches: AtomicUsize::new(0),
    });

    let mut config = config(&server, dir.path());
    config.fetch.backend = BackendKind::Headless;
    config.headless.max_attempts = 2;

    let outcome = Job::new(config)
        .with_transport(test_transport())
        .with_render_host(host.clone())
        .without_packaging()
        .run()
        .await
        .expect("Job should succeed over HTTP");

    assert!(outcome.stats.downgraded);
    assert_eq!(host.launches.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.output.pages.len(), 2);
    assert!(outcome.summary.log.iter().any(|e| e.message.contains("Downgraded")));
}

//! Kagami main entry point
//!
//! This is the command-line interface for the Kagami site mirroring engine.

use clap::Parser;
use kagami::config::{load_config_with_hash, validate, BackendKind, MirrorConfig};
use kagami::output::TracingProgress;
use kagami::Job;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Kagami: a whole-site mirroring engine
///
/// Kagami crawls a website, downloads every stylesheet, image, font and
/// script its pages reference, and rewrites the pages so the result works
/// as a portable, self-contained mirror.
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version = "1.0.0")]
#[command(about = "A whole-site mirroring engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "url")]
    config: Option<PathBuf>,

    /// Mirror this URL with default settings (overrides the configured start-url)
    #[arg(long)]
    url: Option<String>,

    /// Directory the mirror is written into
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Fetch pages with plain HTTP only, never launching a browser
    #[arg(long)]
    http_only: bool,

    /// Maximum number of pages to fetch
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Do not consult sitemaps when seeding the crawl
    #[arg(long)]
    no_sitemap: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match load(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_mirror(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kagami=info,warn"),
            1 => EnvFilter::new("kagami=debug,info"),
            2 => EnvFilter::new("kagami=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the configuration from the file (if any) and the command line
fn load(cli: &Cli) -> Result<(MirrorConfig, Option<String>), Box<dyn std::error::Error>> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => {
            let url = cli.url.clone().ok_or("either CONFIG or --url is required")?;
            (MirrorConfig::for_url(url), None)
        }
    };

    if let Some(url) = &cli.url {
        config.job.start_url = url.clone();
    }
    if let Some(out) = &cli.out {
        config.output.directory = out.display().to_string();
    }
    if let Some(max_pages) = cli.max_pages {
        config.job.max_pages = max_pages;
    }
    if cli.http_only {
        config.fetch.backend = BackendKind::Http;
    }
    if cli.no_sitemap {
        config.job.use_sitemap = false;
    }

    validate(&config)?;
    Ok((config, hash))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &MirrorConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Kagami Dry Run ===\n");

    println!("Job:");
    println!("  Start URL: {}", config.job.start_url);
    println!("  Max pages: {}", config.job.max_pages);
    println!("  Use sitemaps: {}", config.job.use_sitemap);

    println!("\nFetch:");
    println!("  Backend: {:?}", config.fetch.backend);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Retries: {} (base delay {}ms)",
        config.fetch.max_retries, config.fetch.retry_base_delay_ms
    );
    println!("  User agent: {}", config.fetch.user_agent);

    if config.fetch.backend == BackendKind::Headless {
        let headless = &config.headless;
        println!("\nHeadless:");
        println!(
            "  Chrome: {}",
            headless.chrome_path.as_deref().unwrap_or("(search PATH)")
        );
        println!("  Navigation timeout: {}s", headless.navigation_timeout_secs);
        println!(
            "  Waits: first page {}ms, later pages {}ms, settle {}ms",
            headless.first_page_wait_ms, headless.page_wait_ms, headless.settle_ms
        );
        println!("  Attempts before HTTP fallback: {}", headless.max_attempts);
    }

    let assets = &config.assets;
    println!("\nAssets:");
    println!("  CSS: {}", assets.css);
    println!("  Images: {}", assets.images);
    println!("  Fonts: {}", assets.fonts);
    println!("  Scripts: {}", assets.scripts);
    println!("  Content: {}", assets.content);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    if let Some(summary) = &config.output.summary_path {
        println!("  Report: {}", summary);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would mirror up to {} pages starting at {}",
        config.job.max_pages, config.job.start_url
    );

    Ok(())
}

/// Handles the main mirror operation
async fn handle_mirror(
    config: MirrorConfig,
    config_hash: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let directory = config.output.directory.clone();
    let mut job = Job::new(config).with_progress(Arc::new(TracingProgress));
    if let Some(hash) = config_hash {
        job = job.with_config_hash(hash);
    }

    let log = job.log();
    match job.run().await {
        Ok(outcome) => {
            tracing::info!(
                "Mirror completed: {} pages, {} assets, {} files in {}",
                outcome.output.pages.len(),
                outcome.stats.assets_downloaded(),
                outcome.files_written,
                directory
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            for entry in log.tail(10) {
                tracing::error!("  {} {}", entry.level, entry.message);
            }
            Err(e.into())
        }
    }
}

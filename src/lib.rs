//! Kagami: a whole-site mirroring engine
//!
//! This crate crawls a website, downloads every asset its pages reference and
//! rewrites all HTML and CSS so the result works as a portable, self-contained
//! mirror.

pub mod assets;
pub mod config;
pub mod crawler;
pub mod job;
pub mod output;
pub mod rewrite;
pub mod sitemap;
pub mod state;
pub mod transport;
pub mod url;

use thiserror::Error;

/// Main error type for Kagami operations
#[derive(Debug, Error)]
pub enum KagamiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("No pages could be fetched from {start_url}: {last_error}")]
    NoPagesFetched {
        start_url: String,
        last_error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Host appears inside the path of {0}")]
    DomainInPath(String),
}

/// Result type alias for Kagami operations
pub type Result<T> = std::result::Result<T, KagamiError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::MirrorConfig;
pub use job::{run_job, Job, JobOutcome};
pub use state::{CrawlState, PageState};
pub use url::{normalize_identity, CanonicalUrl, Canonicalizer, Origin};

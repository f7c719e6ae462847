//! Configuration module for Kagami
//!
//! This module handles loading, parsing, and validating TOML job configuration.
//!
//! # Example
//!
//! ```no_run
//! use kagami::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring {} (cap {})", config.job.start_url, config.job.max_pages);
//! ```

mod heuristics;
mod parser;
mod types;
mod validation;

// Re-export types
pub use heuristics::Heuristics;
pub use types::{
    AssetsConfig, BackendKind, FetchConfig, HeadlessConfig, HeuristicsConfig, JobConfig,
    MirrorConfig, OutputConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, hash_content, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

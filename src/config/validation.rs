use crate::config::types::{
    FetchConfig, HeadlessConfig, HeuristicsConfig, JobConfig, MirrorConfig, OutputConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &MirrorConfig) -> Result<(), ConfigError> {
    validate_job_config(&config.job)?;
    validate_fetch_config(&config.fetch)?;
    validate_headless_config(&config.headless)?;
    validate_heuristics_config(&config.heuristics)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the job section
fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start-url '{}': {}", config.start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start-url '{}' must use http or https",
            config.start_url
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "start-url '{}' has no host",
            config.start_url
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates transport settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > 5 {
        return Err(ConfigError::Validation(format!(
            "max-redirects must be at most 5, got {}",
            config.max_redirects
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be at most 10, got {}",
            config.max_retries
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates headless rendering settings
fn validate_headless_config(config: &HeadlessConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.scroll_step_px < 1 {
        return Err(ConfigError::Validation(
            "scroll-step-px must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every heuristic pattern compiles
fn validate_heuristics_config(config: &HeuristicsConfig) -> Result<(), ConfigError> {
    for pattern in &config.placeholder_patterns {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("placeholder pattern '{}': {}", pattern, e))
        })?;
    }

    Regex::new(&config.domain_like_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!(
            "domain-like pattern '{}': {}",
            config.domain_like_pattern, e
        ))
    })?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.summary_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "summary-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

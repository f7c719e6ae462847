use crate::config::types::HeuristicsConfig;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};

/// Compiled form of the `[heuristics]` section
#[derive(Debug, Clone)]
pub struct Heuristics {
    placeholders: Vec<Regex>,
    domain_like: Regex,
}

impl Heuristics {
    /// Compiles every pattern; placeholders and the domain pattern match case-insensitively
    pub fn compile(config: &HeuristicsConfig) -> Result<Self, ConfigError> {
        let placeholders = config
            .placeholder_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let domain_like = RegexBuilder::new(&config.domain_like_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ConfigError::InvalidPattern(format!("{}: {}", config.domain_like_pattern, e))
            })?;

        Ok(Self {
            placeholders,
            domain_like,
        })
    }

    /// True when `src` looks like a dummy image (tracking pixel, spinner, blank, data URI)
    pub fn is_placeholder(&self, src: &str) -> bool {
        let src = src.trim();
        if src.is_empty() {
            return true;
        }
        self.placeholders.iter().any(|re| re.is_match(src))
    }

    /// True when a path segment looks like a bare host name such as `www.x.com`
    pub fn looks_like_domain(&self, segment: &str) -> bool {
        self.domain_like.is_match(segment)
    }
}

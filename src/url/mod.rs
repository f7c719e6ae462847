//! URL handling module for Kagami
//!
//! This module provides the canonical URL type, page identity normalization,
//! origin scoping, and repair of malformed `href`/`src` values. Everything
//! here is pure string work; nothing touches the network.

mod domain;
mod normalize;
mod resolve;

use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

// Re-export main functions
pub use domain::{extract_host, is_same_origin, strip_www, Origin};
pub use normalize::{identity_of, normalize_identity, split_suffix, strip_query_and_fragment};
pub use resolve::{is_fetchable, is_valid_internal_url, same_origin_str, Canonicalizer};

/// A validated absolute URL
///
/// Always http or https, always with a non-empty host, and its path never
/// contains that host. The last rule catches relative joins that glued the
/// domain into the path (`https://x.com/x.com/page`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Parses and validates an absolute URL string
    ///
    /// # Examples
    ///
    /// ```
    /// use kagami::url::CanonicalUrl;
    ///
    /// assert!(CanonicalUrl::parse("https://example.com/about").is_ok());
    /// assert!(CanonicalUrl::parse("https://example.com/example.com/about").is_err());
    /// assert!(CanonicalUrl::parse("mailto:someone@example.com").is_err());
    /// ```
    pub fn parse(url_str: &str) -> UrlResult<Self> {
        let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(url)
    }

    /// Validates an already parsed URL
    pub fn from_url(url: Url) -> UrlResult<Self> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        let host = extract_host(&url).ok_or(UrlError::MissingHost)?;
        if url.path().to_lowercase().contains(&host) {
            return Err(UrlError::DomainInPath(url.to_string()));
        }

        Ok(Self(url))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Host of the URL; never empty
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Page identity: no fragment, no query, no trailing slash except root
    pub fn identity(&self) -> String {
        identity_of(&self.0)
    }

    /// Copy of this URL with fragment and query removed
    pub fn without_suffix(&self) -> CanonicalUrl {
        let mut url = self.0.clone();
        url.set_fragment(None);
        url.set_query(None);
        Self(url)
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<Url> for CanonicalUrl {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}

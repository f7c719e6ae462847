use std::fmt;
use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use kagami::url::extract_host;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_host(&url), Some("www.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Strips a leading `www.` label
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Scheme and host of the site being mirrored
///
/// Membership ignores the scheme, the port and a leading `www.` on either side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
}

impl Origin {
    /// Builds the origin of a URL, `None` when it has no host
    pub fn of(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: extract_host(url)?,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host exactly as it appeared in the start URL (lowercased)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host with any `www.` prefix removed
    pub fn bare_host(&self) -> &str {
        strip_www(&self.host)
    }

    /// True when `url` belongs to this origin
    pub fn contains(&self, url: &Url) -> bool {
        extract_host(url).is_some_and(|h| strip_www(&h) == self.bare_host())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

/// Compares the hosts of two URLs with `www.` stripped from both
///
/// Path, scheme and port are ignored entirely.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    match (extract_host(a), extract_host(b)) {
        (Some(a), Some(b)) => strip_www(&a) == strip_www(&b),
        _ => false,
    }
}

use url::Url;

/// Reduces a URL to its page identity
///
/// # Normalization Steps
///
/// 1. Remove fragment (everything after #)
/// 2. Remove the query string
/// 3. Trim the trailing slash, except for the root path `/`
///
/// Hosts are not touched beyond the lowercasing the URL parser already
/// performs, so `www.example.com` and `example.com` keep distinct identities.
/// Strings that fail to parse get the same treatment textually. The function
/// is idempotent.
///
/// # Examples
///
/// ```
/// use kagami::url::normalize_identity;
///
/// assert_eq!(
///     normalize_identity("https://example.com/about/?ref=nav#team"),
///     "https://example.com/about"
/// );
/// assert_eq!(normalize_identity("https://example.com/"), "https://example.com/");
/// ```
pub fn normalize_identity(url_str: &str) -> String {
    match Url::parse(url_str.trim()) {
        Ok(url) => identity_of(&url),
        Err(_) => {
            let stripped = strip_query_and_fragment(url_str.trim());
            trim_slashes(&stripped).to_string()
        }
    }
}

/// Page identity of an already parsed URL
pub fn identity_of(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.set_query(None);

    let path = url.path().to_string();
    let trimmed = path.trim_end_matches('/');
    if trimmed.len() != path.len() {
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    url.to_string()
}

/// Removes `#fragment` and `?query` from a URL string without parsing it
///
/// This is the dedup key used for assets: unlike page identities it keeps a
/// trailing slash.
pub fn strip_query_and_fragment(url_str: &str) -> String {
    let end = url_str.find(['?', '#']).unwrap_or(url_str.len());
    url_str[..end].to_string()
}

/// Splits a reference into its base and its `?query#fragment` suffix
pub fn split_suffix(href: &str) -> (&str, &str) {
    let at = href.find(['?', '#']).unwrap_or(href.len());
    href.split_at(at)
}

fn trim_slashes(s: &str) -> &str {
    match s.trim_end_matches('/') {
        "" => s,
        trimmed => trimmed,
    }
}

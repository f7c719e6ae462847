use crate::config::Heuristics;
use crate::url::domain::{extract_host, is_same_origin, Origin};
use crate::url::CanonicalUrl;
use url::Url;

/// File extensions that disqualify a first path segment from being read as a host
const FILE_EXTENSIONS: &[&str] = &[
    "html", "htm", "php", "asp", "aspx", "jsp", "cgi", "css", "js", "mjs", "json", "xml",
    "txt", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp", "pdf", "woff",
    "woff2", "ttf", "otf", "eot", "mp4", "webm", "mp3", "ogg", "zip", "gz",
];

/// Turns raw `href`/`src` values into canonical URLs
///
/// Holds the compiled bare-domain heuristic so each job can tune it.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    heuristics: Heuristics,
}

impl Canonicalizer {
    pub fn new(heuristics: Heuristics) -> Self {
        Self { heuristics }
    }

    pub fn heuristics(&self) -> &Heuristics {
        &self.heuristics
    }

    /// Resolves `href` against `base`, repairing common malformations first
    ///
    /// # Repairs
    ///
    /// 1. Protocol-relative `//host/path` gets an `https:` prefix
    /// 2. Scheme-less bare domains (`www.x.com/...`, or a first segment that
    ///    looks like a host and is followed by `/`) get an `https://` prefix
    /// 3. Anything else is resolved against the directory of `base`
    ///
    /// # Returns
    ///
    /// * `Some(CanonicalUrl)` - An http(s) URL with a host whose path does not
    ///   contain that host
    /// * `None` - The input could not be repaired into such a URL
    ///
    /// The fragment and query of `href` are kept so that callers rewriting
    /// links can re-append them.
    pub fn resolve(&self, href: &str, base: &Url) -> Option<CanonicalUrl> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        let resolved = if let Some(rest) = href.strip_prefix("//") {
            Url::parse(&format!("https://{}", rest)).ok()?
        } else if has_scheme(href) {
            Url::parse(href).ok()?
        } else if self.is_bare_domain(href) {
            Url::parse(&format!("https://{}", href)).ok()?
        } else if href.starts_with('?') || href.starts_with('#') {
            base.join(href).ok()?
        } else if first_segment(href).contains(':') {
            // keep `a:b/c` from being parsed as a scheme
            directory_of(base).join(&format!("./{}", href)).ok()?
        } else {
            directory_of(base).join(href).ok()?
        };

        CanonicalUrl::from_url(resolved).ok()
    }

    fn is_bare_domain(&self, href: &str) -> bool {
        if href.len() > 4 && href.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("www.")) {
            return true;
        }

        if href.starts_with(['/', '.']) {
            return false;
        }

        let Some((first, _)) = href.split_once('/') else {
            return false;
        };
        if first.contains(['?', '#']) {
            return false;
        }

        let last_label = first
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        self.heuristics.looks_like_domain(first) && !FILE_EXTENSIONS.contains(&last_label.as_str())
    }
}

fn first_segment(href: &str) -> &str {
    let end = href.find(['/', '?', '#']).unwrap_or(href.len());
    &href[..end]
}

/// True for hrefs carrying their own scheme (`https:`, `mailto:`, `data:` ...)
fn has_scheme(href: &str) -> bool {
    match href.find(':') {
        Some(idx) if idx > 0 => {
            let scheme = &href[..idx];
            scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !href[idx + 1..].starts_with(|c: char| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Base URL trimmed to its parent directory, with query and fragment dropped
fn directory_of(base: &Url) -> Url {
    let mut dir = base.clone();
    dir.set_query(None);
    dir.set_fragment(None);

    let path = base.path();
    if !path.ends_with('/') {
        let cut = path.rfind('/').map_or(0, |i| i + 1);
        let parent = if cut == 0 { "/" } else { &path[..cut] };
        dir.set_path(parent);
    }

    dir
}

/// True when `url` lies in the crawl origin and carries no domain-in-path corruption
///
/// The path is rejected if it contains either the URL's own host or the
/// origin's host.
pub fn is_valid_internal_url(url: &Url, base_origin: &Origin) -> bool {
    if !base_origin.contains(url) {
        return false;
    }

    let path = url.path().to_lowercase();
    let own_host = extract_host(url).unwrap_or_default();

    !(path.contains(&own_host)
        || path.contains(base_origin.host())
        || path.contains(base_origin.bare_host()))
}

/// True when `url` can be requested: http(s), has a host, no host inside its path
pub fn is_fetchable(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match extract_host(url) {
        Some(host) => !url.path().to_lowercase().contains(&host),
        None => false,
    }
}

/// Convenience wrapper over [`is_same_origin`] for string inputs
pub fn same_origin_str(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => is_same_origin(&a, &b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeuristicsConfig;

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::new(Heuristics::compile(&HeuristicsConfig::default()).unwrap())
    }

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn resolve(href: &str, b: &str) -> Option<String> {
        canonicalizer()
            .resolve(href, &base(b))
            .map(|u| u.as_str().to_string())
    }

    #[test]
    fn test_protocol_relative() {
        assert_eq!(
            resolve("//cdn.example.com/a.png", "http://example.com/"),
            Some("https://cdn.example.com/a.png".to_string())
        );
    }

    #[test]
    fn test_bare_www_domain() {
        assert_eq!(
            resolve("www.example.com/contact", "https://example.com/blog/post"),
            Some("https://www.example.com/contact".to_string())
        );
    }

    #[test]
    fn test_domain_like_first_segment() {
        assert_eq!(
            resolve("cdn.example.net/img/x.png", "https://example.com/"),
            Some("https://cdn.example.net/img/x.png".to_string())
        );
    }

    #[test]
    fn test_file_name_is_not_a_domain() {
        assert_eq!(
            resolve("index.html/extra", "https://example.com/docs/"),
            Some("https://example.com/docs/index.html/extra".to_string())
        );
        assert_eq!(
            resolve("style.css", "https://example.com/docs/page"),
            Some("https://example.com/docs/style.css".to_string())
        );
    }

    #[test]
    fn test_relative_to_directory() {
        assert_eq!(
            resolve("img/a.png", "https://example.com/blog/post.html"),
            Some("https://example.com/blog/img/a.png".to_string())
        );
        assert_eq!(
            resolve("../img/x.png", "https://example.com/css/app.css"),
            Some("https://example.com/img/x.png".to_string())
        );
        assert_eq!(
            resolve("/about", "https://example.com/blog/post"),
            Some("https://example.com/about".to_string())
        );
    }

    #[test]
    fn test_query_and_fragment_only() {
        assert_eq!(
            resolve("#team", "https://example.com/about"),
            Some("https://example.com/about#team".to_string())
        );
        assert_eq!(
            resolve("?page=2", "https://example.com/blog"),
            Some("https://example.com/blog?page=2".to_string())
        );
    }

    #[test]
    fn test_non_http_rejected() {
        assert_eq!(resolve("mailto:a@example.com", "https://example.com/"), None);
        assert_eq!(resolve("javascript:void(0)", "https://example.com/"), None);
        assert_eq!(resolve("data:image/png;base64,AAA", "https://example.com/"), None);
        assert_eq!(resolve("   ", "https://example.com/"), None);
    }

    #[test]
    fn test_port_is_not_a_scheme() {
        assert_eq!(
            resolve("localhost:8080/x", "https://example.com/"),
            Some("https://example.com/localhost:8080/x".to_string())
        );
    }

    #[test]
    fn test_never_returns_host_in_path() {
        let hrefs = [
            "example.com/about",
            "/example.com/about",
            "https://example.com/example.com/x",
            "about/example.com",
            "//example.com/https://example.com",
            "../../example.com/",
            "www.example.com/www.example.com",
        ];

        for href in hrefs {
            if let Some(url) = canonicalizer().resolve(href, &base("https://example.com/a/b")) {
                let host = url.host();
                assert!(
                    !url.as_url().path().contains(host),
                    "{href} resolved to {url}"
                );
            }
        }
    }

    #[test]
    fn test_is_valid_internal_url() {
        let origin = Origin::of(&base("https://www.example.com/")).unwrap();
        assert!(is_valid_internal_url(&base("https://example.com/about"), &origin));
        assert!(!is_valid_internal_url(&base("https://other.com/about"), &origin));
        assert!(!is_valid_internal_url(
            &base("https://example.com/www.example.com/about"),
            &origin
        ));
    }

    #[test]
    fn test_is_fetchable() {
        assert!(is_fetchable(&base("https://cdn.example.com/a.png")));
        assert!(!is_fetchable(&base("https://example.com/example.com/a.png")));
        assert!(!is_fetchable(&base("data:image/png;base64,AAA")));
    }

    #[test]
    fn test_same_origin_str() {
        assert!(same_origin_str("https://www.a.com/x", "http://a.com/y"));
        assert!(!same_origin_str("https://a.com", "not a url"));
    }
}

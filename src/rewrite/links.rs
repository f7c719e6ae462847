//! Page URL → local file mapping and anchor rewriting

use crate::assets::sanitize_file_name;
use crate::crawler::Page;
use crate::url::{identity_of, split_suffix, strip_www, CanonicalUrl, Canonicalizer, Origin};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Every spelling of every crawled page → that page's file in the mirror
///
/// Source documents link to the same page inconsistently, so each page is
/// registered under the identities of its `www.`/bare host, `http`/`https`
/// and trailing-slash variants. Identities already drop the trailing slash
/// and the suffix, so lookups normalize the link the same way.
#[derive(Debug, Clone, Default)]
pub struct UrlToLocalPath {
    entries: HashMap<String, String>,
    files: Vec<(CanonicalUrl, String)>,
    issued: HashSet<String>,
}

impl UrlToLocalPath {
    /// Assigns file names to `pages` in crawl order
    ///
    /// The root page becomes `index.html`, `/a/b/` becomes `a-b.html`; a
    /// name already taken gets `-2`, `-3`, ... before the extension.
    pub fn build(pages: &[Page]) -> Self {
        let mut map = Self::default();

        for page in pages {
            if map.lookup(page.url.as_url()).is_some() {
                continue;
            }

            let base = page_slug(page.url.as_url());
            let mut file = format!("{base}.html");
            let mut n = 2;
            while map.issued.contains(&file) {
                file = format!("{base}-{n}.html");
                n += 1;
            }

            map.register(&page.url, &file);
        }

        map
    }

    /// Local file of the page a URL points at
    pub fn lookup(&self, url: &Url) -> Option<&str> {
        self.entries.get(&identity_of(url)).map(String::as_str)
    }

    /// Local file of a crawled page
    pub fn file_for(&self, url: &CanonicalUrl) -> Option<&str> {
        self.lookup(url.as_url())
    }

    /// Pages and their files in crawl order
    pub fn files(&self) -> &[(CanonicalUrl, String)] {
        &self.files
    }

    /// True for a file name handed out by [`UrlToLocalPath::build`]
    pub fn is_local_file(&self, name: &str) -> bool {
        self.issued.contains(name)
    }

    /// Number of registered spellings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register(&mut self, url: &CanonicalUrl, file: &str) {
        for variant in variants(url.as_url()) {
            self.entries
                .entry(identity_of(&variant))
                .or_insert_with(|| file.to_string());
        }
        self.issued.insert(file.to_string());
        self.files.push((url.clone(), file.to_string()));
    }
}

/// Rewrites one anchor `href`
///
/// Internal links are resolved against `page_url`, looked up in `pages` and
/// replaced with the local file name, re-appending the original query and
/// fragment. Off-origin links, special schemes and pages that were never
/// crawled give `None`, which leaves the attribute untouched.
pub fn rewrite_href(
    href: &str,
    page_url: &Url,
    origin: &Origin,
    pages: &UrlToLocalPath,
    canonicalizer: &Canonicalizer,
) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    // already rewritten; a local name can also resolve to a crawled page
    let (path, suffix) = split_suffix(href);
    if pages.is_local_file(path) {
        return None;
    }

    let url = canonicalizer.resolve(href, page_url)?;
    if !origin.contains(url.as_url()) {
        return None;
    }

    let file = pages.lookup(url.as_url())?;
    Some(format!("{file}{suffix}"))
}

/// Slug of a page URL; also the stem of its local file
pub fn page_slug(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return "index".to_string();
    }

    let path = path
        .strip_suffix(".html")
        .or_else(|| path.strip_suffix(".htm"))
        .unwrap_or(path);

    match sanitize_file_name(&path.replace('/', "-")) {
        stem if stem.is_empty() => "page".to_string(),
        stem => stem,
    }
}

/// Scheme, www and trailing-slash variants of a page URL
fn variants(url: &Url) -> Vec<Url> {
    let Some(host) = url.host_str() else {
        return vec![url.clone()];
    };

    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let bare = strip_www(host).to_string();
    let hosts = [format!("{bare}{port}"), format!("www.{bare}{port}")];
    let path = url.path();
    let paths = if path == "/" {
        vec![path.to_string()]
    } else {
        let trimmed = path.trim_end_matches('/');
        vec![trimmed.to_string(), format!("{trimmed}/")]
    };

    let mut out = vec![url.clone()];
    for scheme in ["https", "http"] {
        for host in &hosts {
            for path in &paths {
                if let Ok(variant) = Url::parse(&format!("{scheme}://{host}{path}")) {
                    out.push(variant);
                }
            }
        }
    }
    out
}

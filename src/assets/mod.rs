//! Asset resolver
//!
//! Extracts every image, font, script and stylesheet the crawled pages
//! reference, downloads each resource once and records where it lives in
//! the mirror. The resulting [`AssetMap`] is complete before any rewriting
//! starts; the rewriters only read it.

mod extract;
mod naming;
mod resolver;

pub use extract::{
    classify_by_extension, extract_from_css, extract_from_html, AssetReference, CssReferences,
    BACKGROUND_ATTRIBUTES, LAZY_IMAGE_ATTRIBUTES, LAZY_SRCSET_ATTRIBUTES,
};
pub(crate) use extract::{css_urls, srcset_candidates, CSS_IMPORT_RE, CSS_URL_RE};
pub use naming::{sanitize_file_name, AssetNamer};
pub use resolver::{AssetPlan, AssetResolver, FetchedStylesheet};

use crate::url::{strip_query_and_fragment, Canonicalizer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use url::Url;

/// Mirror-relative path of the consolidated stylesheet
pub const CONSOLIDATED_STYLESHEET: &str = "assets/css/style.css";

/// Kind of a non-HTML resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Stylesheet,
    Image,
    Font,
    Script,
}

impl AssetKind {
    pub fn all() -> [AssetKind; 4] {
        [
            AssetKind::Stylesheet,
            AssetKind::Image,
            AssetKind::Font,
            AssetKind::Script,
        ]
    }

    /// Directory under `assets/` holding this kind
    pub fn directory(&self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "css",
            AssetKind::Image => "images",
            AssetKind::Font => "fonts",
            AssetKind::Script => "js",
        }
    }

    /// Extension used when neither the URL nor the content type gives one
    pub fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "css",
            AssetKind::Image => "img",
            AssetKind::Font => "font",
            AssetKind::Script => "js",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "stylesheet",
            AssetKind::Image => "image",
            AssetKind::Font => "font",
            AssetKind::Script => "script",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a downloaded asset lives in the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    /// Path relative to the mirror root, e.g. `assets/images/hero.jpg`
    pub local_path: String,
    pub kind: AssetKind,
}

/// A downloaded asset body
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub url: String,
    pub kind: AssetKind,
    pub local_path: String,
    pub bytes: Vec<u8>,
}

/// Remote URL → local path for every downloaded asset
///
/// Each asset is stored under every exact URL it was referenced by and under
/// its query/fragment-stripped form, so lookups succeed whichever spelling a
/// document uses.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    entries: HashMap<String, AssetEntry>,
    local_paths: HashSet<String>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `url` and its stripped form
    ///
    /// An existing stripped key is kept, so the first asset registered for a
    /// dedup key wins.
    pub fn insert(&mut self, url: &str, local_path: &str, kind: AssetKind) {
        let entry = AssetEntry {
            local_path: local_path.to_string(),
            kind,
        };
        self.local_paths.insert(local_path.to_string());
        let stripped = strip_query_and_fragment(url);
        if stripped != url {
            self.entries
                .entry(stripped)
                .or_insert_with(|| entry.clone());
        }
        self.entries.insert(url.to_string(), entry);
    }

    /// True when `raw` is a path this map handed out, optionally behind
    /// `./` or `../` segments
    pub fn is_local_path(&self, raw: &str) -> bool {
        let stripped = strip_query_and_fragment(raw.trim());
        let mut path = stripped.as_str();
        while let Some(rest) = path.strip_prefix("../").or_else(|| path.strip_prefix("./")) {
            path = rest;
        }
        self.local_paths.contains(path)
    }

    pub fn get(&self, key: &str) -> Option<&AssetEntry> {
        self.entries.get(key)
    }

    /// Finds the asset a raw reference points at
    ///
    /// # Lookup order
    ///
    /// 1. The reference exactly as written
    /// 2. The reference resolved against `base`, the URL of the document
    ///    containing it
    /// 3. The resolved reference without query and fragment
    pub fn lookup(
        &self,
        raw: &str,
        base: &Url,
        canonicalizer: &Canonicalizer,
    ) -> Option<&AssetEntry> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") || self.is_local_path(raw) {
            return None;
        }

        if let Some(entry) = self.entries.get(raw) {
            return Some(entry);
        }

        let resolved = canonicalizer.resolve(raw, base)?;
        self.entries
            .get(resolved.as_str())
            .or_else(|| self.entries.get(&strip_query_and_fragment(resolved.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AssetEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Heuristics, HeuristicsConfig};

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::new(Heuristics::compile(&HeuristicsConfig::default()).unwrap())
    }

    #[test]
    fn test_lookup_three_spellings() {
        let mut map = AssetMap::new();
        map.insert(
            "https://example.com/img/logo.png",
            "assets/images/logo.png",
            AssetKind::Image,
        );
        let canonicalizer = canonicalizer();
        let home = Url::parse("https://example.com/").unwrap();
        let nested = Url::parse("https://example.com/blog/post/").unwrap();

        // exact
        let exact = map.lookup("https://example.com/img/logo.png", &home, &canonicalizer);
        // added query string
        let query = map.lookup("https://example.com/img/logo.png?v=3", &home, &canonicalizer);
        // relative from another document
        let relative = map.lookup("../../img/logo.png", &nested, &canonicalizer);

        for hit in [exact, query, relative] {
            assert_eq!(hit.map(|e| e.local_path.as_str()), Some("assets/images/logo.png"));
        }
    }

    #[test]
    fn test_insert_keeps_exact_and_stripped() {
        let mut map = AssetMap::new();
        map.insert(
            "https://cdn.example.com/a.css?ver=2",
            "assets/css/a.css",
            AssetKind::Stylesheet,
        );

        assert!(map.get("https://cdn.example.com/a.css?ver=2").is_some());
        assert!(map.get("https://cdn.example.com/a.css").is_some());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_local_path_never_matches_colliding_remote_asset() {
        let mut namer = AssetNamer::new();
        let mut map = AssetMap::new();
        for raw in [
            "https://example.com/img/logo.png",
            "https://example.com/assets/images/logo.png",
        ] {
            let url = Url::parse(raw).unwrap();
            let local = namer.assign(&url, AssetKind::Image, None);
            map.insert(raw, &local, AssetKind::Image);
        }
        let base = Url::parse("https://example.com/").unwrap();
        let css_base = Url::parse("https://example.com/css/app.css").unwrap();
        let canonicalizer = canonicalizer();

        let first = map
            .lookup("/img/logo.png", &base, &canonicalizer)
            .map(|e| e.local_path.clone());
        assert_eq!(first.as_deref(), Some("assets/images/logo.png"));
        assert!(map.lookup("assets/images/logo.png", &base, &canonicalizer).is_none());
        assert!(map
            .lookup("../../assets/images/logo.png", &css_base, &canonicalizer)
            .is_none());
        assert!(map
            .lookup("/assets/images/logo.png", &base, &canonicalizer)
            .is_some_and(|e| e.local_path != "assets/images/logo.png"));
    }

    #[test]
    fn test_lookup_ignores_local_paths_and_data_uris() {
        let mut map = AssetMap::new();
        map.insert("https://example.com/a.png", "assets/images/a.png", AssetKind::Image);
        let base = Url::parse("https://example.com/").unwrap();
        let canonicalizer = canonicalizer();

        assert!(map.lookup("assets/images/a.png", &base, &canonicalizer).is_none());
        assert!(map.lookup("data:image/png;base64,AAAA", &base, &canonicalizer).is_none());
    }
}

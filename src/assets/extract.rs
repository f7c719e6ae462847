//! Asset reference extraction
//!
//! Two independent passes run over every document and their results are
//! unioned: a structured pass over parsed elements and attributes, and a
//! raw-text pass that finds asset URLs inside inline scripts, JSON blobs and
//! markup the parser could not make sense of.

use super::AssetKind;
use crate::url::{is_fetchable, strip_query_and_fragment, CanonicalUrl, Canonicalizer};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use url::Url;

/// Attributes lazy loaders keep the real image source in
pub const LAZY_IMAGE_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-url",
    "data-image",
    "data-full-src",
    "data-hi-res-src",
];

/// Attributes lazy loaders keep the real `srcset` in
pub const LAZY_SRCSET_ATTRIBUTES: &[&str] = &["data-srcset", "data-lazy-srcset"];

/// Attributes carrying a background image URL for a script to apply
pub const BACKGROUND_ATTRIBUTES: &[&str] = &[
    "data-bg",
    "data-background",
    "data-background-image",
    "data-bg-src",
];

/// `url(...)` in CSS, in its double-quoted, single-quoted and bare forms
pub(crate) static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
        .expect("hardcoded regex pattern is valid")
});

/// `@import "x.css";` and `@import url(x.css) screen;`
pub(crate) static CSS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?[^;]*;"#)
        .expect("hardcoded regex pattern is valid")
});

static FONT_FACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)@font-face\s*\{[^}]*\}").expect("hardcoded regex pattern is valid")
});

/// Absolute or protocol-relative URLs ending in an asset extension
static RAW_ABSOLUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:https?:)?//[^\s"'<>()\\,]+?\.(?:png|jpe?g|gif|webp|avif|svg|ico|bmp|woff2?|ttf|otf|eot|css|m?js)\b(?:\?[^\s"'<>()\\]*)?"#,
    )
    .expect("hardcoded regex pattern is valid")
});

/// Relative asset URLs in attribute position
static RAW_ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:src|href|poster|content|data-[a-z0-9-]+)\s*=\s*["']([^"'<>\s]+?\.(?:png|jpe?g|gif|webp|avif|svg|ico|bmp|woff2?|ttf|otf|eot|css|m?js)\b(?:\?[^"'<>\s]*)?)["']"#,
    )
    .expect("hardcoded regex pattern is valid")
});

/// An asset URL found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub url: CanonicalUrl,
    pub kind: AssetKind,
}

/// What a stylesheet references
#[derive(Debug, Clone, Default)]
pub struct CssReferences {
    /// `@import`ed stylesheets
    pub imports: Vec<CanonicalUrl>,
    /// Images and fonts from `url(...)`
    pub assets: Vec<AssetReference>,
}

/// Classifies a URL by the extension of its last path segment
pub fn classify_by_extension(url: &Url) -> Option<AssetKind> {
    let last = url.path().rsplit('/').next().unwrap_or_default();
    let (_, ext) = last.rsplit_once('.')?;

    match ext.to_ascii_lowercase().as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" | "bmp" | "tif"
        | "tiff" => Some(AssetKind::Image),
        "woff" | "woff2" | "ttf" | "otf" | "eot" => Some(AssetKind::Font),
        "css" => Some(AssetKind::Stylesheet),
        "js" | "mjs" => Some(AssetKind::Script),
        _ => None,
    }
}

/// Collects every asset an HTML document references
///
/// # Structured pass
///
/// - `img`/`source` `src` and `srcset`, plus the lazy-load attributes in
///   [`LAZY_IMAGE_ATTRIBUTES`] and [`LAZY_SRCSET_ATTRIBUTES`] on any element
/// - background attributes ([`BACKGROUND_ATTRIBUTES`]) and `url()`s in
///   inline `style` attributes and `<style>` blocks
/// - `link rel=icon|apple-touch-icon`, Open Graph and Twitter image meta,
///   `video poster`
/// - `link rel=stylesheet` and Google Fonts links, `script src`
///
/// # Raw pass
///
/// After unescaping JSON-style `\/`, any absolute URL or quoted attribute
/// value ending in a known asset extension.
///
/// Results are fetchable and in document order. Each exact spelling appears
/// once, and spellings sharing a query-stripped URL share one kind, so the
/// plan can download the resource once and map every spelling.
pub fn extract_from_html(
    html: &str,
    base: &Url,
    canonicalizer: &Canonicalizer,
) -> Vec<AssetReference> {
    let document = Html::parse_document(html);
    let mut collector = Collector::new(base, canonicalizer);

    collect_images(&document, &mut collector);
    collect_links(&document, &mut collector);

    for style in select(&document, "style") {
        let css = style.text().collect::<String>();
        let found = extract_from_css(&css, base, canonicalizer);
        for import in found.imports {
            collector.push_url(import, AssetKind::Stylesheet);
        }
        for reference in found.assets {
            collector.push_url(reference.url, reference.kind);
        }
    }

    for element in select(&document, "[style]") {
        if let Some(style) = element.value().attr("style") {
            for raw in css_urls(style) {
                collector.push(&raw, Some(AssetKind::Image));
            }
        }
    }

    let unescaped = html.replace("\\/", "/");
    for m in RAW_ABSOLUTE_RE.find_iter(&unescaped) {
        collector.push(&m.as_str().replace("&amp;", "&"), None);
    }
    for caps in RAW_ATTRIBUTE_RE.captures_iter(&unescaped) {
        if let Some(m) = caps.get(1) {
            collector.push(&m.as_str().replace("&amp;", "&"), None);
        }
    }

    collector.finish()
}

/// Collects the imports and `url()` references of a stylesheet
///
/// Every reference is resolved against `sheet_url`, the stylesheet's own
/// location. URLs inside `@font-face` blocks, and any URL with a font
/// extension, are fonts; the rest are images.
pub fn extract_from_css(css: &str, sheet_url: &Url, canonicalizer: &Canonicalizer) -> CssReferences {
    let mut references = CssReferences::default();
    let mut seen = HashSet::new();

    for caps in CSS_IMPORT_RE.captures_iter(css) {
        let Some(raw) = caps.get(1) else { continue };
        if let Some(url) = resolve_asset(raw.as_str(), sheet_url, canonicalizer) {
            if seen.insert(url.as_str().to_string()) {
                references.imports.push(url);
            }
        }
    }

    let font_blocks: Vec<(usize, usize)> = FONT_FACE_RE
        .find_iter(css)
        .map(|m| (m.start(), m.end()))
        .collect();

    for caps in CSS_URL_RE.captures_iter(css) {
        let Some(raw) = caps.get(1).or(caps.get(2)).or(caps.get(3)) else {
            continue;
        };
        let Some(url) = resolve_asset(raw.as_str(), sheet_url, canonicalizer) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let at = raw.start();
        let in_font_face = font_blocks.iter().any(|(s, e)| at >= *s && at < *e);
        let kind = match classify_by_extension(url.as_url()) {
            Some(AssetKind::Font) => AssetKind::Font,
            Some(AssetKind::Stylesheet) => {
                references.imports.push(url);
                continue;
            }
            _ if in_font_face => AssetKind::Font,
            _ => AssetKind::Image,
        };
        references.assets.push(AssetReference { url, kind });
    }

    references
}

/// Raw values of every `url(...)` in a CSS fragment
pub(crate) fn css_urls(css: &str) -> Vec<String> {
    CSS_URL_RE
        .captures_iter(css)
        .filter_map(|caps| caps.get(1).or(caps.get(2)).or(caps.get(3)))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// URL and descriptor of each `srcset` candidate
///
/// A URL runs to the next whitespace, so commas inside it (`w_400,h_300`)
/// survive; a comma right after the URL ends a candidate without
/// descriptor.
pub(crate) fn srcset_candidates(srcset: &str) -> Vec<(&str, &str)> {
    let mut candidates = Vec::new();
    let mut rest = srcset;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let url = &rest[..url_end];
        rest = &rest[url_end..];

        let bare = url.trim_end_matches(',');
        if bare.len() < url.len() {
            if !bare.is_empty() {
                candidates.push((bare, ""));
            }
            continue;
        }

        let descriptor_end = rest.find(',').unwrap_or(rest.len());
        candidates.push((url, rest[..descriptor_end].trim()));
        rest = &rest[descriptor_end..];
    }

    candidates
}

/// URLs of a `srcset` value, descriptors dropped
pub(crate) fn srcset_urls(srcset: &str) -> Vec<&str> {
    srcset_candidates(srcset)
        .into_iter()
        .map(|(url, _)| url)
        .collect()
}

fn resolve_asset(raw: &str, base: &Url, canonicalizer: &Canonicalizer) -> Option<CanonicalUrl> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.to_ascii_lowercase().starts_with("data:") {
        return None;
    }

    let url = canonicalizer.resolve(raw, base)?;
    is_fetchable(url.as_url()).then_some(url)
}

fn select<'d>(document: &'d Html, selector: &str) -> Vec<ElementRef<'d>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn collect_images(document: &Html, collector: &mut Collector) {
    for element in select(document, "img, source") {
        let el = element.value();
        if let Some(src) = el.attr("src") {
            collector.push(src, Some(AssetKind::Image));
        }
        if let Some(srcset) = el.attr("srcset") {
            for url in srcset_urls(srcset) {
                collector.push(url, Some(AssetKind::Image));
            }
        }
    }

    for attr in LAZY_IMAGE_ATTRIBUTES.iter().chain(BACKGROUND_ATTRIBUTES) {
        for element in select(document, &format!("[{attr}]")) {
            if let Some(value) = element.value().attr(attr) {
                // data-bg sometimes holds a full `url(...)` declaration
                let urls = css_urls(value);
                if urls.is_empty() {
                    collector.push(value, Some(AssetKind::Image));
                } else {
                    for url in urls {
                        collector.push(&url, Some(AssetKind::Image));
                    }
                }
            }
        }
    }

    for attr in LAZY_SRCSET_ATTRIBUTES {
        for element in select(document, &format!("[{attr}]")) {
            if let Some(srcset) = element.value().attr(attr) {
                for url in srcset_urls(srcset) {
                    collector.push(url, Some(AssetKind::Image));
                }
            }
        }
    }

    for element in select(document, "video[poster]") {
        if let Some(poster) = element.value().attr("poster") {
            collector.push(poster, Some(AssetKind::Image));
        }
    }

    for element in select(document, "meta[content]") {
        let el = element.value();
        let key = el
            .attr("property")
            .or_else(|| el.attr("name"))
            .unwrap_or_default()
            .to_ascii_lowercase();
        if key.starts_with("og:image") || key.starts_with("twitter:image") {
            if let Some(content) = el.attr("content") {
                collector.push(content, Some(AssetKind::Image));
            }
        }
    }
}

fn collect_links(document: &Html, collector: &mut Collector) {
    for element in select(document, "link[href]") {
        let el = element.value();
        let Some(href) = el.attr("href") else { continue };
        let rel = el.attr("rel").unwrap_or_default().to_ascii_lowercase();
        let rels: Vec<&str> = rel.split_whitespace().collect();

        if rels.contains(&"stylesheet") || is_google_fonts_css(href) {
            collector.push(href, Some(AssetKind::Stylesheet));
        } else if rels
            .iter()
            .any(|r| matches!(*r, "icon" | "apple-touch-icon" | "apple-touch-icon-precomposed"))
        {
            collector.push(href, Some(AssetKind::Image));
        } else if rels.contains(&"preload") {
            let kind = match el.attr("as").unwrap_or_default() {
                "font" => Some(AssetKind::Font),
                "image" => Some(AssetKind::Image),
                "style" => Some(AssetKind::Stylesheet),
                "script" => Some(AssetKind::Script),
                _ => None,
            };
            if let Some(kind) = kind {
                collector.push(href, Some(kind));
            }
        }
    }

    for element in select(document, "script[src]") {
        if let Some(src) = element.value().attr("src") {
            collector.push(src, Some(AssetKind::Script));
        }
    }
}

fn is_google_fonts_css(href: &str) -> bool {
    href.contains("fonts.googleapis.com/css")
}

/// Accumulates references
///
/// Every exact spelling is kept once; later spellings of a dedup key take
/// the kind of the first one.
struct Collector<'a> {
    base: &'a Url,
    canonicalizer: &'a Canonicalizer,
    kinds: HashMap<String, AssetKind>,
    spellings: HashSet<String>,
    found: Vec<AssetReference>,
}

impl<'a> Collector<'a> {
    fn new(base: &'a Url, canonicalizer: &'a Canonicalizer) -> Self {
        Self {
            base,
            canonicalizer,
            kinds: HashMap::new(),
            spellings: HashSet::new(),
            found: Vec::new(),
        }
    }

    /// Adds a raw reference; without a kind hint the extension decides and
    /// unknown extensions are dropped
    fn push(&mut self, raw: &str, kind: Option<AssetKind>) {
        let Some(url) = resolve_asset(raw, self.base, self.canonicalizer) else {
            return;
        };
        let kind = match kind {
            Some(kind) => kind,
            None => match classify_by_extension(url.as_url()) {
                Some(kind) => kind,
                None => return,
            },
        };
        self.push_url(url, kind);
    }

    fn push_url(&mut self, url: CanonicalUrl, kind: AssetKind) {
        if !self.spellings.insert(url.as_str().to_string()) {
            return;
        }
        let kind = *self
            .kinds
            .entry(strip_query_and_fragment(url.as_str()))
            .or_insert(kind);
        self.found.push(AssetReference { url, kind });
    }

    fn finish(self) -> Vec<AssetReference> {
        self.found
    }
}

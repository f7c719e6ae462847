//! Stylesheet rewriting and consolidation

use crate::assets::{AssetKind, AssetMap, FetchedStylesheet, CSS_IMPORT_RE, CSS_URL_RE};
use crate::url::Canonicalizer;
use regex::Captures;
use url::Url;

/// Prefix from `assets/css/` back to the mirror root
pub const STYLESHEET_ROOT_PREFIX: &str = "../../";

/// Rewrites every `url(...)` of a CSS fragment to its local path
///
/// References are resolved against `source`, the URL of the document the
/// CSS came from, and looked up in `assets`. `prefix` is prepended to the
/// mirror-relative path: empty for CSS inside pages, [`STYLESHEET_ROOT_PREFIX`]
/// for the consolidated stylesheet. The original quoting is kept; references
/// without a local copy are left as written.
pub fn rewrite_css(
    css: &str,
    source: &Url,
    assets: &AssetMap,
    canonicalizer: &Canonicalizer,
    prefix: &str,
) -> String {
    CSS_URL_RE
        .replace_all(css, |caps: &Captures| {
            let (raw, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => (m.as_str(), "\""),
                (_, Some(m), _) => (m.as_str(), "'"),
                (_, _, Some(m)) => (m.as_str(), ""),
                _ => return caps[0].to_string(),
            };

            match assets.lookup(raw, source, canonicalizer) {
                Some(entry) if entry.kind != AssetKind::Stylesheet => {
                    format!("url({quote}{prefix}{}{quote})", entry.local_path)
                }
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Removes `@import` rules whose target was fetched into the consolidated
/// stylesheet
pub fn strip_consolidated_imports(
    css: &str,
    source: &Url,
    assets: &AssetMap,
    canonicalizer: &Canonicalizer,
) -> String {
    CSS_IMPORT_RE
        .replace_all(css, |caps: &Captures| {
            match assets.lookup(&caps[1], source, canonicalizer) {
                Some(entry) if entry.kind == AssetKind::Stylesheet => String::new(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Builds the consolidated stylesheet
///
/// Every fetched stylesheet is rewritten against its own URL and appended in
/// discovery order under a comment naming its source.
pub fn consolidate(
    sheets: &[FetchedStylesheet],
    assets: &AssetMap,
    canonicalizer: &Canonicalizer,
) -> String {
    let mut out = String::new();

    for sheet in sheets {
        let source = sheet.url.as_url();
        let css = strip_consolidated_imports(&sheet.css, source, assets, canonicalizer);
        let css = rewrite_css(&css, source, assets, canonicalizer, STYLESHEET_ROOT_PREFIX);

        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("/* {} */\n", source));
        out.push_str(css.trim_end());
        out.push('\n');
    }

    out
}

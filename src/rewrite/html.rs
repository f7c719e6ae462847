//! HTML document rewriting
//!
//! Streams each page through `lol_html`, replacing asset references with
//! local paths and internal anchors with local page files. Only references
//! that resolve to something in the maps are touched, and every replacement
//! is a local path that no lookup matches, so a second pass changes nothing.

use super::css::rewrite_css;
use super::links::{rewrite_href, UrlToLocalPath};
use super::placeholder::{plan_image, rewrite_srcset, ImagePlan};
use crate::assets::{
    css_urls, AssetKind, AssetMap, BACKGROUND_ATTRIBUTES, LAZY_IMAGE_ATTRIBUTES,
    LAZY_SRCSET_ATTRIBUTES,
};
use crate::url::{strip_query_and_fragment, Canonicalizer, Origin};
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HtmlRewriter, Settings};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Absolute URLs inside script bodies, including the JSON-escaped `https:\/\/` form
static SCRIPT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?:(?:\\?/){2}(?:[^\s"'`<>()\\]|\\/)+"#)
        .expect("hardcoded regex pattern is valid")
});

/// Meta tags whose `content` is an image URL
const IMAGE_META_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
];

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("HTML rewrite error: {0}")]
    Html(String),

    #[error("Rewritten HTML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Rewrites pages against the finished asset and page maps
pub struct DocumentRewriter<'a> {
    assets: &'a AssetMap,
    pages: &'a UrlToLocalPath,
    canonicalizer: &'a Canonicalizer,
    origin: &'a Origin,
    stylesheet: Option<&'a str>,
}

impl<'a> DocumentRewriter<'a> {
    pub fn new(
        assets: &'a AssetMap,
        pages: &'a UrlToLocalPath,
        canonicalizer: &'a Canonicalizer,
        origin: &'a Origin,
    ) -> Self {
        Self {
            assets,
            pages,
            canonicalizer,
            origin,
            stylesheet: None,
        }
    }

    /// Points the first downloaded stylesheet link of each page at `href`
    /// and drops the others
    pub fn with_stylesheet(mut self, href: &'a str) -> Self {
        self.stylesheet = Some(href);
        self
    }

    /// Rewrites one page
    ///
    /// `page_url` is the page's own URL; every relative reference in the
    /// document is resolved against it.
    pub fn rewrite(&self, html: &str, page_url: &Url) -> Result<String, RewriteError> {
        let mut output = Vec::with_capacity(html.len());
        let mut stylesheet_linked = false;
        let mut style_buffer = String::new();
        let mut script_buffer = String::new();

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("img", |el| self.rewrite_image(el, page_url)),
                    element!("source", |el| {
                        self.rewrite_attribute(el, "src", page_url)?;
                        self.rewrite_srcsets(el, page_url, false)
                    }),
                    element!("video[poster]", |el| {
                        self.rewrite_attribute(el, "poster", page_url)
                    }),
                    element!("meta[content]", |el| self.rewrite_meta(el, page_url)),
                    element!("link[href]", |el| {
                        self.rewrite_link(el, page_url, &mut stylesheet_linked)
                    }),
                    element!("script[src]", |el| {
                        self.rewrite_attribute(el, "src", page_url)
                    }),
                    element!("a[href]", |el| {
                        if let Some(href) = el.get_attribute("href") {
                            if let Some(local) = rewrite_href(
                                &href,
                                page_url,
                                self.origin,
                                self.pages,
                                self.canonicalizer,
                            ) {
                                el.set_attribute("href", &local)?;
                            }
                        }
                        Ok(())
                    }),
                    element!(
                        "[data-bg], [data-background], [data-background-image], [data-bg-src]",
                        |el| self.rewrite_background(el, page_url)
                    ),
                    element!("[style]", |el| {
                        if let Some(style) = el.get_attribute("style") {
                            let rewritten =
                                rewrite_css(&style, page_url, self.assets, self.canonicalizer, "");
                            if rewritten != style {
                                el.set_attribute("style", &rewritten)?;
                            }
                        }
                        Ok(())
                    }),
                    text!("style", |t| {
                        style_buffer.push_str(t.as_str());
                        if t.last_in_text_node() {
                            let css = rewrite_css(
                                &style_buffer,
                                page_url,
                                self.assets,
                                self.canonicalizer,
                                "",
                            );
                            t.replace(&css, ContentType::Html);
                            style_buffer.clear();
                        } else {
                            t.remove();
                        }
                        Ok(())
                    }),
                    text!("script", |t| {
                        script_buffer.push_str(t.as_str());
                        if t.last_in_text_node() {
                            let js = self.substitute_script_urls(&script_buffer);
                            t.replace(&js, ContentType::Html);
                            script_buffer.clear();
                        } else {
                            t.remove();
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| RewriteError::Html(e.to_string()))?;
        rewriter
            .end()
            .map_err(|e| RewriteError::Html(e.to_string()))?;

        Ok(String::from_utf8(output)?)
    }

    /// Local path of a downloaded image, font or script
    fn local_path(&self, raw: &str, base: &Url) -> Option<String> {
        self.assets
            .lookup(raw, base, self.canonicalizer)
            .filter(|entry| entry.kind != AssetKind::Stylesheet)
            .map(|entry| entry.local_path.clone())
    }

    fn rewrite_attribute(&self, el: &mut Element<'_, '_>, name: &str, base: &Url) -> HandlerResult {
        if let Some(value) = el.get_attribute(name) {
            if let Some(local) = self.local_path(&value, base) {
                el.set_attribute(name, &local)?;
            }
        }
        Ok(())
    }

    fn rewrite_image(&self, el: &mut Element<'_, '_>, base: &Url) -> HandlerResult {
        let src = el.get_attribute("src");
        let lazy: Vec<String> = LAZY_IMAGE_ATTRIBUTES
            .iter()
            .filter_map(|attr| el.get_attribute(attr))
            .collect();

        let plan = plan_image(
            src.as_deref(),
            &lazy,
            self.canonicalizer.heuristics(),
            |raw| self.local_path(raw, base),
            |raw| self.canonicalizer.resolve(raw, base).map(|u| u.to_string()),
        );

        let promoted = matches!(plan, ImagePlan::Promote { .. });
        match plan {
            ImagePlan::Promote { src } => {
                el.set_attribute("src", &src)?;
                for attr in LAZY_IMAGE_ATTRIBUTES {
                    el.remove_attribute(attr);
                }
            }
            ImagePlan::Rewrite { src } => el.set_attribute("src", &src)?,
            ImagePlan::Keep => {}
        }

        if !promoted {
            for attr in LAZY_IMAGE_ATTRIBUTES {
                self.rewrite_attribute(el, attr, base)?;
            }
        }

        self.rewrite_srcsets(el, base, promoted)
    }

    /// Rewrites `srcset` and its lazy variants
    ///
    /// A lazy `srcset` replaces the real one when the image was promoted or
    /// has no `srcset` of its own.
    fn rewrite_srcsets(&self, el: &mut Element<'_, '_>, base: &Url, promote: bool) -> HandlerResult {
        let local = |raw: &str| self.local_path(raw, base);

        if let Some(srcset) = el.get_attribute("srcset") {
            if let Some(rewritten) = rewrite_srcset(&srcset, local) {
                el.set_attribute("srcset", &rewritten)?;
            }
        }

        for attr in LAZY_SRCSET_ATTRIBUTES {
            let Some(value) = el.get_attribute(attr) else {
                continue;
            };
            let rewritten = rewrite_srcset(&value, local);

            if promote || !el.has_attribute("srcset") {
                el.set_attribute("srcset", rewritten.as_deref().unwrap_or(&value))?;
                el.remove_attribute(attr);
            } else if let Some(rewritten) = rewritten {
                el.set_attribute(attr, &rewritten)?;
            }
        }

        Ok(())
    }

    fn rewrite_meta(&self, el: &mut Element<'_, '_>, base: &Url) -> HandlerResult {
        let key = el
            .get_attribute("property")
            .or_else(|| el.get_attribute("name"))
            .unwrap_or_default()
            .to_ascii_lowercase();

        if IMAGE_META_KEYS.contains(&key.as_str()) {
            self.rewrite_attribute(el, "content", base)?;
        }
        Ok(())
    }

    fn rewrite_link(
        &self,
        el: &mut Element<'_, '_>,
        base: &Url,
        stylesheet_linked: &mut bool,
    ) -> HandlerResult {
        let Some(href) = el.get_attribute("href") else {
            return Ok(());
        };
        let Some(entry) = self.assets.lookup(&href, base, self.canonicalizer) else {
            return Ok(());
        };

        if entry.kind != AssetKind::Stylesheet {
            el.set_attribute("href", &entry.local_path)?;
            return Ok(());
        }

        let Some(consolidated) = self.stylesheet else {
            return Ok(());
        };

        if *stylesheet_linked {
            el.remove();
        } else {
            el.set_attribute("rel", "stylesheet")?;
            el.set_attribute("href", consolidated)?;
            for stale in ["as", "integrity", "media", "onload"] {
                el.remove_attribute(stale);
            }
            *stylesheet_linked = true;
        }
        Ok(())
    }

    /// Rewrites background data attributes and mirrors the first one into
    /// an inline `background-image`
    fn rewrite_background(&self, el: &mut Element<'_, '_>, base: &Url) -> HandlerResult {
        let mut image = None;

        for attr in BACKGROUND_ATTRIBUTES {
            let Some(value) = el.get_attribute(attr) else {
                continue;
            };
            let raw = css_urls(&value)
                .into_iter()
                .next()
                .unwrap_or_else(|| value.trim().to_string());
            let Some(local) = self.local_path(&raw, base) else {
                continue;
            };

            let rewritten = if value.contains("url(") {
                rewrite_css(&value, base, self.assets, self.canonicalizer, "")
            } else {
                local.clone()
            };
            el.set_attribute(attr, &rewritten)?;
            image.get_or_insert(local);
        }

        if let Some(local) = image {
            let style = el.get_attribute("style").unwrap_or_default();
            let style = style.trim().trim_end_matches(';');
            let declaration = format!("background-image: url('{local}')");
            let style = if style.is_empty() {
                declaration
            } else {
                format!("{style}; {declaration}")
            };
            el.set_attribute("style", &style)?;
        }
        Ok(())
    }

    /// Replaces literal absolute asset URLs in a script body
    fn substitute_script_urls(&self, js: &str) -> String {
        SCRIPT_URL_RE
            .replace_all(js, |caps: &Captures| {
                let found = &caps[0];
                let escaped = found.contains("\\/");
                let url = found.replace("\\/", "/");

                let entry = self
                    .assets
                    .get(&url)
                    .or_else(|| self.assets.get(&strip_query_and_fragment(&url)));
                match entry {
                    Some(entry) if entry.kind != AssetKind::Stylesheet => {
                        if escaped {
                            entry.local_path.replace('/', "\\/")
                        } else {
                            entry.local_path.clone()
                        }
                    }
                    _ => found.to_string(),
                }
            })
            .into_owned()
    }
}

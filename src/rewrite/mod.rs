//! Rewriting engine
//!
//! Runs after every page is crawled and every asset downloaded. Pages and
//! the consolidated stylesheet are rewritten against the finished
//! [`AssetMap`](crate::assets::AssetMap) and [`UrlToLocalPath`]; nothing is
//! fetched here.

mod css;
mod html;
mod links;
mod placeholder;

pub use css::{consolidate, rewrite_css, strip_consolidated_imports, STYLESHEET_ROOT_PREFIX};
pub use html::{DocumentRewriter, RewriteError};
pub use links::{page_slug, rewrite_href, UrlToLocalPath};
pub use placeholder::{plan_image, rewrite_srcset, ImagePlan};

use crate::crawler::Page;
use crate::output::JobLog;

/// Rewrites every page in place
///
/// A page whose markup cannot be rewritten keeps its original HTML and the
/// failure is logged; the other pages are unaffected.
///
/// # Returns
///
/// The number of pages rewritten
pub fn rewrite_pages(pages: &mut [Page], rewriter: &DocumentRewriter<'_>, log: &JobLog) -> usize {
    let mut rewritten = 0;

    for page in pages.iter_mut() {
        match rewriter.rewrite(&page.html, page.url.as_url()) {
            Ok(html) => {
                page.html = html;
                rewritten += 1;
            }
            Err(e) => {
                tracing::warn!("Leaving {} as fetched: {}", page.url, e);
                log.warn(format!("Could not rewrite {}: {}", page.url, e));
            }
        }
    }

    rewritten
}

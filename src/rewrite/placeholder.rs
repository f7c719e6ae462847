//! Placeholder promotion for lazy-loaded images
//!
//! Lazy loaders ship a dummy `src` (a spacer GIF, a data URI, a "loading"
//! spinner) and keep the real image in a data attribute for a script to
//! swap in. The mirror must show the real image without that script.

use crate::assets::srcset_candidates;
use crate::config::Heuristics;

/// What to do with an `<img>`'s `src` and lazy attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePlan {
    /// Replace `src` and drop every lazy attribute
    Promote { src: String },
    /// Replace `src`, leave the lazy attributes to be rewritten individually
    Rewrite { src: String },
    /// Nothing to change on `src`
    Keep,
}

/// Decides the final `src` of an image
///
/// `lazy` holds the values of the element's lazy-load attributes in
/// priority order. `local` maps a raw reference to its local path when the
/// asset was downloaded; `absolute` resolves a raw reference to an absolute
/// URL.
///
/// A missing, empty or placeholder `src` is promoted from the first lazy
/// value, preferring one whose asset was downloaded; if none was, the remote
/// URL is promoted so the image still shows.
pub fn plan_image<L, A>(
    src: Option<&str>,
    lazy: &[String],
    heuristics: &Heuristics,
    local: L,
    absolute: A,
) -> ImagePlan
where
    L: Fn(&str) -> Option<String>,
    A: Fn(&str) -> Option<String>,
{
    let src_is_placeholder = src.map_or(true, |s| heuristics.is_placeholder(s));
    let lazy: Vec<&String> = lazy
        .iter()
        .filter(|v| !heuristics.is_placeholder(v))
        .collect();

    if src_is_placeholder && !lazy.is_empty() {
        if let Some(src) = lazy.iter().find_map(|v| local(v)) {
            return ImagePlan::Promote { src };
        }
        if let Some(src) = lazy.iter().find_map(|v| absolute(v)) {
            return ImagePlan::Promote { src };
        }
    }

    match src.and_then(local) {
        Some(src) => ImagePlan::Rewrite { src },
        None => ImagePlan::Keep,
    }
}

/// Rewrites each candidate of a `srcset`, keeping width/density descriptors
///
/// Returns `None` when no candidate changed.
pub fn rewrite_srcset<L>(srcset: &str, local: L) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    let mut changed = false;
    let candidates: Vec<String> = srcset_candidates(srcset)
        .into_iter()
        .map(|(url, descriptor)| {
            let url = match local(url) {
                Some(path) => {
                    changed = true;
                    path
                }
                None => url.to_string(),
            };
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect();

    changed.then(|| candidates.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeuristicsConfig;

    fn heuristics() -> Heuristics {
        Heuristics::compile(&HeuristicsConfig::default()).unwrap()
    }

    fn local(raw: &str) -> Option<String> {
        match raw {
            "https://example.com/hero.jpg" | "/hero.jpg" => Some("assets/images/hero.jpg".into()),
            "/a-480.jpg" => Some("assets/images/a-480.jpg".into()),
            "loading.gif" => Some("assets/images/loading.gif".into()),
            _ => None,
        }
    }

    fn absolute(raw: &str) -> Option<String> {
        Some(format!("https://example.com/{}", raw.trim_start_matches('/')))
    }

    #[test]
    fn test_placeholder_promoted_from_lazy_attribute() {
        let plan = plan_image(
            Some("loading.gif"),
            &["https://example.com/hero.jpg".to_string()],
            &heuristics(),
            local,
            absolute,
        );
        assert_eq!(
            plan,
            ImagePlan::Promote {
                src: "assets/images/hero.jpg".to_string()
            }
        );
    }

    #[test]
    fn test_missing_src_promoted() {
        let plan = plan_image(None, &["/hero.jpg".to_string()], &heuristics(), local, absolute);
        assert!(matches!(plan, ImagePlan::Promote { .. }));
    }

    #[test]
    fn test_undownloaded_lazy_source_promoted_remote() {
        let plan = plan_image(
            Some("data:image/gif;base64,R0lGOD"),
            &["/gallery/1.jpg".to_string()],
            &heuristics(),
            local,
            absolute,
        );
        assert_eq!(
            plan,
            ImagePlan::Promote {
                src: "https://example.com/gallery/1.jpg".to_string()
            }
        );
    }

    #[test]
    fn test_real_src_rewritten_not_promoted() {
        let plan = plan_image(Some("/hero.jpg"), &[], &heuristics(), local, absolute);
        assert_eq!(
            plan,
            ImagePlan::Rewrite {
                src: "assets/images/hero.jpg".to_string()
            }
        );

        let plan = plan_image(Some("/unknown.jpg"), &[], &heuristics(), local, absolute);
        assert_eq!(plan, ImagePlan::Keep);
    }

    #[test]
    fn test_rewrite_srcset_keeps_descriptors() {
        assert_eq!(
            rewrite_srcset("/a-480.jpg 480w, /a-960.jpg 960w", local),
            Some("assets/images/a-480.jpg 480w, /a-960.jpg 960w".to_string())
        );
        assert_eq!(rewrite_srcset("/x.jpg 1x", local), None);
    }

    #[test]
    fn test_rewrite_srcset_keeps_commas_inside_urls() {
        let local = |raw: &str| {
            (raw == "https://cdn.example.com/w_400,h_300/x.jpg")
                .then(|| "assets/images/x.jpg".to_string())
        };
        assert_eq!(
            rewrite_srcset(
                "https://cdn.example.com/w_400,h_300/x.jpg 1x, https://cdn.example.com/w_800,h_600/x.jpg 2x",
                local
            ),
            Some("assets/images/x.jpg 1x, https://cdn.example.com/w_800,h_600/x.jpg 2x".to_string())
        );
    }
}

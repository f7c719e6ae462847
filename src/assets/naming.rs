//! Deterministic local file names for downloaded assets

use super::AssetKind;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Longest stem kept before the hashing fallback kicks in
const MAX_STEM_LEN: usize = 60;

/// Stem length kept in front of the hash when a name is truncated
const TRUNCATED_STEM_LEN: usize = 48;

/// Hands out collision-free paths under `assets/<kind>/`
#[derive(Debug, Default)]
pub struct AssetNamer {
    used: HashSet<String>,
}

impl AssetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local path for an asset, relative to the mirror root
    ///
    /// The name comes from the last path segment of `url`, sanitized to
    /// `[A-Za-z0-9._-]`. The extension is taken from the path, else from
    /// `content_type`, else from the kind. A name already handed out gets
    /// a hash of the full URL appended.
    pub fn assign(&mut self, url: &Url, kind: AssetKind, content_type: Option<&str>) -> String {
        let (stem, ext) = file_name_parts(url, kind, content_type);

        let mut path = format!("assets/{}/{}.{}", kind.directory(), stem, ext);
        if self.used.contains(&path) {
            path = format!(
                "assets/{}/{}-{}.{}",
                kind.directory(),
                stem,
                short_hash(url.as_str()),
                ext
            );
        }

        self.used.insert(path.clone());
        path
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `-`, collapsing
/// runs and trimming `-` and `.` from both ends
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    out.trim_matches(['-', '.']).to_string()
}

fn file_name_parts(url: &Url, kind: AssetKind, content_type: Option<&str>) -> (String, String) {
    let segment = url
        .path_segments()
        .and_then(|mut s| s.rfind(|seg| !seg.is_empty()))
        .unwrap_or_default();
    let sanitized = sanitize_file_name(segment);

    let (stem, path_ext) = match sanitized.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem.to_string(), Some(ext.to_ascii_lowercase()))
        }
        _ => (sanitized.clone(), None),
    };

    let ext = match kind {
        AssetKind::Stylesheet => "css".to_string(),
        AssetKind::Script => path_ext.unwrap_or_else(|| "js".to_string()),
        _ => path_ext
            .or_else(|| content_type.and_then(extension_for_content_type).map(str::to_string))
            .unwrap_or_else(|| kind.default_extension().to_string()),
    };

    let stem = if stem.is_empty() {
        "asset".to_string()
    } else if stem.len() > MAX_STEM_LEN {
        format!("{}-{}", &stem[..TRUNCATED_STEM_LEN], short_hash(url.as_str()))
    } else {
        stem
    };

    (stem, ext)
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match mime.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "font/woff2" | "application/font-woff2" => "woff2",
        "font/woff" | "application/font-woff" => "woff",
        "font/ttf" | "application/x-font-ttf" | "application/font-sfnt" => "ttf",
        "font/otf" | "application/x-font-otf" => "otf",
        "application/vnd.ms-fontobject" => "eot",
        "text/css" => "css",
        "text/javascript" | "application/javascript" | "application/x-javascript" => "js",
        _ => return None,
    };
    Some(ext)
}

/// First 8 hex characters of the SHA-256 of `input`
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("hero image (1).JPG"), "hero-image-1-.JPG");
        assert_eq!(sanitize_file_name("a%20b.png"), "a-20b.png");
        assert_eq!(sanitize_file_name("..hidden"), "hidden");
        assert_eq!(sanitize_file_name("???"), "");
    }

    #[test]
    fn test_name_from_path() {
        let mut namer = AssetNamer::new();
        assert_eq!(
            namer.assign(&url("https://example.com/img/Hero.JPG?w=800"), AssetKind::Image, None),
            "assets/images/Hero.jpg"
        );
        assert_eq!(
            namer.assign(&url("https://example.com/fonts/x.woff2"), AssetKind::Font, None),
            "assets/fonts/x.woff2"
        );
    }

    #[test]
    fn test_extension_from_content_type() {
        let mut namer = AssetNamer::new();
        assert_eq!(
            namer.assign(
                &url("https://cdn.example.com/image/upload/abc123"),
                AssetKind::Image,
                Some("image/webp; charset=binary")
            ),
            "assets/images/abc123.webp"
        );
        assert_eq!(
            namer.assign(
                &url("https://fonts.googleapis.com/css2?family=Inter"),
                AssetKind::Stylesheet,
                Some("text/css")
            ),
            "assets/css/css2.css"
        );
    }

    #[test]
    fn test_collision_gets_hash_suffix() {
        let mut namer = AssetNamer::new();
        let first = namer.assign(&url("https://example.com/a/logo.png"), AssetKind::Image, None);
        let second = namer.assign(&url("https://example.com/b/logo.png"), AssetKind::Image, None);

        assert_eq!(first, "assets/images/logo.png");
        assert_ne!(first, second);
        assert!(second.starts_with("assets/images/logo-"));
        assert!(second.ends_with(".png"));
    }

    #[test]
    fn test_long_names_truncated_deterministically() {
        let long = format!("https://example.com/{}.png", "x".repeat(120));
        let a = AssetNamer::new().assign(&url(&long), AssetKind::Image, None);
        let b = AssetNamer::new().assign(&url(&long), AssetKind::Image, None);

        assert_eq!(a, b);
        assert!(a.len() < 90);
    }

    #[test]
    fn test_root_path_falls_back_to_asset() {
        let mut namer = AssetNamer::new();
        assert_eq!(
            namer.assign(&url("https://example.com/"), AssetKind::Script, None),
            "assets/js/asset.js"
        );
    }
}

//! Plain-directory packaging

use crate::assets::CONSOLIDATED_STYLESHEET;
use crate::output::traits::{MirrorOutput, OutputError, OutputResult, Packager};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Writes the mirror into a directory
///
/// Pages land at the root under their local file names and assets under
/// `assets/{css,images,fonts,js}/`, which is the layout every rewritten
/// reference assumes.
#[derive(Debug, Clone)]
pub struct DirectoryPackager {
    root: PathBuf,
}

impl DirectoryPackager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, relative: &str, contents: &[u8]) -> OutputResult<()> {
        let path = safe_join(&self.root, relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        tracing::trace!("Wrote {}", path.display());
        Ok(())
    }
}

impl Packager for DirectoryPackager {
    fn package(&self, output: &MirrorOutput) -> OutputResult<usize> {
        fs::create_dir_all(&self.root)?;
        let mut written = 0;

        for page in &output.pages {
            self.write(&page.file, page.html.as_bytes())?;
            written += 1;
        }

        for asset in &output.stored_assets {
            self.write(&asset.local_path, &asset.bytes)?;
            written += 1;
        }

        if let Some(css) = &output.stylesheet {
            self.write(CONSOLIDATED_STYLESHEET, css.as_bytes())?;
            written += 1;
        }

        tracing::info!("Wrote {} files to {}", written, self.root.display());
        Ok(written)
    }
}

/// Joins a mirror-relative path onto `root`, refusing anything that would
/// escape it
fn safe_join(root: &Path, relative: &str) -> OutputResult<PathBuf> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if escapes || relative.as_os_str().is_empty() {
        return Err(OutputError::Write(format!(
            "refusing to write outside the mirror: {}",
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

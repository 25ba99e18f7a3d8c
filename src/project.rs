//! Project input handling: a CUTS project is either a ZIP archive holding
//! `manifest.json` + `assets/`, or an already-extracted directory with the
//! same layout.

use crate::manifest::Manifest;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;
use zip::ZipArchive;

/// An opened project. When the input was a ZIP the extracted tree lives in
/// a temporary directory that removes itself when the project is dropped.
pub struct Project {
    pub manifest: Manifest,
    pub assets_dir: PathBuf,
    root: PathBuf,
    extracted: Option<TempDir>,
}

impl Project {
    /// Opens a project from a `.zip` file or a directory. Fails when the
    /// input or its `manifest.json` is missing; these are planning errors
    /// and abort before any rendering starts.
    pub async fn open(input: &Path) -> Result<Self> {
        let is_zip = input
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

        let (root, extracted) = if is_zip {
            if !input.is_file() {
                bail!("Project ZIP not found: {}", input.display());
            }
            let dir = extract_zip(input)?;
            let root = dir.path().to_path_buf();
            (root, Some(dir))
        } else {
            if !input.is_dir() {
                bail!("Project directory not found: {}", input.display());
            }
            (input.to_path_buf(), None)
        };

        let manifest_path = root.join("manifest.json");
        if !manifest_path.is_file() {
            bail!("manifest.json not found in project: {}", input.display());
        }
        let manifest = Manifest::load(&manifest_path).await?;

        // Older exports keep assets next to the manifest instead of under
        // assets/.
        let assets_dir = {
            let preferred = root.join("assets");
            if preferred.is_dir() { preferred } else { root.clone() }
        };

        Ok(Self {
            manifest,
            assets_dir,
            root,
            extracted,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keeps the extracted ZIP contents on disk instead of removing them
    /// on drop. No effect for directory inputs.
    pub fn keep_extracted(&mut self) {
        if let Some(dir) = self.extracted.take() {
            let kept = dir.keep();
            info!("Keeping extracted project at {}", kept.display());
        }
    }
}

fn extract_zip(path: &Path) -> Result<TempDir> {
    let dir = TempDir::with_prefix("cuts_mock_")
        .context("Failed to create extraction directory")?;
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open ZIP: {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Invalid ZIP: {}", path.display()))?;
    archive
        .extract(dir.path())
        .with_context(|| format!("Failed to extract ZIP: {}", path.display()))?;
    Ok(dir)
}

/// Appends `.mp4` when the requested output name carries no extension at
/// all, so the engine can pick a container. A present but unusual
/// extension is passed through untouched.
pub fn normalize_output_path(path: PathBuf) -> PathBuf {
    let name_has_dot = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains('.'));
    if name_has_dot {
        path
    } else {
        path.with_extension("mp4")
    }
}

/// Derives the default output path: the project's base name plus a fixed
/// `_mock.mp4` suffix, in the current directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = if input.extension().is_some_and(|e| e.eq_ignore_ascii_case("zip")) {
        input.file_stem()
    } else {
        input.file_name()
    };
    let base = stem.and_then(|s| s.to_str()).unwrap_or("project");
    PathBuf::from(format!("{base}_mock.mp4"))
}

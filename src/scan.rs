//! Source tree discovery.
//!
//! ```text
//! galleries/                       # source root
//! ├── config.toml                  # site config (optional)
//! ├── 20240715/                    # gallery: any directory with gallery.yaml
//! │   ├── gallery.yaml
//! │   ├── sunset.jpg
//! │   ├── sunset.yaml              # optional image sidecar
//! │   └── harbour.png
//! ├── 20231102/
//! │   └── ...
//! └── drafts/                      # no gallery.yaml: ignored
//! ```
//!
//! The directory name is the gallery id. Only the top level of each gallery
//! is read; hidden entries are skipped everywhere. Images are recognised by
//! extension, using the set the imaging backend can actually decode.

use crate::gallery::GALLERY_FILE;
use crate::imaging::supported_input_extensions;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot read {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("gallery directory name is not valid UTF-8: {}", .0.display())]
    InvalidName(PathBuf),
}

/// A gallery directory and the source images found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct GallerySource {
    /// Directory name; the public path segment.
    pub id: String,
    pub dir: PathBuf,
    /// Image files, sorted by filename.
    pub images: Vec<PathBuf>,
}

/// Find every gallery under `root`, sorted by id.
pub fn discover_galleries(root: &Path) -> Result<Vec<GallerySource>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::SourceNotFound(root.to_path_buf()));
    }
    let mut galleries = Vec::new();
    for dir in top_level(root, |e| e.file_type().is_dir())? {
        if !dir.join(GALLERY_FILE).is_file() {
            continue;
        }
        galleries.push(scan_gallery(&dir)?);
    }
    Ok(galleries)
}

/// Read one gallery directory.
pub fn scan_gallery(dir: &Path) -> Result<GallerySource, ScanError> {
    let id = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ScanError::InvalidName(dir.to_path_buf()))?
        .to_string();
    let images = top_level(dir, |e| e.file_type().is_file() && is_image(e.path()))?;
    Ok(GallerySource {
        id,
        dir: dir.to_path_buf(),
        images,
    })
}

fn top_level(
    dir: &Path,
    keep: impl Fn(&DirEntry) -> bool,
) -> Result<Vec<PathBuf>, ScanError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if keep(&entry) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_input_extensions().contains(&ext.as_str())
}

/// Latest modification time of any visible file directly in `dir`, as RFC
/// 3339 UTC with second precision. Covers images, sidecars and
/// `gallery.yaml`, so editing any of them moves the timestamp.
pub fn source_last_modified(dir: &Path) -> Result<String, ScanError> {
    let mut latest = None;
    for path in top_level(dir, |e| e.file_type().is_file())? {
        let modified = path.metadata()?.modified()?;
        latest = latest.max(Some(modified));
    }
    Ok(latest
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default())
}

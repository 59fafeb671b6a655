//! Shared test utilities.
//!
//! Fixture builders for source trees (gallery directories, `gallery.yaml`,
//! sidecars, image files) and lookup helpers over the built model that panic
//! with a readable message on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let dir = write_gallery(tmp.path(), "20240715", "title: T\ndate: 2024-07-15\n");
//! write_source(&dir, "sunset.jpg", b"pixels");
//! ```

use crate::types::{Gallery, Image};
use image::{ImageBuffer, Rgb};
use std::fs;
use std::path::{Path, PathBuf};

// =========================================================================
// Source tree fixtures
// =========================================================================

/// Create `{root}/{id}/gallery.yaml` and return the gallery directory.
pub fn write_gallery(root: &Path, id: &str, yaml: &str) -> PathBuf {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(crate::gallery::GALLERY_FILE), yaml).unwrap();
    dir
}

/// Write an arbitrary file into a gallery directory.
pub fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Write a real JPEG of the given size with a simple gradient.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

// =========================================================================
// Model lookups
// =========================================================================

/// Find an image by source filename. Panics if not found.
pub fn find_image<'a>(gallery: &'a Gallery, filename: &str) -> &'a Image {
    gallery
        .images
        .iter()
        .find(|i| i.filename == filename)
        .unwrap_or_else(|| {
            let names: Vec<&str> = gallery.images.iter().map(|i| i.filename.as_str()).collect();
            panic!("image '{filename}' not found. Available: {names:?}")
        })
}

/// Source filenames in model order.
pub fn image_filenames(gallery: &Gallery) -> Vec<&str> {
    gallery.images.iter().map(|i| i.filename.as_str()).collect()
}

/// Every file under `dir`, relative, with `/` separators, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut out: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    out.sort();
    out
}

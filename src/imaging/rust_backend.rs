//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate (pure Rust decoders) |
//! | Orientation | `DynamicImage::rotate90/180/270`, `fliph`, `flipv` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | EXIF | `kamadak-exif` (see [`exif`](super::exif)) |

use super::backend::{BackendError, ImageBackend};
use super::calculations::fit_within;
use super::exif::{self, ExifData};
use super::params::{Orientation, Quality, RenderParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Rotate/flip pixels so the image displays upright without its EXIF tag.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::MirrorHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::MirrorVertical => img.flipv(),
        Orientation::MirrorHorizontalRotate90 => img.rotate90().fliph(),
        Orientation::Rotate90 => img.rotate90(),
        Orientation::MirrorHorizontalRotate270 => img.rotate270().fliph(),
        Orientation::Rotate270 => img.rotate270(),
    }
}

/// Encode as baseline JPEG. Alpha is dropped.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let quality = quality.value().min(100) as u8;
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn read_exif(&self, path: &Path) -> Result<ExifData, BackendError> {
        exif::read_exif(path)
    }

    fn render(&self, params: &RenderParams) -> Result<Vec<Vec<u8>>, BackendError> {
        let img = apply_orientation(load_image(&params.source)?, params.orientation);
        let source = (img.width(), img.height());

        params
            .targets
            .iter()
            .map(|target| {
                let (w, h) = fit_within(source, target.bound);
                if (w, h) == source {
                    encode_jpeg(&img, target.quality)
                } else {
                    encode_jpeg(&img.resize_exact(w, h, FilterType::Lanczos3), target.quality)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::RenderTarget;
    use crate::test_helpers::write_test_jpeg;

    fn target(bound: u32) -> RenderTarget {
        RenderTarget {
            bound,
            quality: Quality::new(80),
        }
    }

    fn decoded_dims(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = super::supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn jpeg_without_exif_reads_as_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        write_test_jpeg(&path, 200, 150);

        let exif = RustBackend::new().read_exif(&path).unwrap();
        assert_eq!(exif, ExifData::default());
    }

    #[test]
    fn render_nonexistent_file_errors() {
        let result = RustBackend::new().render(&RenderParams {
            source: "/nonexistent/image.jpg".into(),
            orientation: Orientation::Normal,
            targets: vec![target(100)],
        });
        assert!(result.is_err());
    }

    #[test]
    fn render_produces_one_jpeg_per_target() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_test_jpeg(&source, 400, 300);

        let outputs = RustBackend::new()
            .render(&RenderParams {
                source,
                orientation: Orientation::Normal,
                targets: vec![target(200), target(100), target(1000)],
            })
            .unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(decoded_dims(&outputs[0]), (200, 150));
        assert_eq!(decoded_dims(&outputs[1]), (100, 75));
        // Never upscaled
        assert_eq!(decoded_dims(&outputs[2]), (400, 300));
    }

    #[test]
    fn render_is_deterministic() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_test_jpeg(&source, 120, 80);

        let params = RenderParams {
            source,
            orientation: Orientation::Normal,
            targets: vec![target(60)],
        };
        let backend = RustBackend::new();
        assert_eq!(backend.render(&params).unwrap(), backend.render(&params).unwrap());
    }

    #[test]
    fn render_applies_quarter_turn_orientation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("sideways.jpg");
        write_test_jpeg(&source, 400, 200);

        let outputs = RustBackend::new()
            .render(&RenderParams {
                source,
                orientation: Orientation::Rotate90,
                targets: vec![target(100)],
            })
            .unwrap();

        assert_eq!(decoded_dims(&outputs[0]), (50, 100));
    }

    #[test]
    fn render_garbage_input_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not an image").unwrap();

        let result = RustBackend::new().render(&RenderParams {
            source,
            orientation: Orientation::Normal,
            targets: vec![target(100)],
        });
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn orientation_mapping_dimensions() {
        let img = DynamicImage::new_rgb8(4, 2);
        for (o, dims) in [
            (Orientation::Normal, (4, 2)),
            (Orientation::MirrorHorizontal, (4, 2)),
            (Orientation::Rotate180, (4, 2)),
            (Orientation::MirrorVertical, (4, 2)),
            (Orientation::MirrorHorizontalRotate90, (2, 4)),
            (Orientation::Rotate90, (2, 4)),
            (Orientation::MirrorHorizontalRotate270, (2, 4)),
            (Orientation::Rotate270, (2, 4)),
        ] {
            let out = apply_orientation(img.clone(), o);
            assert_eq!((out.width(), out.height()), dims, "{o:?}");
        }
    }
}

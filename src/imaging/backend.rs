//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the gallery builder
//! needs from the pixel layer: read_exif and render. Rendering
//! returns encoded bytes instead of writing files, so the builder decides
//! whether those bytes get encrypted and where they land.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and statically
//! linked.

use super::exif::ExifData;
use super::params::RenderParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: images of one gallery are rendered in
/// parallel against a shared backend.
pub trait ImageBackend: Sync {
    /// Read the EXIF subset. Files without EXIF yield an empty [`ExifData`].
    fn read_exif(&self, path: &Path) -> Result<ExifData, BackendError>;

    /// Decode once, then produce one encoded JPEG per target, in target order.
    fn render(&self, params: &RenderParams) -> Result<Vec<Vec<u8>>, BackendError>;
}

//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **EXIF** | `kamadak-exif` |
//! | **Orient + resize → JPEG** | `image` rotate/flip, Lanczos3, `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing what to render
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Exif**: the whitelisted-field extractor

pub mod backend;
mod calculations;
pub mod exif;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::fit_within;
pub use exif::ExifData;
pub use params::{Orientation, Quality, RenderParams, RenderTarget};
pub use rust_backend::{RustBackend, supported_input_extensions};

//! Parameter types for image operations.
//!
//! These structs describe *what* to render, not *how*. They are the interface
//! between the [`builder`](crate::builder) (which decides which derivatives an
//! image needs) and the [`backend`](super::backend) (which does the pixel work),
//! so tests can swap in a mock backend without touching builder logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100, default 85). Clamped on construction.
//! - [`Orientation`]: EXIF orientation tag, applied before resizing.
//! - [`RenderTarget`]: one output: longest-edge bound plus quality.
//! - [`RenderParams`]: a source file and every target to produce from one decode.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// EXIF orientation (tag 0x0112), values 1 through 8.
///
/// Unknown or missing values are treated as [`Orientation::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    MirrorHorizontal,
    Rotate180,
    MirrorVertical,
    MirrorHorizontalRotate90,
    Rotate90,
    MirrorHorizontalRotate270,
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Self::MirrorHorizontal,
            3 => Self::Rotate180,
            4 => Self::MirrorVertical,
            5 => Self::MirrorHorizontalRotate90,
            6 => Self::Rotate90,
            7 => Self::MirrorHorizontalRotate270,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    /// True when displaying the image swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::MirrorHorizontalRotate90
                | Self::Rotate90
                | Self::MirrorHorizontalRotate270
                | Self::Rotate270
        )
    }
}

/// A single derivative to produce: fit within `bound`×`bound`, never upscale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub bound: u32,
    pub quality: Quality,
}

/// Everything a backend needs to render one source into several derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub source: PathBuf,
    pub orientation: Orientation,
    pub targets: Vec<RenderTarget>,
}

//! Output tree conventions.
//!
//! ```text
//! output/
//! ├── .cache-manifest.json
//! ├── metadata/
//! │   ├── galleries.json
//! │   └── {gallery}/
//! │       ├── index.json
//! │       └── {image}.json
//! └── public_html/                  # web root
//!     ├── index.html
//!     ├── static/{style.css,gallery.js}
//!     └── galleries/{gallery}/
//!         ├── index.html            # gallery page, or login page
//!         ├── {private id}.html     # protected galleries only
//!         ├── {image}.html
//!         ├── cover/{image}.jpg
//!         ├── full/{image}.jpg
//!         └── thumbnail/{image}.jpg
//! ```
//!
//! Every path and URL the rest of the crate uses is built here, from the
//! gallery id and image id alone.

use std::path::{Path, PathBuf};

const METADATA_DIR: &str = "metadata";
const PUBLIC_DIR: &str = "public_html";
const GALLERIES_DIR: &str = "galleries";
const STATIC_DIR: &str = "static";
const DERIVATIVE_EXT: &str = "jpg";

/// The three sizes every source image is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivativeKind {
    Cover,
    Full,
    Thumbnail,
}

impl DerivativeKind {
    pub const ALL: [DerivativeKind; 3] = [Self::Cover, Self::Full, Self::Thumbnail];

    /// Subdirectory of the gallery holding this size.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Full => "full",
            Self::Thumbnail => "thumbnail",
        }
    }
}

/// Paths under one output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join(PUBLIC_DIR)
    }

    pub fn galleries_json(&self) -> PathBuf {
        self.metadata_dir().join("galleries.json")
    }

    pub fn gallery_metadata_dir(&self, gallery_id: &str) -> PathBuf {
        self.metadata_dir().join(gallery_id)
    }

    pub fn gallery_json(&self, gallery_id: &str) -> PathBuf {
        self.gallery_metadata_dir(gallery_id).join("index.json")
    }

    pub fn image_json(&self, gallery_id: &str, image_id: &str) -> PathBuf {
        self.gallery_metadata_dir(gallery_id)
            .join(format!("{image_id}.json"))
    }

    /// Parent of every gallery's public directory.
    pub fn public_galleries_dir(&self) -> PathBuf {
        self.public_dir().join(GALLERIES_DIR)
    }

    pub fn gallery_public_dir(&self, gallery_id: &str) -> PathBuf {
        self.public_galleries_dir().join(gallery_id)
    }

    pub fn derivative_path(&self, gallery_id: &str, kind: DerivativeKind, image_id: &str) -> PathBuf {
        self.gallery_public_dir(gallery_id)
            .join(kind.dir_name())
            .join(format!("{image_id}.{DERIVATIVE_EXT}"))
    }

    /// `index.html`: the gallery itself, or its login page when protected.
    pub fn gallery_page(&self, gallery_id: &str) -> PathBuf {
        self.gallery_public_dir(gallery_id).join("index.html")
    }

    /// The real gallery page of a protected gallery, named by its private id.
    pub fn private_gallery_page(&self, gallery_id: &str, private_id: &str) -> PathBuf {
        self.gallery_public_dir(gallery_id)
            .join(format!("{private_id}.html"))
    }

    pub fn image_page(&self, gallery_id: &str, image_id: &str) -> PathBuf {
        self.gallery_public_dir(gallery_id)
            .join(format!("{image_id}.html"))
    }

    pub fn site_index(&self) -> PathBuf {
        self.public_dir().join("index.html")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.public_dir().join(STATIC_DIR)
    }

    /// `path` relative to the output root with `/` separators, the form
    /// stored in the cache manifest.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

// ============================================================================
// Site URLs (public_html is the web root)
// ============================================================================

pub fn gallery_url(gallery_id: &str) -> String {
    format!("/{GALLERIES_DIR}/{gallery_id}/")
}

pub fn image_url(gallery_id: &str, image_id: &str) -> String {
    format!("/{GALLERIES_DIR}/{gallery_id}/{image_id}.html")
}

pub fn derivative_url(gallery_id: &str, kind: DerivativeKind, image_id: &str) -> String {
    format!(
        "/{GALLERIES_DIR}/{gallery_id}/{}/{image_id}.{DERIVATIVE_EXT}",
        kind.dir_name()
    )
}

pub fn static_url(file: &str) -> String {
    format!("/{STATIC_DIR}/{file}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_paths_use_kind_directories() {
        let layout = OutputLayout::new("/out");
        assert_eq!(
            layout.derivative_path("20240715", DerivativeKind::Thumbnail, "4c3d1a9961d1"),
            PathBuf::from("/out/public_html/galleries/20240715/thumbnail/4c3d1a9961d1.jpg")
        );
        assert_eq!(
            layout.derivative_path("g", DerivativeKind::Cover, "x"),
            PathBuf::from("/out/public_html/galleries/g/cover/x.jpg")
        );
    }

    #[test]
    fn metadata_paths() {
        let layout = OutputLayout::new("/out");
        assert_eq!(layout.galleries_json(), PathBuf::from("/out/metadata/galleries.json"));
        assert_eq!(layout.gallery_json("g"), PathBuf::from("/out/metadata/g/index.json"));
        assert_eq!(layout.image_json("g", "abc"), PathBuf::from("/out/metadata/g/abc.json"));
    }

    #[test]
    fn page_paths() {
        let layout = OutputLayout::new("/out");
        assert_eq!(
            layout.private_gallery_page("g", "fff4af5f2a081527"),
            PathBuf::from("/out/public_html/galleries/g/fff4af5f2a081527.html")
        );
        assert_eq!(layout.site_index(), PathBuf::from("/out/public_html/index.html"));
    }

    #[test]
    fn urls_match_paths_under_web_root() {
        assert_eq!(image_url("g", "abc"), "/galleries/g/abc.html");
        assert_eq!(
            derivative_url("g", DerivativeKind::Full, "abc"),
            "/galleries/g/full/abc.jpg"
        );
        assert_eq!(gallery_url("g"), "/galleries/g/");
    }

    #[test]
    fn relative_uses_forward_slashes() {
        let layout = OutputLayout::new("/out");
        let p = layout.derivative_path("g", DerivativeKind::Full, "abc");
        assert_eq!(layout.relative(&p), "public_html/galleries/g/full/abc.jpg");
    }
}

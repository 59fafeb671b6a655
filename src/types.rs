//! The gallery data model as written to `metadata/`.
//!
//! These types are the contract with the HTML renderer and the deployment
//! tooling. None of them can hold a password or a private gallery id: the only
//! password-derived field is `private_gallery_id_hash`, present for protected
//! galleries and omitted everywhere else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One image of a gallery, as written to `metadata/{gallery}/{id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    /// Deterministic id; filename stem of every derivative and the image page.
    pub id: String,
    /// Source basename.
    pub filename: String,
    /// Image page, `/galleries/{g}/{id}.html`.
    pub url: String,
    /// Full-size derivative.
    pub path: String,
    pub thumbnail_path: String,
    pub cover_path: String,
    pub title: String,
    pub caption: String,
    pub tags: Vec<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Whitelisted, display-formatted EXIF fields.
    pub exif: BTreeMap<String, String>,
}

/// The image shown for a gallery in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverRef {
    pub id: String,
    pub filename: String,
    pub title: String,
    pub caption: String,
    pub path: String,
    pub thumbnail_path: String,
}

impl From<&Image> for CoverRef {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id.clone(),
            filename: image.filename.clone(),
            title: image.title.clone(),
            caption: image.caption.clone(),
            path: image.cover_path.clone(),
            thumbnail_path: image.thumbnail_path.clone(),
        }
    }
}

/// A complete gallery, as written to `metadata/{gallery}/index.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gallery {
    pub id: String,
    pub title: String,
    /// `YYYY:MM:DD HH:MM:SS`, sorts lexicographically.
    pub date: String,
    /// `Monday, July 15, 2024`.
    pub display_date: String,
    pub location: String,
    pub description: String,
    /// Markdown.
    pub content: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub unlisted: bool,
    pub password_protected: bool,
    /// Derivatives are ciphertext; renderers must use `data-encrypted-url`.
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_gallery_id_hash: Option<String>,
    pub cover: Option<CoverRef>,
    /// Latest source mtime, RFC 3339 UTC.
    pub last_updated: String,
    pub images: Vec<Image>,
}

/// One entry of `metadata/galleries.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GallerySummary {
    pub id: String,
    pub title: String,
    pub date: String,
    pub display_date: String,
    pub location: String,
    pub description: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub unlisted: bool,
    pub password_protected: bool,
    pub encrypted: bool,
    pub cover: Option<CoverRef>,
    pub image_count: usize,
    pub last_updated: String,
}

impl From<&Gallery> for GallerySummary {
    fn from(g: &Gallery) -> Self {
        Self {
            id: g.id.clone(),
            title: g.title.clone(),
            date: g.date.clone(),
            display_date: g.display_date.clone(),
            location: g.location.clone(),
            description: g.description.clone(),
            tags: g.tags.clone(),
            featured: g.featured,
            unlisted: g.unlisted,
            password_protected: g.password_protected,
            encrypted: g.encrypted,
            cover: g.cover.clone(),
            image_count: g.images.len(),
            last_updated: g.last_updated.clone(),
        }
    }
}

/// `metadata/galleries.json`: every successfully built gallery, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GalleryIndex {
    pub last_updated: String,
    pub galleries: Vec<GallerySummary>,
}

impl GalleryIndex {
    /// Sort newest `date` first, ties by id, and take the latest
    /// `last_updated` of any gallery as the collection timestamp.
    pub fn from_summaries(mut galleries: Vec<GallerySummary>) -> Self {
        galleries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        let last_updated = galleries
            .iter()
            .map(|g| g.last_updated.as_str())
            .max()
            .unwrap_or_default()
            .to_string();
        Self {
            last_updated,
            galleries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, date: &str, updated: &str) -> GallerySummary {
        GallerySummary {
            id: id.into(),
            title: id.into(),
            date: date.into(),
            display_date: String::new(),
            location: String::new(),
            description: String::new(),
            tags: vec![],
            featured: false,
            unlisted: false,
            password_protected: false,
            encrypted: false,
            cover: None,
            image_count: 0,
            last_updated: updated.into(),
        }
    }

    #[test]
    fn index_sorts_newest_first() {
        let index = GalleryIndex::from_summaries(vec![
            summary("a", "2023:01:01 00:00:00", "2023-01-02T00:00:00Z"),
            summary("c", "2024:07:15 00:00:00", "2024-07-16T00:00:00Z"),
            summary("b", "2024:07:15 00:00:00", "2024-07-20T00:00:00Z"),
        ]);
        let ids: Vec<&str> = index.galleries.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(index.last_updated, "2024-07-20T00:00:00Z");
    }

    #[test]
    fn empty_index_has_empty_timestamp() {
        let index = GalleryIndex::from_summaries(vec![]);
        assert!(index.galleries.is_empty());
        assert_eq!(index.last_updated, "");
    }

    #[test]
    fn hash_is_omitted_when_absent() {
        let g = Gallery {
            id: "g".into(),
            title: "G".into(),
            date: "2024:07:15 00:00:00".into(),
            display_date: String::new(),
            location: String::new(),
            description: String::new(),
            content: String::new(),
            tags: vec![],
            featured: false,
            unlisted: false,
            password_protected: false,
            encrypted: false,
            private_gallery_id_hash: None,
            cover: None,
            last_updated: String::new(),
            images: vec![],
        };
        let json = serde_json::to_string(&g).unwrap();
        assert!(!json.contains("private_gallery_id_hash"));
        assert!(!json.contains("password\""));
    }
}

//! Per-image metadata resolution.
//!
//! An image's descriptive fields come from two places:
//!
//! - **Sidecar** `<stem>.yaml` next to the image (see
//!   [`gallery::load_sidecar`](crate::gallery::load_sidecar)): `title`,
//!   `caption`, `tags`. Deliberate curation, so it always wins.
//! - **Filename**: `golden_hour-02.jpg` becomes "Golden Hour 02". Used when
//!   no sidecar title is given.
//!
//! EXIF is read by the imaging backend; this module only narrows it to the
//! configured whitelist.

use crate::gallery::ImageSidecar;
use std::collections::BTreeMap;
use std::path::Path;

/// Resolve a metadata field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value, trimmed.
///
/// ```text
/// title:   resolve(&[sidecar_title, filename_title])
/// caption: resolve(&[sidecar_caption])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Turn a filename stem into a display title.
///
/// Underscores and dashes separate words; each word is capitalised and the
/// rest of it lowercased.
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Descriptive fields of one image after merging every source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedMetadata {
    pub title: String,
    pub caption: String,
    pub tags: Vec<String>,
}

/// Merge sidecar fields with the filename fallback.
pub fn resolve_image_metadata(path: &Path, sidecar: Option<&ImageSidecar>) -> ResolvedMetadata {
    let filename_title = title_from_filename(path);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let title = resolve(&[
        sidecar.and_then(|s| s.title.as_deref()),
        Some(filename_title.as_str()),
        Some(filename.as_str()),
    ])
    .unwrap_or_default();
    let caption = resolve(&[sidecar.and_then(|s| s.caption.as_deref())]).unwrap_or_default();
    let tags = sidecar.map(|s| normalize_tags(&s.tags)).unwrap_or_default();

    ResolvedMetadata {
        title,
        caption,
        tags,
    }
}

/// Trim, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !out.iter().any(|existing| existing == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Keep only whitelisted EXIF fields.
pub fn filter_exif(
    fields: &BTreeMap<String, String>,
    whitelist: &[String],
) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter(|(name, _)| whitelist.iter().any(|w| w == *name))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

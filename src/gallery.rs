//! Gallery and image configuration files.
//!
//! Each gallery directory carries a `gallery.yaml`:
//!
//! ```yaml
//! title: Summer Evening       # required
//! date: 2024-07-15           # required
//! location: Lisbon
//! description: One short line.
//! content: |
//!   Markdown body rendered on the gallery page.
//! tags: [travel, featured]   # or a single string
//! cover: sunset.jpg
//! unlisted: false
//! password: secret123        # protects the gallery page
//! encrypted: true            # also encrypts every derivative (needs password)
//! ```
//!
//! Images may have a `<stem>.yaml` sidecar with `title`, `caption` and `tags`.
//!
//! Parsing is strict (`deny_unknown_fields`) so typos surface as errors instead
//! of silently falling back to defaults. The visibility flags are collapsed
//! once, here, into a [`Visibility`] value; nothing downstream re-derives them
//! from the raw booleans.

use crate::identity::Password;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the per-gallery configuration.
pub const GALLERY_FILE: &str = "gallery.yaml";

/// The tag that promotes a listed gallery on the site index.
pub const FEATURED_TAG: &str = "featured";

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field 'date': unrecognised date '{0}'")]
    InvalidDate(String),
    #[error("field 'password': {0}")]
    Password(#[from] crate::identity::IdentityError),
    #[error("field 'encrypted': encrypted galleries need a password")]
    EncryptedWithoutPassword,
    #[error(transparent)]
    Scan(#[from] crate::scan::ScanError),
    #[error("image ids collide: '{first}' and '{second}' both map to {id}")]
    IdCollision {
        id: String,
        first: String,
        second: String,
    },
}

/// Raw `gallery.yaml` contents.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    pub cover: Option<String>,
    pub unlisted: bool,
    pub password: Option<Password>,
    pub encrypted: bool,
}

/// Raw `<stem>.yaml` image sidecar contents.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSidecar {
    pub title: Option<String>,
    pub caption: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
}

/// How a gallery is exposed. Computed once from the raw flags.
///
/// Precedence, highest first: encrypted, password, unlisted, `featured` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Standard,
    Featured,
    Unlisted,
    /// Page behind a login; images served in the clear.
    PasswordProtected { unlisted: bool },
    /// Page behind a login, every derivative encrypted. Always unlisted.
    Encrypted,
}

impl Visibility {
    pub fn normalize(
        tags: &[String],
        unlisted: bool,
        has_password: bool,
        encrypted: bool,
    ) -> Result<Self, GalleryError> {
        match (encrypted, has_password) {
            (true, false) => Err(GalleryError::EncryptedWithoutPassword),
            (true, true) => Ok(Self::Encrypted),
            (false, true) => Ok(Self::PasswordProtected { unlisted }),
            (false, false) if unlisted => Ok(Self::Unlisted),
            (false, false) if tags.iter().any(|t| t == FEATURED_TAG) => Ok(Self::Featured),
            (false, false) => Ok(Self::Standard),
        }
    }

    pub fn is_encrypted(self) -> bool {
        matches!(self, Self::Encrypted)
    }

    pub fn is_protected(self) -> bool {
        matches!(self, Self::PasswordProtected { .. } | Self::Encrypted)
    }

    pub fn is_unlisted(self) -> bool {
        matches!(
            self,
            Self::Unlisted | Self::Encrypted | Self::PasswordProtected { unlisted: true }
        )
    }

    pub fn is_featured(self) -> bool {
        matches!(self, Self::Featured)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "public",
            Self::Featured => "featured",
            Self::Unlisted => "unlisted",
            Self::PasswordProtected { unlisted: false } => "password protected",
            Self::PasswordProtected { unlisted: true } => "password protected, unlisted",
            Self::Encrypted => "encrypted",
        }
    }

    /// Tags as downstream consumers should see them.
    pub fn effective_tags(self, tags: &[String]) -> Vec<String> {
        tags.iter()
            .filter(|t| !(self.is_encrypted() && *t == FEATURED_TAG))
            .cloned()
            .collect()
    }
}

/// A validated gallery configuration. The password travels separately so it
/// can be consumed by identity derivation without ever sitting in this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct GallerySettings {
    pub title: String,
    pub date: NaiveDateTime,
    pub location: String,
    pub description: String,
    pub content: String,
    /// Effective tags (already filtered by visibility).
    pub tags: Vec<String>,
    pub cover: Option<String>,
    pub visibility: Visibility,
}

impl GalleryConfig {
    /// Check required fields and flag combinations.
    ///
    /// Returns the settings and the password, if one was configured. An empty
    /// password is rejected here, before any identity derivation runs.
    pub fn validate(self) -> Result<(GallerySettings, Option<Password>), GalleryError> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(GalleryError::MissingField("title"))?;
        let date_text = self.date.ok_or(GalleryError::MissingField("date"))?;
        let date = parse_date(&date_text).ok_or(GalleryError::InvalidDate(date_text))?;

        if let Some(pw) = &self.password
            && pw.is_empty()
        {
            return Err(crate::identity::IdentityError::EmptyPassword.into());
        }

        let visibility = Visibility::normalize(
            &self.tags,
            self.unlisted,
            self.password.is_some(),
            self.encrypted,
        )?;

        let settings = GallerySettings {
            title,
            date,
            location: self.location.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            tags: visibility.effective_tags(&self.tags),
            cover: self.cover.filter(|c| !c.is_empty()),
            visibility,
        };
        Ok((settings, self.password))
    }
}

/// Load `gallery.yaml` from a gallery directory.
pub fn load_gallery_config(dir: &Path) -> Result<GalleryConfig, GalleryError> {
    let path = dir.join(GALLERY_FILE);
    let content = fs::read_to_string(&path)?;
    parse_yaml(&content, &path)
}

/// Load the sidecar for an image, if one exists.
///
/// An image whose stem is `gallery` has no sidecar: `gallery.yaml` is the
/// gallery's own configuration.
pub fn load_sidecar(image_path: &Path) -> Result<Option<ImageSidecar>, GalleryError> {
    let path = sidecar_path(image_path);
    if path.file_name().is_some_and(|name| name == GALLERY_FILE) {
        return Ok(None);
    }
    match fs::read_to_string(&path) {
        Ok(content) => parse_yaml(&content, &path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `photo.jpg` → `photo.yaml`.
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("yaml")
}

fn parse_yaml<T: for<'de> Deserialize<'de> + Default>(
    content: &str,
    path: &Path,
) -> Result<T, GalleryError> {
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(content).map_err(|source| GalleryError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse the date formats accepted in `gallery.yaml`.
///
/// Date-only values are taken as midnight.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y:%m:%d %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y:%m:%d"];

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
}

/// Accept `date: 2024-07-15` and `date: 20240715` alike.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Int(i) => i.to_string(),
    }))
}

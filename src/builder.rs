//! Gallery model building.
//!
//! Turns one gallery directory into its [`Gallery`] model, its derivatives on
//! disk and its metadata JSON, in two steps:
//!
//! 1. **Plan** ([`plan_gallery`]): load and validate `gallery.yaml`, consume
//!    the password into a [`GalleryAccess`], derive every image id and refuse
//!    the gallery if two filenames collide. No output is touched, so `check`
//!    runs exactly this step.
//! 2. **Build** ([`GalleryBuilder::build`]): per image, in parallel, read EXIF
//!    and sidecar, look up the derivative cache, render what is missing,
//!    encrypt it for encrypted galleries, and write it. Then pick the cover,
//!    order the images and write `{image}.json` and `index.json`.
//!
//! ## Failure scope
//!
//! Configuration, validation and collision errors fail the whole gallery
//! ([`GalleryError`]). Anything that goes wrong for one image (unreadable
//! source, broken sidecar, decode or cipher failure) is an [`ImageError`]:
//! the image is left out, reported in [`BuiltGallery::skipped`], and the
//! gallery carries on.
//!
//! ## Secrets
//!
//! The password is consumed by [`derive_access`] during planning and does not
//! exist afterwards. Each image worker derives its own key and IV; no cipher
//! state is shared between images.

use crate::cache::{self, CacheManifest, CacheStats, EncryptionParams};
use crate::config::ImagesConfig;
use crate::crypto::{self, CryptoError};
use crate::fsutil::{self, WriteOutcome};
use crate::gallery::{self, GalleryError, GallerySettings, ImageSidecar};
use crate::identity::{GalleryAccess, derive_access, image_id, image_iv};
use crate::imaging::{BackendError, ImageBackend, Quality, RenderParams, RenderTarget};
use crate::layout::{self, DerivativeKind, OutputLayout};
use crate::metadata;
use crate::scan::{self, GallerySource};
use crate::types::{CoverRef, Gallery, Image};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Storage format of `Gallery::date`.
pub const DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// `Monday, July 15, 2024`.
pub const DISPLAY_DATE_FORMAT: &str = "%A, %B %d, %Y";

/// Why a single image was left out of its gallery.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("sidecar: {0}")]
    Sidecar(#[source] GalleryError),
    #[error("image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("encryption failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("renderer returned {got} derivatives, expected {expected}")]
    RenderMismatch { expected: usize, got: usize },
}

/// A source image with its derived id.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedImage {
    pub path: PathBuf,
    pub filename: String,
    pub id: String,
}

/// A validated gallery, ready to build.
#[derive(Debug)]
pub struct GalleryPlan {
    pub id: String,
    pub dir: PathBuf,
    pub settings: GallerySettings,
    /// Present for password-protected and encrypted galleries.
    pub access: Option<GalleryAccess>,
    pub images: Vec<PlannedImage>,
}

impl GalleryPlan {
    pub fn is_encrypted(&self) -> bool {
        self.settings.visibility.is_encrypted()
    }
}

/// Load, validate and derive identities for one gallery.
pub fn plan_gallery(source: &GallerySource) -> Result<GalleryPlan, GalleryError> {
    let (settings, password) = gallery::load_gallery_config(&source.dir)?.validate()?;
    let access = password
        .map(|pw| derive_access(&source.id, pw))
        .transpose()?;

    let encrypted = settings.visibility.is_encrypted();
    let images: Vec<PlannedImage> = source
        .images
        .iter()
        .map(|path| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            PlannedImage {
                id: image_id(&source.id, &filename, encrypted),
                path: path.clone(),
                filename,
            }
        })
        .collect();
    detect_collisions(&images)?;

    Ok(GalleryPlan {
        id: source.id.clone(),
        dir: source.dir.clone(),
        settings,
        access,
        images,
    })
}

/// Fail if two filenames map to the same image id.
pub fn detect_collisions(images: &[PlannedImage]) -> Result<(), GalleryError> {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(images.len());
    for image in images {
        if let Some(first) = seen.insert(&image.id, &image.filename) {
            return Err(GalleryError::IdCollision {
                id: image.id.clone(),
                first: first.to_string(),
                second: image.filename.clone(),
            });
        }
    }
    Ok(())
}

/// How a derivative came to be on disk this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeStatus {
    /// Already in place from an earlier run.
    Cached,
    /// Reused from another path with the same content key.
    Copied,
    /// Rendered this run.
    Encoded,
    /// Rendered and encrypted this run.
    Encrypted,
}

/// Per-image outcome, in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
    pub id: String,
    pub filename: String,
    pub title: String,
    pub derivatives: Vec<(DerivativeKind, DerivativeStatus)>,
}

/// An image that was left out, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub filename: String,
    pub reason: String,
}

/// Everything one gallery build produced.
#[derive(Debug)]
pub struct BuiltGallery {
    pub gallery: Gallery,
    /// Needed to name the private gallery page; dropped with this value.
    pub access: Option<GalleryAccess>,
    /// Derivatives and metadata files this gallery owns after the build.
    /// The renderer adds its pages before reconciliation.
    pub expected: BTreeSet<PathBuf>,
    pub images: Vec<ImageReport>,
    pub skipped: Vec<SkippedImage>,
    pub cache_stats: CacheStats,
    /// Cache entries to record: (output path relative to root, source hash, params hash).
    pub cache_entries: Vec<(String, String, String)>,
    /// Files actually rewritten this run.
    pub files_written: usize,
}

struct ProcessedImage {
    image: Image,
    captured_at: Option<NaiveDateTime>,
    report: ImageReport,
    cache_entries: Vec<(String, String, String)>,
    stats: CacheStats,
    files_written: usize,
}

/// Builds galleries against one backend, layout and image configuration.
///
/// The EXIF whitelist and derivative settings are plain borrowed data.
pub struct GalleryBuilder<'a, B: ImageBackend> {
    backend: &'a B,
    layout: &'a OutputLayout,
    images: &'a ImagesConfig,
    exif_fields: &'a [String],
}

impl<'a, B: ImageBackend> GalleryBuilder<'a, B> {
    pub fn new(
        backend: &'a B,
        layout: &'a OutputLayout,
        images: &'a ImagesConfig,
        exif_fields: &'a [String],
    ) -> Self {
        Self {
            backend,
            layout,
            images,
            exif_fields,
        }
    }

    /// Build a planned gallery: derivatives, model, and metadata JSON.
    pub fn build(
        &self,
        plan: GalleryPlan,
        cache: &CacheManifest,
    ) -> Result<BuiltGallery, GalleryError> {
        let results: Vec<Result<ProcessedImage, ImageError>> = plan
            .images
            .par_iter()
            .map(|planned| self.process_image(&plan, planned, cache))
            .collect();

        let mut processed = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (planned, result) in plan.images.iter().zip(results) {
            match result {
                Ok(p) => processed.push(p),
                Err(e) => skipped.push(SkippedImage {
                    filename: planned.filename.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        sort_images(&mut processed);

        let mut built = BuiltGallery {
            gallery: self.assemble(&plan, &processed)?,
            access: None,
            expected: BTreeSet::new(),
            images: Vec::with_capacity(processed.len()),
            skipped,
            cache_stats: CacheStats::default(),
            cache_entries: Vec::new(),
            files_written: 0,
        };

        for p in processed {
            for kind in DerivativeKind::ALL {
                built
                    .expected
                    .insert(self.layout.derivative_path(&plan.id, kind, &p.image.id));
            }
            built.cache_stats.absorb(p.stats);
            built.cache_entries.extend(p.cache_entries);
            built.files_written += p.files_written;
            built.images.push(p.report);
        }

        for image in &built.gallery.images {
            let path = self.layout.image_json(&plan.id, &image.id);
            built.files_written += count(fsutil::write_json_if_changed(&path, image)?);
            built.expected.insert(path);
        }
        let index = self.layout.gallery_json(&plan.id);
        built.files_written += count(fsutil::write_json_if_changed(&index, &built.gallery)?);
        built.expected.insert(index);

        built.access = plan.access;
        Ok(built)
    }

    fn assemble(
        &self,
        plan: &GalleryPlan,
        processed: &[ProcessedImage],
    ) -> Result<Gallery, GalleryError> {
        let settings = &plan.settings;
        let visibility = settings.visibility;
        let images: Vec<Image> = processed.iter().map(|p| p.image.clone()).collect();
        let cover = choose_cover(&images, settings.cover.as_deref()).map(CoverRef::from);

        Ok(Gallery {
            id: plan.id.clone(),
            title: settings.title.clone(),
            date: settings.date.format(DATE_FORMAT).to_string(),
            display_date: settings.date.format(DISPLAY_DATE_FORMAT).to_string(),
            location: settings.location.clone(),
            description: settings.description.clone(),
            content: settings.content.clone(),
            tags: settings.tags.clone(),
            featured: visibility.is_featured(),
            unlisted: visibility.is_unlisted(),
            password_protected: visibility.is_protected(),
            encrypted: visibility.is_encrypted(),
            private_gallery_id_hash: plan.access.as_ref().map(|a| a.hash.clone()),
            cover,
            last_updated: scan::source_last_modified(&plan.dir)?,
            images,
        })
    }

    fn process_image(
        &self,
        plan: &GalleryPlan,
        planned: &PlannedImage,
        cache: &CacheManifest,
    ) -> Result<ProcessedImage, ImageError> {
        let sidecar: Option<ImageSidecar> =
            gallery::load_sidecar(&planned.path).map_err(ImageError::Sidecar)?;
        let exif = self.backend.read_exif(&planned.path)?;
        let meta = metadata::resolve_image_metadata(&planned.path, sidecar.as_ref());

        let source_hash = cache::hash_file(&planned.path)?;
        let quality = Quality::new(self.images.quality);
        let encryption = plan
            .access
            .as_ref()
            .filter(|_| plan.is_encrypted())
            .map(|access| EncryptionParams {
                verification_hash: &access.hash,
                image_id: &planned.id,
            });

        let mut stats = CacheStats::default();
        let mut files_written = 0;
        let mut statuses = Vec::with_capacity(DerivativeKind::ALL.len());
        let mut cache_entries = Vec::with_capacity(DerivativeKind::ALL.len());
        let mut to_render: Vec<(DerivativeKind, PathBuf)> = Vec::new();

        for kind in DerivativeKind::ALL {
            let bound = self.images.bound(kind);
            let params_hash =
                cache::hash_derivative_params(kind, bound, quality.value(), encryption);
            let target = self.layout.derivative_path(&plan.id, kind, &planned.id);
            let rel = self.layout.relative(&target);

            match cache.find_cached(&source_hash, &params_hash, self.layout.root()) {
                Some(stored) if stored == rel => {
                    stats.hit();
                    statuses.push((kind, DerivativeStatus::Cached));
                }
                Some(stored) => {
                    let bytes = std::fs::read(self.layout.root().join(&stored))?;
                    files_written += count(fsutil::write_if_changed(&target, &bytes)?);
                    stats.copy();
                    statuses.push((kind, DerivativeStatus::Copied));
                }
                None => {
                    stats.miss();
                    to_render.push((kind, target));
                }
            }
            cache_entries.push((rel, source_hash.clone(), params_hash));
        }

        if !to_render.is_empty() {
            let params = RenderParams {
                source: planned.path.clone(),
                orientation: exif.orientation,
                targets: to_render
                    .iter()
                    .map(|(kind, _)| RenderTarget {
                        bound: self.images.bound(*kind),
                        quality,
                    })
                    .collect(),
            };
            let rendered = self.backend.render(&params)?;
            if rendered.len() != to_render.len() {
                return Err(ImageError::RenderMismatch {
                    expected: to_render.len(),
                    got: rendered.len(),
                });
            }

            // Encrypt everything before writing anything, so a cipher failure
            // leaves no partial set of derivatives behind.
            let payloads = match plan.access.as_ref().filter(|_| plan.is_encrypted()) {
                Some(access) => {
                    let key = access.encryption_key();
                    let iv = image_iv(&planned.id);
                    rendered
                        .iter()
                        .map(|plain| crypto::encrypt(plain, key.as_slice(), &iv))
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => rendered,
            };
            let status = if encryption.is_some() {
                DerivativeStatus::Encrypted
            } else {
                DerivativeStatus::Encoded
            };

            for ((kind, target), bytes) in to_render.iter().zip(payloads) {
                files_written += count(fsutil::write_if_changed(target, &bytes)?);
                statuses.push((*kind, status));
            }
            statuses.sort_by_key(|(kind, _)| *kind);
        }

        let image = Image {
            id: planned.id.clone(),
            filename: planned.filename.clone(),
            url: layout::image_url(&plan.id, &planned.id),
            path: layout::derivative_url(&plan.id, DerivativeKind::Full, &planned.id),
            thumbnail_path: layout::derivative_url(&plan.id, DerivativeKind::Thumbnail, &planned.id),
            cover_path: layout::derivative_url(&plan.id, DerivativeKind::Cover, &planned.id),
            title: meta.title.clone(),
            caption: meta.caption,
            tags: meta.tags,
            lat: exif.lat,
            lon: exif.lon,
            exif: metadata::filter_exif(&exif.fields, self.exif_fields),
        };

        Ok(ProcessedImage {
            report: ImageReport {
                id: planned.id.clone(),
                filename: planned.filename.clone(),
                title: meta.title,
                derivatives: statuses,
            },
            image,
            captured_at: exif.captured_at,
            cache_entries,
            stats,
            files_written,
        })
    }
}

fn count(outcome: WriteOutcome) -> usize {
    match outcome {
        WriteOutcome::Written => 1,
        WriteOutcome::Unchanged => 0,
    }
}

/// Timestamped images first, by capture time; the rest after them. Filename
/// breaks every tie.
fn sort_images(images: &mut [ProcessedImage]) {
    images.sort_by(|a, b| {
        let key = |p: &ProcessedImage| (p.captured_at.is_none(), p.captured_at);
        key(a)
            .cmp(&key(b))
            .then_with(|| a.image.filename.cmp(&b.image.filename))
    });
}

/// The explicitly configured cover if it is among the built images, else the
/// first image in gallery order.
pub fn choose_cover<'i>(images: &'i [Image], explicit: Option<&str>) -> Option<&'i Image> {
    explicit
        .and_then(|name| images.iter().find(|i| i.filename == name))
        .or_else(|| images.first())
}

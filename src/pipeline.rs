//! Whole-site build orchestration.
//!
//! ```text
//! config.toml ─┐
//! galleries/ ──┼─> plan ─> build ─> pages ─> reconcile   (per gallery)
//!              │
//!              └─> galleries.json ─> index.html ─> sweep ─> cache save
//! ```
//!
//! Galleries are built one after another; images inside a gallery run on the
//! rayon pool. A gallery that fails is reported and left out of
//! `galleries.json`, but its previous output on disk is not touched and the
//! run goes on with the next one. When that output exists the failure says
//! so: those pages are still being served.
//!
//! [`BuildOptions::gallery`] narrows a build to one gallery. Only that gallery
//! is built and reconciled. `galleries.json` and the site index are still
//! rewritten, taking every other gallery from its published
//! `metadata/{id}/index.json`, and the orphan sweep is skipped.

use crate::builder::{GalleryBuilder, plan_gallery};
use crate::cache::{CacheManifest, CacheStats};
use crate::config::{self, ConfigError, SiteConfig};
use crate::fsutil::{self, WriteOutcome};
use crate::gallery::GalleryError;
use crate::imaging::ImageBackend;
use crate::layout::OutputLayout;
use crate::output::BuildEvent;
use crate::reconcile::{self, ReconcileError};
use crate::render;
use crate::scan::{self, GallerySource, ScanError};
use crate::types::{Gallery, GalleryIndex, GallerySummary};
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("{}: {source}", .path.display())]
    Published {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
    #[error("no gallery named '{0}' in the source directory")]
    UnknownGallery(String),
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Ignore the derivative cache and re-encode everything.
    pub no_cache: bool,
    /// Build only this gallery id.
    pub gallery: Option<String>,
}

/// A gallery that could not be built or checked.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryFailure {
    pub id: String,
    pub error: String,
    /// Output from an earlier run is still published for this gallery.
    pub stale_output: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub galleries_built: usize,
    pub images: usize,
    pub skipped: usize,
    pub files_written: usize,
    pub files_removed: usize,
    pub cache: CacheStats,
    pub failures: Vec<GalleryFailure>,
}

impl BuildSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One gallery as `check` sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedGallery {
    pub id: String,
    pub title: String,
    pub image_count: usize,
    pub visibility: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub galleries: Vec<CheckedGallery>,
    pub failures: Vec<GalleryFailure>,
}

impl CheckReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn emit(events: Option<&Sender<BuildEvent>>, event: BuildEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

/// Load `config.toml` from `source` and build the whole site into `output`.
pub fn build<B: ImageBackend>(
    backend: &B,
    source: &Path,
    output: &Path,
    options: BuildOptions,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, PipelineError> {
    let site = config::load_config(source)?;
    build_with_config(backend, &site, source, output, options, events)
}

/// Build the whole site with an already loaded configuration.
///
/// Only site-level problems (unreadable source root, unwritable output root,
/// broken `config.toml`) are errors here; per-gallery failures end up in
/// [`BuildSummary::failures`].
pub fn build_with_config<B: ImageBackend>(
    backend: &B,
    site: &SiteConfig,
    source: &Path,
    output: &Path,
    options: BuildOptions,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, PipelineError> {
    let events = events.as_ref();
    let discovered = scan::discover_galleries(source)?;
    let sources = select(&discovered, options.gallery.as_deref())?;
    let layout = OutputLayout::new(output);
    std::fs::create_dir_all(layout.root())?;

    let mut cache = if options.no_cache {
        CacheManifest::empty()
    } else {
        CacheManifest::load(layout.root())
    };

    let mut summary = BuildSummary {
        files_written: render::write_static_assets(&layout)?,
        ..BuildSummary::default()
    };

    let builder = GalleryBuilder::new(backend, &layout, &site.images, &site.exif.fields);
    let mut built: Vec<GallerySummary> = Vec::with_capacity(sources.len());

    for (idx, gallery_source) in sources.iter().copied().enumerate() {
        let result = build_gallery(
            &builder,
            &layout,
            site,
            gallery_source,
            idx + 1,
            &mut cache,
            &mut summary,
            events,
        );
        match result {
            Ok(gallery) => {
                summary.galleries_built += 1;
                built.push(gallery);
            }
            Err(e) => {
                let failure = GalleryFailure {
                    id: gallery_source.id.clone(),
                    error: e.to_string(),
                    stale_output: layout.gallery_public_dir(&gallery_source.id).is_dir(),
                };
                emit(
                    events,
                    BuildEvent::GalleryFailed {
                        id: failure.id.clone(),
                        error: failure.error.clone(),
                        stale_output: failure.stale_output,
                    },
                );
                summary.failures.push(failure);
            }
        }
    }

    if options.gallery.is_some() {
        for other in discovered.iter().filter(|d| !sources.iter().any(|s| s.id == d.id)) {
            built.extend(load_published_summary(&layout, &other.id)?);
        }
    }

    let index = GalleryIndex::from_summaries(built);
    summary.files_written += count(fsutil::write_json_if_changed(
        &layout.galleries_json(),
        &index,
    )?);
    summary.files_written += count(render::write_site_index(&layout, site, &index)?);

    if options.gallery.is_none() {
        let keep: BTreeSet<String> = discovered.iter().map(|s| s.id.clone()).collect();
        let swept = reconcile::sweep_orphan_galleries(&layout, &keep)?;
        if !swept.is_empty() {
            summary.files_removed += swept.len();
            emit(
                events,
                BuildEvent::FilesRemoved {
                    paths: swept.iter().map(|p| layout.relative(p)).collect(),
                },
            );
        }
    }

    cache.save(layout.root())?;
    Ok(summary)
}

/// All discovered galleries, or just the one asked for.
fn select<'s>(
    discovered: &'s [GallerySource],
    only: Option<&str>,
) -> Result<Vec<&'s GallerySource>, PipelineError> {
    match only {
        None => Ok(discovered.iter().collect()),
        Some(id) => discovered
            .iter()
            .find(|s| s.id == id)
            .map(|s| vec![s])
            .ok_or_else(|| PipelineError::UnknownGallery(id.to_string())),
    }
}

/// Summary of a gallery as last published, if it has been.
fn load_published_summary(
    layout: &OutputLayout,
    gallery_id: &str,
) -> Result<Option<GallerySummary>, PipelineError> {
    let path = layout.gallery_json(gallery_id);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let gallery: Gallery =
        serde_json::from_str(&text).map_err(|source| PipelineError::Published { path, source })?;
    Ok(Some(GallerySummary::from(&gallery)))
}

#[allow(clippy::too_many_arguments)]
fn build_gallery<B: ImageBackend>(
    builder: &GalleryBuilder<'_, B>,
    layout: &OutputLayout,
    site: &SiteConfig,
    source: &GallerySource,
    position: usize,
    cache: &mut CacheManifest,
    summary: &mut BuildSummary,
    events: Option<&Sender<BuildEvent>>,
) -> Result<GallerySummary, PipelineError> {
    let plan = plan_gallery(source)?;
    emit(
        events,
        BuildEvent::GalleryStarted {
            index: position,
            id: plan.id.clone(),
            title: plan.settings.title.clone(),
            image_count: plan.images.len(),
            visibility: plan.settings.visibility.label(),
        },
    );

    let mut built = builder.build(plan, cache)?;
    for (path, source_hash, params_hash) in built.cache_entries.drain(..) {
        cache.insert(path, source_hash, params_hash);
    }

    for (i, image) in built.images.iter().enumerate() {
        emit(
            events,
            BuildEvent::ImageProcessed {
                index: i + 1,
                title: image.title.clone(),
                filename: image.filename.clone(),
                derivatives: image.derivatives.clone(),
            },
        );
    }
    for skipped in &built.skipped {
        emit(
            events,
            BuildEvent::ImageSkipped {
                filename: skipped.filename.clone(),
                reason: skipped.reason.clone(),
            },
        );
    }

    let pages = render::write_gallery_pages(layout, site, &built)?;
    built.expected.extend(pages.pages);
    let removed = reconcile::reconcile_gallery(layout, &built.gallery.id, &built.expected)?;
    if !removed.is_empty() {
        emit(
            events,
            BuildEvent::FilesRemoved {
                paths: removed.iter().map(|p| layout.relative(p)).collect(),
            },
        );
    }

    let files_written = built.files_written + pages.written;
    emit(
        events,
        BuildEvent::GalleryWritten {
            id: built.gallery.id.clone(),
            cache: built.cache_stats,
            files_written,
        },
    );

    summary.images += built.gallery.images.len();
    summary.skipped += built.skipped.len();
    summary.files_written += files_written;
    summary.files_removed += removed.len();
    summary.cache.absorb(built.cache_stats);

    Ok(GallerySummary::from(&built.gallery))
}

/// Validate galleries without touching the output: configuration,
/// passwords and image id collisions. `only` narrows the check to one gallery.
pub fn check(source: &Path, only: Option<&str>) -> Result<CheckReport, PipelineError> {
    config::load_config(source)?;
    let discovered = scan::discover_galleries(source)?;
    let mut report = CheckReport::default();
    for gallery_source in select(&discovered, only)? {
        match plan_gallery(gallery_source) {
            Ok(plan) => report.galleries.push(CheckedGallery {
                id: plan.id,
                title: plan.settings.title,
                image_count: plan.images.len(),
                visibility: plan.settings.visibility.label(),
            }),
            Err(e) => report.failures.push(GalleryFailure {
                id: gallery_source.id.clone(),
                error: e.to_string(),
                stale_output: false,
            }),
        }
    }
    Ok(report)
}

fn count(outcome: WriteOutcome) -> usize {
    usize::from(outcome == WriteOutcome::Written)
}

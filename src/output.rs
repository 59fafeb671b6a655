//! CLI output formatting for `build` and `check`.
//!
//! Output is information-first: every gallery and image leads with its
//! positional index and title, with filenames and cache status as indented
//! context lines.
//!
//! ## Build
//!
//! ```text
//! 001 Summer in Lisbon (3 photos)
//!     001 Sunset over the river
//!         Source: sunset.jpg
//!         cover: cached
//!         full: encoded
//!         thumbnail: cached
//!     002 (IMG_0042.jpg)
//!         ...
//!     Skipped: broken.jpg (cannot decode image)
//!     Removed: galleries/lisbon/full/4c3d1a9961d1.jpg
//!     9 cached, 0 copied, 3 encoded (12 total), 14 files written
//!
//! Built 2 galleries, 7 images (1 failed)
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 Summer in Lisbon (3 photos, encrypted)
//!     Source: lisbon/
//! ```
//!
//! Each event has a `format_*` function returning `Vec<String>` and a
//! `print_*` wrapper. Nothing here ever sees a private gallery id.

use crate::builder::DerivativeStatus;
use crate::cache::CacheStats;
use crate::layout::DerivativeKind;
use crate::pipeline::{BuildSummary, CheckReport};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Gallery header: index, title and a parenthesised detail.
///
/// ```text
/// 001 Lisbon (5 photos)
/// 002 Porto (2 photos, unlisted)
/// ```
fn entity_header(index: usize, title: &str, count: usize, detail: Option<&str>) -> String {
    let noun = if count == 1 { "photo" } else { "photos" };
    match detail {
        Some(d) => format!("{} {} ({} {}, {})", format_index(index), title, count, noun, d),
        None => format!("{} {} ({} {})", format_index(index), title, count, noun),
    }
}

/// Titled images show their title, untitled ones the filename in parens.
fn image_line(index: usize, title: &str, filename: &str) -> String {
    if title.is_empty() {
        format!("{} ({})", format_index(index), filename)
    } else {
        format!("{} {}", format_index(index), title)
    }
}

fn status_label(status: DerivativeStatus) -> &'static str {
    match status {
        DerivativeStatus::Cached => "cached",
        DerivativeStatus::Copied => "copied",
        DerivativeStatus::Encoded => "encoded",
        DerivativeStatus::Encrypted => "encrypted",
    }
}

// ============================================================================
// Build events
// ============================================================================

/// Progress reported by the pipeline while it builds.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    GalleryStarted {
        index: usize,
        id: String,
        title: String,
        image_count: usize,
        visibility: &'static str,
    },
    ImageProcessed {
        index: usize,
        title: String,
        filename: String,
        derivatives: Vec<(DerivativeKind, DerivativeStatus)>,
    },
    ImageSkipped {
        filename: String,
        reason: String,
    },
    FilesRemoved {
        /// Paths relative to the output root.
        paths: Vec<String>,
    },
    GalleryWritten {
        id: String,
        cache: CacheStats,
        files_written: usize,
    },
    GalleryFailed {
        id: String,
        error: String,
        /// Pages from an earlier run are still being served.
        stale_output: bool,
    },
}

/// Format a single build event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::GalleryStarted {
            index,
            title,
            image_count,
            visibility,
            ..
        } => {
            let detail = (*visibility != "public").then_some(*visibility);
            vec![entity_header(*index, title, *image_count, detail)]
        }
        BuildEvent::ImageProcessed {
            index,
            title,
            filename,
            derivatives,
        } => {
            let mut lines = vec![format!("{}{}", indent(1), image_line(*index, title, filename))];
            if !title.is_empty() {
                lines.push(format!("{}Source: {}", indent(2), filename));
            }
            for (kind, status) in derivatives {
                lines.push(format!(
                    "{}{}: {}",
                    indent(2),
                    kind.dir_name(),
                    status_label(*status)
                ));
            }
            lines
        }
        BuildEvent::ImageSkipped { filename, reason } => {
            vec![format!("{}Skipped: {} ({})", indent(1), filename, reason)]
        }
        BuildEvent::FilesRemoved { paths } => paths
            .iter()
            .map(|p| format!("{}Removed: {}", indent(1), p))
            .collect(),
        BuildEvent::GalleryWritten {
            cache,
            files_written,
            ..
        } => vec![format!(
            "{}{}, {} files written",
            indent(1),
            cache,
            files_written
        )],
        BuildEvent::GalleryFailed {
            id,
            error,
            stale_output,
        } => failure_lines(id, error, *stale_output),
    }
}

/// Print a build event to stdout.
pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

/// Format the closing summary of a build.
pub fn format_build_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = vec![String::new()];
    let gallery_noun = if summary.galleries_built == 1 {
        "gallery"
    } else {
        "galleries"
    };
    let mut headline = format!(
        "Built {} {}, {} images",
        summary.galleries_built, gallery_noun, summary.images
    );
    if summary.skipped > 0 {
        headline.push_str(&format!(", {} skipped", summary.skipped));
    }
    if !summary.failures.is_empty() {
        headline.push_str(&format!(" ({} failed)", summary.failures.len()));
    }
    lines.push(headline);
    lines.push(format!(
        "{}{}, {} files written, {} removed",
        indent(1),
        summary.cache,
        summary.files_written,
        summary.files_removed
    ));
    for failure in &summary.failures {
        lines.extend(failure_lines(&failure.id, &failure.error, failure.stale_output));
    }
    lines
}

fn failure_lines(id: &str, error: &str, stale_output: bool) -> Vec<String> {
    let mut lines = vec![format!("{}FAILED {}: {}", indent(1), id, error)];
    if stale_output {
        lines.push(format!(
            "{}WARNING: output from an earlier build is still published at galleries/{}/",
            indent(2),
            id
        ));
    }
    lines
}

pub fn print_build_summary(summary: &BuildSummary) {
    for line in format_build_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the result of `check`: every gallery that would build, then the
/// ones that would not.
pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, gallery) in report.galleries.iter().enumerate() {
        let detail = (gallery.visibility != "public").then_some(gallery.visibility);
        lines.push(entity_header(i + 1, &gallery.title, gallery.image_count, detail));
        lines.push(format!("{}Source: {}/", indent(1), gallery.id));
    }
    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Errors".to_string());
        for failure in &report.failures {
            lines.push(format!("{}{}: {}", indent(1), failure.id, failure.error));
        }
    }
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}

//! Output reconciliation.
//!
//! After a gallery is built, its output directories should hold exactly the
//! files the build expects. Anything else is an orphan: the derivatives and
//! JSON of a deleted or renamed image, the old `{private id}.html` page after
//! a password change, or a `.tmp` file left by an interrupted write.
//! [`reconcile_gallery`] removes those, then any directories left empty.
//!
//! [`sweep_orphan_galleries`] handles the level above: output directories of
//! galleries that no longer exist in the source tree at all.
//!
//! Both operate on one gallery directory at a time and never look outside
//! `public_html/galleries/` and `metadata/`.

use crate::layout::OutputLayout;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("cannot remove {}: {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },
    #[error("cannot read {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Delete every file under the gallery's public and metadata directories
/// that is not in `expected`, then prune empty directories.
///
/// Returns the removed files, sorted.
pub fn reconcile_gallery(
    layout: &OutputLayout,
    gallery_id: &str,
    expected: &BTreeSet<PathBuf>,
) -> Result<Vec<PathBuf>, ReconcileError> {
    let mut removed = Vec::new();
    for root in [
        layout.gallery_public_dir(gallery_id),
        layout.gallery_metadata_dir(gallery_id),
    ] {
        if !root.is_dir() {
            continue;
        }
        remove_unexpected(&root, expected, &mut removed)?;
        prune_empty_dirs(&root)?;
    }
    removed.sort();
    Ok(removed)
}

fn remove_unexpected(
    root: &Path,
    expected: &BTreeSet<PathBuf>,
    removed: &mut Vec<PathBuf>,
) -> Result<(), ReconcileError> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| ReconcileError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() || expected.contains(entry.path()) {
            continue;
        }
        let path = entry.into_path();
        fs::remove_file(&path).map_err(|source| ReconcileError::Remove {
            path: path.clone(),
            source,
        })?;
        removed.push(path);
    }
    Ok(())
}

/// Remove empty directories under (and including) `root`, deepest first.
fn prune_empty_dirs(root: &Path) -> Result<(), ReconcileError> {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|source| ReconcileError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_empty = fs::read_dir(entry.path())
            .map(|mut rd| rd.next().is_none())
            .unwrap_or(false);
        if is_empty {
            fs::remove_dir(entry.path()).map_err(|source| ReconcileError::Remove {
                path: entry.path().to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Remove output directories of galleries not in `keep`.
///
/// `keep` must hold every gallery present in the source tree, including ones
/// that failed this run: a failed build leaves its previous output alone.
/// Returns the removed directories, sorted.
pub fn sweep_orphan_galleries(
    layout: &OutputLayout,
    keep: &BTreeSet<String>,
) -> Result<Vec<PathBuf>, ReconcileError> {
    let mut removed = Vec::new();
    for parent in [layout.public_galleries_dir(), layout.metadata_dir()] {
        if !parent.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&parent).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|source| ReconcileError::Walk {
                path: parent.clone(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if keep.contains(name.as_ref()) {
                continue;
            }
            let path = entry.into_path();
            fs::remove_dir_all(&path).map_err(|source| ReconcileError::Remove {
                path: path.clone(),
                source,
            })?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DerivativeKind;
    use crate::test_helpers::list_files;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn expected_for(layout: &OutputLayout, gallery: &str, ids: &[&str]) -> BTreeSet<PathBuf> {
        let mut set = BTreeSet::new();
        for id in ids {
            for kind in DerivativeKind::ALL {
                set.insert(layout.derivative_path(gallery, kind, id));
            }
            set.insert(layout.image_json(gallery, id));
            set.insert(layout.image_page(gallery, id));
        }
        set.insert(layout.gallery_json(gallery));
        set.insert(layout.gallery_page(gallery));
        set
    }

    fn materialize(set: &BTreeSet<PathBuf>) {
        for p in set {
            touch(p);
        }
    }

    #[test]
    fn removes_files_of_deleted_image() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        materialize(&expected_for(&layout, "g", &["aaa", "bbb"]));

        let expected = expected_for(&layout, "g", &["aaa"]);
        let removed = reconcile_gallery(&layout, "g", &expected).unwrap();

        assert_eq!(removed.len(), 5);
        assert!(removed.contains(&layout.derivative_path("g", DerivativeKind::Full, "bbb")));
        assert!(removed.contains(&layout.image_json("g", "bbb")));
        for p in &expected {
            assert!(p.is_file(), "{} should survive", p.display());
        }
    }

    #[test]
    fn nothing_removed_when_output_matches() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        let expected = expected_for(&layout, "g", &["aaa"]);
        materialize(&expected);

        assert!(reconcile_gallery(&layout, "g", &expected).unwrap().is_empty());
    }

    #[test]
    fn stale_private_page_and_temp_files_are_removed() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        let expected = expected_for(&layout, "g", &["aaa"]);
        materialize(&expected);

        let old_private = layout.private_gallery_page("g", "fff4af5f2a081527");
        let stray_tmp = crate::fsutil::temp_path_for(&layout.gallery_json("g"));
        touch(&old_private);
        touch(&stray_tmp);

        let removed = reconcile_gallery(&layout, "g", &expected).unwrap();
        assert_eq!(removed, {
            let mut v = vec![old_private, stray_tmp];
            v.sort();
            v
        });
    }

    #[test]
    fn empty_directories_are_pruned() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        materialize(&expected_for(&layout, "g", &["aaa"]));

        reconcile_gallery(&layout, "g", &BTreeSet::new()).unwrap();
        assert!(!layout.gallery_public_dir("g").exists());
        assert!(!layout.gallery_metadata_dir("g").exists());
    }

    #[test]
    fn other_galleries_are_untouched() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        materialize(&expected_for(&layout, "g", &["aaa"]));
        materialize(&expected_for(&layout, "h", &["bbb"]));

        reconcile_gallery(&layout, "g", &BTreeSet::new()).unwrap();
        assert_eq!(list_files(&layout.gallery_public_dir("h")).len(), 5);
    }

    #[test]
    fn missing_gallery_directories_are_fine() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        assert!(reconcile_gallery(&layout, "nope", &BTreeSet::new())
            .unwrap()
            .is_empty());
    }

    // =========================================================================
    // Orphan gallery sweep
    // =========================================================================

    #[test]
    fn sweep_removes_only_unknown_galleries() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path());
        materialize(&expected_for(&layout, "kept", &["a"]));
        materialize(&expected_for(&layout, "renamed", &["b"]));
        touch(&layout.galleries_json());
        touch(&layout.site_index());

        let keep: BTreeSet<String> = ["kept".to_string()].into();
        let removed = sweep_orphan_galleries(&layout, &keep).unwrap();

        assert_eq!(
            removed,
            vec![
                layout.gallery_metadata_dir("renamed"),
                layout.gallery_public_dir("renamed"),
            ]
        );
        assert!(layout.gallery_public_dir("kept").is_dir());
        assert!(layout.galleries_json().is_file());
        assert!(layout.site_index().is_file());
    }
}

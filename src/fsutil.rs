//! Crash-safe file writes.
//!
//! Every artifact the pipeline produces goes through [`write_if_changed`]:
//! bytes land in a hidden sibling temp file (`.{name}.tmp`) and are renamed
//! over the target, so an interrupted run leaves at most one stray temp file
//! and never a truncated derivative or JSON document. Stray temp files are
//! unexpected output and get removed by the reconciler on the next run.
//!
//! Files whose on-disk bytes already match are left untouched, which keeps
//! a rebuild of an unchanged tree free of modifications.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Whether a write actually touched the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Suffix shared by all in-flight temp files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Temp path used while writing `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}{}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        TEMP_SUFFIX
    ))
}

/// Write to a temp file in the same directory, then rename over `path`.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    if let Err(e) = fs::write(&tmp_path, bytes) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)
}

/// [`write_atomic`] unless the file already holds exactly these bytes.
pub fn write_if_changed(path: &Path, bytes: &[u8]) -> io::Result<WriteOutcome> {
    match fs::read(path) {
        Ok(existing) if existing == bytes => return Ok(WriteOutcome::Unchanged),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    write_atomic(path, bytes)?;
    Ok(WriteOutcome::Written)
}

/// Serialize as pretty JSON with a trailing newline and write if changed.
pub fn write_json_if_changed<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> io::Result<WriteOutcome> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    write_if_changed(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/out/full/abc.jpg")),
            PathBuf::from("/out/full/.abc.jpg.tmp")
        );
    }

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/c.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn write_if_changed_skips_identical_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.bin");

        assert_eq!(write_if_changed(&path, b"one").unwrap(), WriteOutcome::Written);
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(write_if_changed(&path, b"one").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);

        assert_eq!(write_if_changed(&path, b"two").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn write_json_appends_newline() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("v.json");
        write_json_if_changed(&path, &serde_json::json!({"a": 1})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"a\": 1"));
    }
}

//! Derivative cache for incremental builds.
//!
//! Decoding, resizing and re-encoding every source image three times is the
//! slow part of a build. This module lets the builder skip that work when the
//! source bytes and encoding parameters are unchanged since the last run.
//!
//! # Cache keys
//!
//! The cache is **content-addressed**: lookups go by `source_hash` plus
//! `params_hash`, not by output path, so renaming a gallery directory does
//! not force a re-encode.
//!
//! - **`source_hash`**: SHA-256 of the source file contents. Survives
//!   `git checkout`, which resets modification times.
//! - **`params_hash`**: SHA-256 of the derivative kind, bound and quality.
//!   For encrypted galleries it also covers the published verification hash
//!   and the image id, because both the key and the IV are derived from them:
//!   a password change must re-encrypt rather than reuse old ciphertext.
//!
//! A hit requires an entry with both hashes and the recorded output file
//! still on disk. When the recorded path differs from the one now wanted, the
//! file is copied instead of re-encoded.
//!
//! # Storage
//!
//! The manifest is `<output>/.cache-manifest.json`. Entries are kept in a
//! `BTreeMap` so the file is byte-stable between identical runs, and entries
//! whose output no longer exists are pruned before saving.
//!
//! Pass `--no-cache` to `build` to start from an empty manifest.

use crate::fsutil::{self, WriteOutcome};
use crate::layout::DerivativeKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the output directory.
pub const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Bump to invalidate every existing cache when key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached output file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// Output paths (relative to the output root) mapped to what produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` → output path. Rebuilt on load.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the output directory. A missing, corrupt or outdated
    /// manifest yields an empty one; the cache is never worth failing over.
    pub fn load(output_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(output_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    /// Drop entries whose output file is gone, then write the manifest if
    /// its bytes changed.
    pub fn save(&mut self, output_dir: &Path) -> io::Result<WriteOutcome> {
        self.prune_missing(output_dir);
        fsutil::write_json_if_changed(&manifest_path(output_dir), self)
    }

    /// Remove entries whose output file no longer exists.
    pub fn prune_missing(&mut self, output_dir: &Path) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|output_path, _| output_dir.join(output_path).is_file());
        self.content_index = build_content_index(&self.entries);
        before - self.entries.len()
    }

    /// Look up a cached output file by content hashes.
    ///
    /// Returns the stored output path if an entry matches **and** the file
    /// is still on disk. The path may differ from the one the caller wants.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<String> {
        let content_key = format!("{}:{}", source_hash, params_hash);
        let stored_path = self.content_index.get(&content_key)?;
        if output_dir.join(stored_path).is_file() {
            Some(stored_path.clone())
        } else {
            None
        }
    }

    /// Record a cache entry for an output file.
    ///
    /// If the same content was recorded under another path, that entry is
    /// replaced.
    pub fn insert(&mut self, output_path: String, source_hash: String, params_hash: String) {
        let content_key = format!("{}:{}", source_hash, params_hash);

        if let Some(old_path) = self.content_index.get(&content_key)
            && *old_path != output_path
        {
            self.entries.remove(old_path.as_str());
        }

        self.content_index.insert(content_key, output_path.clone());
        self.entries.insert(
            output_path,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn build_content_index(entries: &BTreeMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_path, entry)| {
            let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (content_key, output_path.clone())
        })
        .collect()
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 of a byte buffer, hex encoded.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// What, besides the source bytes, determines the contents of an encrypted
/// derivative.
#[derive(Debug, Clone, Copy)]
pub struct EncryptionParams<'a> {
    /// The gallery's published `private_gallery_id_hash`.
    pub verification_hash: &'a str,
    /// The image id, which seeds the IV.
    pub image_id: &'a str,
}

/// SHA-256 of the encoding parameters for one derivative.
pub fn hash_derivative_params(
    kind: DerivativeKind,
    bound: u32,
    quality: u32,
    encryption: Option<EncryptionParams<'_>>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.dir_name().as_bytes());
    hasher.update(b"\0");
    hasher.update(bound.to_le_bytes());
    hasher.update(quality.to_le_bytes());
    match encryption {
        Some(enc) => {
            hasher.update(b"\x01");
            hasher.update(enc.verification_hash.as_bytes());
            hasher.update(b"\0");
            hasher.update(enc.image_id.as_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }

    pub fn absorb(&mut self, other: CacheStats) {
        self.hits += other.hits;
        self.copies += other.copies;
        self.misses += other.misses;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.copies > 0 {
            if self.copies > 0 {
                write!(
                    f,
                    "{} cached, {} copied, {} encoded ({} total)",
                    self.hits,
                    self.copies,
                    self.misses,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} encoded ({} total)",
                    self.hits,
                    self.misses,
                    self.total()
                )
            }
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// Resolve the cache manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

//! Deterministic identifiers and key material.
//!
//! Every id, key and IV the pipeline uses is a pure function of stable inputs:
//! the gallery id (its source directory name), the image filename, and, for
//! protected galleries, the password. Nothing here touches the filesystem or
//! keeps state, so the same inputs reproduce the same ciphertext, filenames
//! and URLs on every run and on every machine.
//!
//! ## Derivations
//!
//! ```text
//! image id (public)     hex(md5("{gallery}:{filename}"))[..12]
//! image id (encrypted)  hex(sha256("{gallery}:{filename}"))[..16]
//! private gallery id    hex(sha256("{gallery}:{password}"))[..16]
//! verification hash     hex(sha256(private gallery id))
//! encryption key        sha256(private gallery id)            (32 bytes)
//! image IV              sha256(image id)[..16]                (16 bytes)
//! ```
//!
//! Strings are hashed as their UTF-8 bytes. The browser runtime repeats the
//! private-id and hash derivations from the password a visitor types in, so
//! these formulas are a wire contract and must never change shape.
//!
//! ## Secrets
//!
//! [`Password`] and [`PrivateGalleryId`] hold their contents in
//! [`Zeroizing`] buffers and deliberately implement neither `Serialize` nor
//! `Display`, so no metadata struct can carry them into JSON or HTML by
//! accident. Only [`private_gallery_id_hash`] output is ever written out.
//!
//! Note that the verification hash and the encryption key are the same
//! SHA-256 digest, once as hex and once as raw bytes. Anyone holding a login
//! page can therefore decrypt that gallery's images without the password.
//! The browser runtime depends on this shape, so changing it means changing
//! the client and re-encrypting every gallery.

use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Hex length of image ids in unencrypted galleries.
pub const PUBLIC_IMAGE_ID_LEN: usize = 12;
/// Hex length of image ids in encrypted galleries.
pub const ENCRYPTED_IMAGE_ID_LEN: usize = 16;
/// Hex length of the private gallery id.
pub const PRIVATE_ID_LEN: usize = 16;
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// AES block / IV length in bytes.
pub const IV_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("password must not be empty")]
    EmptyPassword,
}

/// A gallery password as read from `gallery.yaml`.
///
/// Consumed by [`derive_access`]; it cannot be serialized or printed.
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Password::new)
    }
}

/// The password-derived gallery identifier.
///
/// Names the protected gallery page and seeds the encryption key. Lives only
/// as long as one gallery is being built.
pub struct PrivateGalleryId(Zeroizing<String>);

impl PrivateGalleryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateGalleryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateGalleryId(<redacted>)")
    }
}

/// 256-bit AES key, wiped on drop.
pub type EncryptionKey = Zeroizing<[u8; KEY_LEN]>;

/// Everything a protected gallery needs from its password, derived once.
#[derive(Debug)]
pub struct GalleryAccess {
    pub private_id: PrivateGalleryId,
    /// Verification hash; the only password-derived value that is published.
    pub hash: String,
}

impl GalleryAccess {
    /// Fresh key for one image's encryption call.
    pub fn encryption_key(&self) -> EncryptionKey {
        encryption_key(&self.private_id)
    }
}

fn sha256_hex(input: &[u8]) -> String {
    format!("{:x}", Sha256::digest(input))
}

/// Deterministic image id, used as the filename stem of every derivative and
/// as the per-image page name.
pub fn image_id(gallery_id: &str, filename: &str, encrypted: bool) -> String {
    let unique = format!("{}:{}", gallery_id, filename);
    if encrypted {
        let mut id = sha256_hex(unique.as_bytes());
        id.truncate(ENCRYPTED_IMAGE_ID_LEN);
        id
    } else {
        let mut id = format!("{:x}", md5::compute(unique.as_bytes()));
        id.truncate(PUBLIC_IMAGE_ID_LEN);
        id
    }
}

/// Private gallery id for a password. Empty passwords are rejected before
/// anything is hashed.
pub fn private_gallery_id(
    gallery_id: &str,
    password: &Password,
) -> Result<PrivateGalleryId, IdentityError> {
    if password.is_empty() {
        return Err(IdentityError::EmptyPassword);
    }
    let combined = Zeroizing::new(format!("{}:{}", gallery_id, password.expose()));
    let mut id = sha256_hex(combined.as_bytes());
    id.truncate(PRIVATE_ID_LEN);
    Ok(PrivateGalleryId(Zeroizing::new(id)))
}

/// Full (untruncated) SHA-256 hex of the private id.
pub fn private_gallery_id_hash(private_id: &PrivateGalleryId) -> String {
    sha256_hex(private_id.as_str().as_bytes())
}

/// Raw SHA-256 of the private id, used directly as the AES-256 key.
pub fn encryption_key(private_id: &PrivateGalleryId) -> EncryptionKey {
    let digest = Sha256::digest(private_id.as_str().as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&digest);
    key
}

/// First 16 bytes of SHA-256 of the image id.
pub fn image_iv(image_id: &str) -> [u8; IV_LEN] {
    let digest = Sha256::digest(image_id.as_bytes());
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&digest[..IV_LEN]);
    iv
}

/// Derive the private id and its hash, consuming the password.
pub fn derive_access(gallery_id: &str, password: Password) -> Result<GalleryAccess, IdentityError> {
    let private_id = private_gallery_id(gallery_id, &password)?;
    let hash = private_gallery_id_hash(&private_id);
    Ok(GalleryAccess { private_id, hash })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Image ids
    // =========================================================================

    #[test]
    fn public_image_id_is_truncated_md5() {
        let id = image_id("20240715", "sunset.jpg", false);
        assert_eq!(id, "4c3d1a9961d1");
        assert_eq!(id.len(), PUBLIC_IMAGE_ID_LEN);
    }

    #[test]
    fn encrypted_image_id_is_truncated_sha256() {
        let id = image_id("20240715", "sunset.jpg", true);
        assert_eq!(id, "85ec41bbc2d52bf1");
        assert_eq!(id.len(), ENCRYPTED_IMAGE_ID_LEN);
    }

    #[test]
    fn image_id_is_deterministic() {
        for encrypted in [false, true] {
            let a = image_id("trip", "IMG_0001.jpg", encrypted);
            let b = image_id("trip", "IMG_0001.jpg", encrypted);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn image_id_depends_on_gallery() {
        assert_ne!(
            image_id("a", "x.jpg", false),
            image_id("b", "x.jpg", false)
        );
    }

    #[test]
    fn image_id_is_lowercase_hex() {
        let id = image_id("20240715", "Ünïcødé.jpg", true);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    // =========================================================================
    // Private ids, hashes, keys
    // =========================================================================

    #[test]
    fn private_gallery_id_matches_reference() {
        let id = private_gallery_id("20240715", &Password::new("secret123")).unwrap();
        assert_eq!(id.as_str(), "fff4af5f2a081527");
    }

    #[test]
    fn private_gallery_id_hash_matches_client_derivation() {
        let id = private_gallery_id("20240715", &Password::new("secret123")).unwrap();
        assert_eq!(
            private_gallery_id_hash(&id),
            "4ebc62cf4f6779698f577488993c12e69ecc804f29ca38d5b35604fc2f410617"
        );
    }

    #[test]
    fn different_passwords_give_different_private_ids() {
        let a = private_gallery_id("20240715", &Password::new("secret123")).unwrap();
        let b = private_gallery_id("20240715", &Password::new("other-pass")).unwrap();
        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(b.as_str(), "fc82d88cdbe6b7ff");
    }

    #[test]
    fn empty_password_is_rejected() {
        let result = private_gallery_id("20240715", &Password::new(""));
        assert_eq!(result.unwrap_err(), IdentityError::EmptyPassword);
    }

    #[test]
    fn derive_access_rejects_empty_password() {
        assert!(matches!(
            derive_access("g", Password::new("")),
            Err(IdentityError::EmptyPassword)
        ));
    }

    #[test]
    fn encryption_key_is_raw_sha256_of_private_id() {
        let id = private_gallery_id("20240715", &Password::new("secret123")).unwrap();
        let key = encryption_key(&id);
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(
            hex::encode(*key),
            "4ebc62cf4f6779698f577488993c12e69ecc804f29ca38d5b35604fc2f410617"
        );
    }

    #[test]
    fn image_iv_is_sha256_prefix() {
        let iv = image_iv("85ec41bbc2d52bf1");
        assert_eq!(hex::encode(iv), "db6eca5992ba1a98d8bddf6428f43bdf");
    }

    #[test]
    fn access_key_matches_free_function() {
        let access = derive_access("20240715", Password::new("secret123")).unwrap();
        assert_eq!(*access.encryption_key(), *encryption_key(&access.private_id));
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let access = derive_access("20240715", Password::new("secret123")).unwrap();
        let rendered = format!("{:?} {:?}", access, Password::new("secret123"));
        assert!(!rendered.contains("secret123"));
        assert!(!rendered.contains(access.private_id.as_str()));
    }

    #[test]
    fn password_deserializes_from_yaml_string() {
        let pw: Password = serde_yaml::from_str("\"hunter2\"").unwrap();
        assert!(!pw.is_empty());
        assert_eq!(pw.expose(), "hunter2");
    }
}

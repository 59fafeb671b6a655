//! AES-256-CBC encryption of derivative images.
//!
//! Encrypt-only: the generator never needs to read its own ciphertext back,
//! and decryption lives entirely in the browser runtime, which derives the
//! same key and IV from the visitor's password (see [`identity`](crate::identity)).
//!
//! Output layout is the raw CBC ciphertext with PKCS#7 padding. The IV is not
//! prepended; the client recomputes it from the image id.

use crate::identity::{IV_LEN, KEY_LEN};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid IV length: expected 16 bytes, got {0}")]
    InvalidIvLength(usize),
    #[error("cipher initialisation failed")]
    Cipher,
}

/// Encrypt `plain` under `key`/`iv`.
///
/// Lengths are checked up front; nothing is truncated or padded to fit.
pub fn encrypt(plain: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength(key.len()));
    }
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidIvLength(iv.len()));
    }
    let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| CryptoError::Cipher)?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plain))
}

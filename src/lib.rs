//! # Photo Gal
//!
//! A static photo gallery generator. Each directory with a `gallery.yaml`
//! becomes a gallery; every image in it gets three JPEG derivatives (cover,
//! full, thumbnail), a metadata JSON file and an HTML page.
//!
//! # Identity Scheme
//!
//! Everything a reader sees is named by ids derived deterministically from
//! gallery id, filename and password, so an unchanged source always produces
//! byte-identical output:
//!
//! ```text
//! image id (public)     md5("{gallery}:{filename}")[..12]
//! image id (encrypted)  sha256("{gallery}:{filename}")[..16]
//! private id            sha256("{gallery}:{password}")[..16]
//! verification hash     sha256(private id)
//! AES key               sha256(private id)            (raw 32 bytes)
//! IV                    sha256(image id)[..16]
//! ```
//!
//! A password protected gallery publishes a login page carrying only the
//! verification hash; the actual page is `{private id}.html`. An encrypted
//! gallery additionally stores each derivative as AES-256-CBC ciphertext
//! that the browser decrypts after login. Because the verification hash is
//! the hex of the key, encryption here hides images from people who never
//! had the password. It does not withstand someone who reads the published
//! hash; see [`identity`].
//!
//! # Pipeline
//!
//! ```text
//! scan ─> plan ─> build (parallel per image) ─> render ─> reconcile
//!                                                     └─> galleries.json, index.html
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Finds gallery directories and their images |
//! | [`gallery`] | `gallery.yaml` and sidecar parsing, validation, [`gallery::Visibility`] |
//! | [`identity`] | Image ids, private ids, key and IV derivation |
//! | [`crypto`] | AES-256-CBC encryption of derivatives |
//! | [`builder`] | Planning and building one gallery: derivatives, model, JSON |
//! | [`cache`] | Content-addressed derivative cache |
//! | [`render`] | HTML pages with Maud |
//! | [`reconcile`] | Removes output the current source no longer produces |
//! | [`pipeline`] | Runs all of the above over the source tree |
//! | [`config`] | `config.toml` loading and validation |
//! | [`layout`] | Every output path and URL |
//! | [`imaging`] | Decoding, EXIF, resizing and JPEG encoding |
//! | [`output`] | CLI progress formatting |
//!
//! Writes are atomic (temp file and rename) and skipped when the bytes on disk
//! already match, so a rebuild with nothing changed touches no file.

pub mod builder;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod fsutil;
pub mod gallery;
pub mod identity;
pub mod imaging;
pub mod layout;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod render;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

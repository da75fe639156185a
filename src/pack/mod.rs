//! # Resource Packs
//!
//! Capture of the packs a server streams to its clients.
//!
//! ## Components
//! - **Cipher**: AES/CFB8 with the key-prefix IV used by pack content keys
//! - **Archive**: zip normalization and content decryption
//! - **Downloader**: per-pack chunk collection and the bounded worker pool

pub mod archive;
pub mod cipher;
pub mod downloader;

pub use archive::PackArchive;
pub use downloader::PackDownloader;

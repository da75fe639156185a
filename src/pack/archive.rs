//! In-memory view of a resource pack archive.
//!
//! Packs arrive as zip files in a few shapes: the manifest at the root, the
//! whole pack nested inside one folder, or (from a CDN) a zip wrapping
//! another zip. [`PackArchive`] normalizes those shapes and removes the
//! content encryption before the pack is written back to disk.

use crate::error::{RelayError, Result};
use crate::pack::cipher::{decrypt_in_place, key_bytes};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MANIFEST: &str = "manifest.json";
pub const PACK_MANIFEST: &str = "pack_manifest.json";
pub const CONTENTS: &str = "contents.json";

/// Length of the plaintext header in front of an encrypted `contents.json`.
pub const CONTENTS_HEADER_LEN: usize = 256;

/// Files that ship unencrypted even in encrypted packs.
pub const UNENCRYPTED_FILES: &[&str] = &[
    "manifest.json",
    "pack_manifest.json",
    "pack_icon.png",
    "README.txt",
];

/// Upper bound on the read buffer reserved from an entry's declared size.
const ENTRY_PREALLOC_LIMIT: u64 = 1 << 20;

#[derive(Debug, Deserialize)]
struct ContentsIndex {
    #[serde(default)]
    content: Vec<ContentEntry>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    path: String,
    key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackArchive {
    files: BTreeMap<String, Vec<u8>>,
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl PackArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a zip held in memory. Directory entries are implied by paths.
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut files = BTreeMap::new();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size().min(ENTRY_PREALLOC_LIMIT) as usize);
            entry.read_to_end(&mut data)?;
            files.insert(normalize(entry.name()), data);
        }
        Ok(Self { files })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_zip_bytes(&fs::read(path)?)
    }

    pub fn insert(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(normalize(path), data.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn has_manifest(&self) -> bool {
        self.files.contains_key(MANIFEST) || self.files.contains_key(PACK_MANIFEST)
    }

    /// Replaces a manifest-less archive with the first zip found at its root.
    /// Returns whether a replacement happened.
    pub fn unwrap_nested_zip(&mut self) -> Result<bool> {
        if self.has_manifest() {
            return Ok(false);
        }
        let nested = self
            .files
            .iter()
            .find(|(path, _)| !path.contains('/') && path.to_ascii_lowercase().ends_with(".zip"));
        let Some((name, data)) = nested else {
            return Ok(false);
        };
        debug!(entry = %name, "Unwrapping nested pack archive");
        let inner = Self::from_zip_bytes(data)?;
        *self = inner;
        Ok(true)
    }

    fn single_top_level_dir(&self) -> Option<String> {
        let mut dirs = self
            .files
            .keys()
            .filter_map(|path| path.split_once('/').map(|(dir, _)| dir));
        let first = dirs.next()?;
        dirs.all(|dir| dir == first).then(|| first.to_string())
    }

    /// Moves the contents of a lone top-level folder to the root until a
    /// manifest shows up or the layout stops being a single folder.
    pub fn orient(&mut self) {
        while !self.has_manifest() {
            let Some(dir) = self.single_top_level_dir() else {
                return;
            };
            debug!(dir = %dir, "Promoting pack folder to root");
            let prefix = format!("{dir}/");
            let files = std::mem::take(&mut self.files);
            for (path, data) in files {
                match path.strip_prefix(&prefix) {
                    Some(rest) => {
                        self.files.insert(rest.to_string(), data);
                    }
                    None => {
                        self.files.entry(path).or_insert(data);
                    }
                }
            }
        }
    }

    /// Removes content encryption with the pack's content key.
    ///
    /// `contents.json` carries a plaintext header followed by the encrypted
    /// index of per-file keys. Listed files are decrypted with their own key
    /// unless they have none or are one of [`UNENCRYPTED_FILES`]. Returns
    /// `false` when there was nothing to decrypt.
    pub fn decrypt(&mut self, content_key: &str) -> Result<bool> {
        if content_key.is_empty() {
            return Ok(false);
        }
        let Some(contents) = self.files.get(CONTENTS) else {
            return Ok(false);
        };
        let mut index = contents
            .get(CONTENTS_HEADER_LEN..)
            .ok_or_else(|| RelayError::Crypto(format!("{CONTENTS} is shorter than its header")))?
            .to_vec();
        decrypt_in_place(&key_bytes(content_key), &mut index)?;
        let parsed: ContentsIndex = serde_json::from_slice(&index)?;

        let mut decrypted = 0usize;
        for entry in parsed.content {
            let Some(key) = entry.key.as_deref() else {
                continue;
            };
            let path = normalize(&entry.path);
            if UNENCRYPTED_FILES.contains(&file_name(&path)) {
                continue;
            }
            let Some(data) = self.files.get_mut(&path) else {
                continue;
            };
            decrypt_in_place(&key_bytes(key), data)?;
            decrypted += 1;
        }

        self.files.insert(CONTENTS.to_string(), index);
        debug!(files = decrypted, "Decrypted pack contents");
        Ok(true)
    }

    pub fn write_zip<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (path, data) in &self.files {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?)
    }

    pub fn to_zip_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_zip(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Writes the archive to `path` through a temporary file in the same
    /// directory, so readers never observe a half-written pack.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = NamedTempFile::new_in(dir)?;
        let file = self.write_zip(temp.reopen()?)?;
        file.sync_all()?;
        temp.persist(path).map_err(|e| RelayError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::cipher::encrypt_in_place;

    const CONTENT_KEY: &str = "abcdefghijklmnopqrstuvwxyz012345";
    const FILE_KEY: &str = "ZYXWVUTSRQPONMLKJIHGFEDCBA987654";

    fn encrypted_pack() -> PackArchive {
        let mut pack = PackArchive::new();
        pack.insert(MANIFEST, b"{\"header\":{}}".to_vec());
        pack.insert("pack_icon.png", b"png".to_vec());

        let mut texture = b"texture bytes".to_vec();
        encrypt_in_place(&key_bytes(FILE_KEY), &mut texture).unwrap();
        pack.insert("textures/a.png", texture);

        let index = serde_json::json!({
            "content": [
                {"path": "textures/a.png", "key": FILE_KEY},
                {"path": "pack_icon.png", "key": FILE_KEY},
                {"path": "missing.png", "key": FILE_KEY},
                {"path": "texts/en_US.lang", "key": null},
            ]
        });
        let mut body = serde_json::to_vec(&index).unwrap();
        encrypt_in_place(&key_bytes(CONTENT_KEY), &mut body).unwrap();
        let mut contents = vec![0u8; CONTENTS_HEADER_LEN];
        contents.extend(body);
        pack.insert(CONTENTS, contents);
        pack
    }

    #[test]
    fn test_decrypt_leaves_reserved_files() {
        let mut pack = encrypted_pack();
        assert!(pack.decrypt(CONTENT_KEY).unwrap());

        assert_eq!(pack.get("textures/a.png"), Some(&b"texture bytes"[..]));
        assert_eq!(pack.get("pack_icon.png"), Some(&b"png"[..]));
        assert_eq!(pack.get(MANIFEST), Some(&b"{\"header\":{}}"[..]));
        let index: serde_json::Value = serde_json::from_slice(pack.get(CONTENTS).unwrap()).unwrap();
        assert_eq!(index["content"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_decrypt_skips_without_key_or_index() {
        let mut pack = encrypted_pack();
        let before = pack.clone();
        assert!(!pack.decrypt("").unwrap());
        assert_eq!(pack, before);

        let mut plain = PackArchive::new();
        plain.insert(MANIFEST, b"{}".to_vec());
        assert!(!plain.decrypt(CONTENT_KEY).unwrap());
    }

    #[test]
    fn test_orient_promotes_nested_folders() {
        let mut pack = PackArchive::new();
        pack.insert("Outer/Inner/manifest.json", b"{}".to_vec());
        pack.insert("Outer/Inner/textures/a.png", b"a".to_vec());
        pack.orient();

        assert!(pack.has_manifest());
        assert_eq!(pack.get("textures/a.png"), Some(&b"a"[..]));
        assert!(pack.paths().all(|p| !p.starts_with("Outer")));
    }

    #[test]
    fn test_orient_stops_at_multiple_folders() {
        let mut pack = PackArchive::new();
        pack.insert("a/manifest.json", b"{}".to_vec());
        pack.insert("b/manifest.json", b"{}".to_vec());
        let before = pack.clone();
        pack.orient();
        assert_eq!(pack, before);
    }

    #[test]
    fn test_unwrap_nested_zip() {
        let mut inner = PackArchive::new();
        inner.insert(MANIFEST, b"{}".to_vec());
        let mut outer = PackArchive::new();
        outer.insert("pack.zip", inner.to_zip_bytes().unwrap());

        assert!(outer.unwrap_nested_zip().unwrap());
        assert_eq!(outer, inner);
        assert!(!outer.unwrap_nested_zip().unwrap());
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.zip");
        let pack = encrypted_pack();
        pack.save(&path).unwrap();
        assert_eq!(PackArchive::open(&path).unwrap(), pack);
    }

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = !0u32;
        for byte in data {
            crc ^= u32::from(*byte);
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    /// A stored single-entry zip whose central directory claims a zip64
    /// uncompressed size of `declared` bytes.
    fn zip_declaring_size(name: &str, data: &[u8], declared: u64) -> Vec<u8> {
        let crc = crc32(data);
        let mut out = Vec::new();

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        let central_offset = out.len();
        out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&u32::MAX.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&[0; 14]);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&declared.to_le_bytes());
        let central_len = out.len() - central_offset;

        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&(central_len as u32).to_le_bytes());
        out.extend_from_slice(&(central_offset as u32).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn test_declared_entry_size_is_not_trusted() {
        let bytes = zip_declaring_size("big.bin", b"hello", 1 << 62);

        // Reserving 4 EiB up front would abort the process.
        match PackArchive::from_zip_bytes(&bytes) {
            Ok(pack) => assert_eq!(pack.get("big.bin"), Some(&b"hello"[..])),
            Err(error) => assert!(matches!(error, RelayError::Archive(_) | RelayError::Io(_))),
        }
    }
}

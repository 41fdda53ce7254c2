//! Blob storage for uploaded sources, derived documents and merged outputs
//!
//! Records only hold blob keys (relative paths such as `converted/123456_1_1_a.pdf`).
//! Keys are written once: an existing key is never overwritten.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Blob storage trait
pub trait BlobStore: Send + Sync {
    /// Store a new blob; fails if the key is already taken
    fn store_file(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Retrieve a blob as bytes
    fn retrieve_file(&self, key: &str) -> Result<Vec<u8>>;

    /// Open a blob for streaming reads
    fn open_file(&self, key: &str) -> Result<Box<dyn Read + Send>>;

    /// Check if a blob exists
    fn file_exists(&self, key: &str) -> bool;

    /// Get blob size in bytes
    fn file_size(&self, key: &str) -> Result<u64>;

    /// Delete a blob
    fn delete_file(&self, key: &str) -> Result<()>;
}

/// Random hex token so bytes can be staged before a sequence exists
fn staging_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Key for an uploaded source: `uploads/{order}_{line}_{token}_{name}`
pub fn upload_key(order_number: u32, line_number: u32, safe_name: &str) -> String {
    format!(
        "uploads/{order_number}_{line_number}_{}_{safe_name}",
        staging_token()
    )
}

/// Key for the derived PDF of one version
pub fn converted_key(order_number: u32, line_number: u32, sequence: u32, stem: &str) -> String {
    format!("converted/{order_number}_{line_number}_{sequence}_{stem}.pdf")
}

/// Key for a merged output: `merged/merged_{order}_{token}.pdf`
pub fn merged_key(order_number: u32) -> String {
    format!("merged/merged_{order_number}_{}.pdf", staging_token())
}

fn missing(key: &str) -> Error {
    Error::NotFound(format!("blob {key}"))
}

/// Filesystem blob store rooted at one directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        tracing::debug!("Blob store rooted at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, rejecting anything that escapes it
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::Validation(format!("invalid blob key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn store_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if path.exists() {
            return Err(Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "blob key already taken"),
            ));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        // Write to a sibling temp file, then link it into place so readers
        // never observe a partial blob. Linking fails on an existing target,
        // which makes the write-once check atomic.
        let tmp = path.with_extension(format!("tmp-{:08x}", rand::random::<u32>()));
        let written = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            });
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::io(&tmp, e));
        }
        let linked = std::fs::hard_link(&tmp, &path);
        let _ = std::fs::remove_file(&tmp);
        if let Err(e) = linked {
            return Err(Error::io(&path, e));
        }

        tracing::debug!("Stored blob {} ({} bytes)", key, data.len());
        Ok(())
    }

    fn retrieve_file(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => missing(key),
            _ => Error::io(&path, e),
        })
    }

    fn open_file(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.resolve(key)?;
        let file = std::fs::File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => missing(key),
            _ => Error::io(&path, e),
        })?;
        Ok(Box::new(file))
    }

    fn file_exists(&self, key: &str) -> bool {
        self.resolve(key).map(|p| p.is_file()).unwrap_or(false)
    }

    fn file_size(&self, key: &str) -> Result<u64> {
        let path = self.resolve(key)?;
        let metadata = std::fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => missing(key),
            _ => Error::io(&path, e),
        })?;
        Ok(metadata.len())
    }

    fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => missing(key),
            _ => Error::io(&path, e),
        })
    }
}

/// In-memory blob store for tests
#[derive(Default)]
pub struct MemBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    simulate_write_error: AtomicBool,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `store_file` fail
    pub fn set_simulate_write_error(&self, fail: bool) {
        self.simulate_write_error.store(fail, Ordering::SeqCst);
    }

    /// Overwrite a blob in place, bypassing the write-once rule
    pub fn replace(&self, key: &str, data: Vec<u8>) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemBlobStore {
    fn store_file(&self, key: &str, data: &[u8]) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(Error::io(
                key,
                std::io::Error::new(std::io::ErrorKind::Other, "simulated write error"),
            ));
        }
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        if blobs.contains_key(key) {
            return Err(Error::io(
                key,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "blob key already taken"),
            ));
        }
        blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn retrieve_file(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| missing(key))
    }

    fn open_file(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.retrieve_file(key)?)))
    }

    fn file_exists(&self, key: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn file_size(&self, key: &str) -> Result<u64> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| missing(key))
    }

    fn delete_file(&self, key: &str) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| missing(key))
    }
}

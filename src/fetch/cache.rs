//! Content-addressed on-disk cache of raw fetch bodies.
//!
//! One gzip file per URL at `<cache_dir>/<sha256(url) hex>.gz`. The cache is
//! append-only: entries are written on first successful fetch and never
//! expired or invalidated. Concurrent writers to the same key overwrite each
//! other whole-file; last writer wins.
//!
//! Read and write failures are downgraded to a warning plus a miss — a
//! corrupt cache entry must never kill a crawl. Only an unusable cache
//! *directory* is fatal, at construction.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::FetchError;

/// On-disk gzip cache keyed by SHA-256 of the URL.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Open (creating if needed) a cache under `dir`.
    pub fn new(dir: &Path) -> Result<Self, FetchError> {
        std::fs::create_dir_all(dir).map_err(|source| FetchError::CacheDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// The cache key for a URL: hex SHA-256 of the URL string.
    pub fn key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        format!("{digest:x}")
    }

    /// Path of the cache entry for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.gz", Self::key(url)))
    }

    /// Read the cached body for `url`, if present and readable.
    pub fn get(&self, url: &str) -> Option<String> {
        let path = self.path_for(url);
        if !path.exists() {
            return None;
        }
        match Self::read_gz(&path) {
            Ok(body) => {
                debug!(%url, "cache hit");
                Some(body)
            }
            Err(e) => {
                warn!(%url, path = %path.display(), error = %e, "failed to read cache entry");
                None
            }
        }
    }

    /// Store `body` for `url`. Failures are logged, not raised.
    pub fn put(&self, url: &str, body: &str) {
        let path = self.path_for(url);
        if let Err(e) = Self::write_gz(&path, body) {
            warn!(%url, path = %path.display(), error = %e, "failed to write cache entry");
        }
    }

    fn read_gz(path: &Path) -> std::io::Result<String> {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(file);
        let mut body = String::new();
        decoder.read_to_string(&mut body)?;
        Ok(body)
    }

    fn write_gz(path: &Path, body: &str) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(body.as_bytes())?;
        encoder.finish()?;
        Ok(())
    }
}

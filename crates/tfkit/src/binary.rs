//! Locating the terraform binary.
//!
//! Release builds embed a gzip-compressed terraform (see `build.rs`). It is
//! extracted once into a cache under the system temp directory and
//! re-extracted whenever the cached copy is older than the embedded one.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

static EMBEDDED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/terraform.gz"));
const EMBEDDED_MTIME: &str = env!("BBL_TERRAFORM_MTIME");

/// Resolves the terraform binary, extracting the embedded copy if needed.
#[derive(Debug, Clone)]
pub struct BinaryPath {
    compressed: &'static [u8],
    mtime: u64,
    cache_dir: PathBuf,
}

impl BinaryPath {
    /// The binary embedded at build time, cached in `<tmp>/bbl-terraform`.
    pub fn new() -> Self {
        Self {
            compressed: EMBEDDED,
            mtime: EMBEDDED_MTIME.parse().unwrap_or(0),
            cache_dir: std::env::temp_dir().join("bbl-terraform"),
        }
    }

    /// A binary from arbitrary bytes, cached in `cache_dir`.
    pub fn with_embedded(compressed: &'static [u8], mtime: u64, cache_dir: PathBuf) -> Self {
        Self {
            compressed,
            mtime,
            cache_dir,
        }
    }

    /// Whether a binary was embedded at build time.
    pub fn is_embedded(&self) -> bool {
        !self.compressed.is_empty()
    }

    /// Path of a runnable terraform.
    pub fn binary(&self) -> Result<PathBuf> {
        if !self.is_embedded() {
            log::debug!("no embedded terraform, looking on PATH");
            return which::which("terraform").map_err(|_| Error::BinaryNotFound);
        }

        let path = self.cache_dir.join("terraform");
        if self.is_stale(&path) {
            self.extract(&path)?;
        }
        Ok(path)
    }

    fn is_stale(&self, path: &Path) -> bool {
        let embedded = UNIX_EPOCH + Duration::from_secs(self.mtime);
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(cached) => cached < embedded,
            Err(_) => true,
        }
    }

    fn extract(&self, path: &Path) -> Result<()> {
        log::debug!("extracting terraform to {}", path.display());
        fs::create_dir_all(&self.cache_dir).map_err(|e| Error::io(&self.cache_dir, e))?;

        let mut binary = Vec::new();
        GzDecoder::new(self.compressed)
            .read_to_end(&mut binary)
            .map_err(|e| Error::Extract(e.to_string()))?;

        let tmp = path.with_extension("partial");
        fs::write(&tmp, &binary).map_err(|e| Error::io(&tmp, e))?;

        #[cfg(unix)]
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io(&tmp, e))?;

        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
    }
}

impl Default for BinaryPath {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn gzip(content: &[u8]) -> &'static [u8] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        Box::leak(encoder.finish().unwrap().into_boxed_slice())
    }

    #[test]
    fn test_extracts_embedded_binary() {
        let temp = TempDir::new().unwrap();
        let binary = BinaryPath::with_embedded(gzip(b"#!/bin/sh\n"), 0, temp.path().join("cache"));

        let path = binary.binary().unwrap();

        assert_eq!(path, temp.path().join("cache/terraform"));
        assert_eq!(fs::read(&path).unwrap(), b"#!/bin/sh\n");
        #[cfg(unix)]
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);
    }

    #[test]
    fn test_fresh_cache_is_reused() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("terraform"), b"cached").unwrap();
        let binary = BinaryPath::with_embedded(gzip(b"embedded"), 0, cache.clone());

        let path = binary.binary().unwrap();

        assert_eq!(fs::read(path).unwrap(), b"cached");
    }

    #[test]
    fn test_stale_cache_is_replaced() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("terraform"), b"old").unwrap();
        let far_future = u64::from(u32::MAX);
        let binary = BinaryPath::with_embedded(gzip(b"new"), far_future, cache.clone());

        let path = binary.binary().unwrap();

        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn test_corrupt_embedded_binary() {
        let temp = TempDir::new().unwrap();
        let binary = BinaryPath::with_embedded(b"not gzip", 0, temp.path().to_path_buf());

        assert!(matches!(binary.binary(), Err(Error::Extract(_))));
    }
}

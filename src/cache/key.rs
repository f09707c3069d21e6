//! Cache keys and on-disk entry naming
//!
//! Every entry lives directly under the cache root and is named
//! `{platform}_{fingerprint}{extension}`, e.g. `android_abc123.apk`.
//! The name is the only metadata: there is no index file.

use crate::error::{CacheError, CacheResult};
use crate::platform::Platform;
use std::fmt;
use std::path::{Path, PathBuf};

/// A (platform, fingerprint) pair identifying exactly one cache entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    platform: Platform,
    fingerprint: String,
}

impl CacheKey {
    /// Create a key. The fingerprint is used verbatim as a filename segment,
    /// so callers must pass filesystem-safe values.
    pub fn new(fingerprint: impl Into<String>, platform: Platform) -> CacheResult<Self> {
        let fingerprint = fingerprint.into();
        if fingerprint.is_empty() {
            return Err(CacheError::InvalidFingerprint);
        }
        Ok(Self {
            platform,
            fingerprint,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Entry filename, e.g. `ios_xyz.app`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}{}",
            self.platform,
            self.fingerprint,
            self.platform.extension()
        )
    }

    /// Full entry path under `root`
    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(self.file_name())
    }

    /// Parse an entry filename back into a key.
    ///
    /// Returns `None` for names that don't follow the entry pattern or whose
    /// extension doesn't belong to the platform prefix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (prefix, rest) = name.split_once('_')?;
        let platform: Platform = prefix.parse().ok()?;
        let fingerprint = rest.strip_suffix(platform.extension())?;
        Self::new(fingerprint, platform).ok()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.fingerprint)
    }
}

/// Compute the cache path for a fingerprint and platform. No I/O.
pub fn cache_path(root: &Path, fingerprint: &str, platform: Platform) -> CacheResult<PathBuf> {
    Ok(CacheKey::new(fingerprint, platform)?.path_in(root))
}

//! Error types for buildcache
//!
//! All modules use `CacheResult<T>` as their return type.

use crate::platform::Platform;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for buildcache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in buildcache
#[derive(Error, Debug)]
pub enum CacheError {
    // Key errors
    #[error("Unsupported platform: {0}. Expected one of: ios, android")]
    UnsupportedPlatform(String),

    #[error("Fingerprint hash must not be empty")]
    InvalidFingerprint,

    // Artifact errors
    #[error("Build artifact not found at: {0}")]
    SourceNotFound(PathBuf),

    #[error("Failed to copy {source_path} -> {dest}: {reason}")]
    CopyFailed {
        source_path: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("Cached artifact at {path} is not a valid {platform} build")]
    VerificationFailed { path: PathBuf, platform: Platform },

    // Filesystem errors
    #[error("Failed to create cache directory {path}: {source}")]
    RootCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a copy failure error
    pub fn copy_failed(
        source_path: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CopyFailed {
            source_path: source_path.into(),
            dest: dest.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the cache itself is unusable.
    ///
    /// Everything else is a plain miss or a failed upload and never
    /// crosses the public `resolve`/`upload` boundary as an `Err`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootCreate { .. } | Self::Io { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedPlatform(_) => Some("Use --platform ios or --platform android"),
            Self::RootCreate { .. } => {
                Some("Check permissions, or set [cache] root in the config file")
            }
            Self::SourceNotFound(_) => Some("Run the build first, then upload its output"),
            _ => None,
        }
    }
}

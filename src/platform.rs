//! Target platforms for cached builds

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform a build artifact was produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// iOS - artifacts are `.app` directory bundles
    Ios,
    /// Android - artifacts are single `.apk` files
    Android,
}

impl Platform {
    /// Lowercase name used in cache filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }

    /// Filename extension of a cached artifact, including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Platform::Ios => ".app",
            Platform::Android => ".apk",
        }
    }

    /// Whether a cached artifact must be a directory
    pub fn expects_bundle(&self) -> bool {
        matches!(self, Platform::Ios)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(CacheError::UnsupportedPlatform(other.to_string())),
        }
    }
}

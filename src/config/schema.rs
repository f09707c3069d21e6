//! Configuration schema for buildcache
//!
//! Global configuration is stored at `~/.config/buildcache/config.toml`.
//! A project may override it with a `.buildcache.toml`.

use crate::cache::CopyStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default cache root, relative to the project root
pub const DEFAULT_CACHE_ROOT: &str = ".expo/cache";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory. Relative paths are resolved against the
    /// project root.
    pub root: PathBuf,

    /// Directory copy strategies in the order they are attempted
    pub copy_strategies: Vec<CopyStrategy>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_ROOT),
            copy_strategies: CopyStrategy::defaults(),
        }
    }
}

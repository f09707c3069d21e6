//! Cache root directory
//!
//! The root is explicit configuration handed to the store at construction
//! time. It is created lazily on the first write, never on reads.

use crate::error::{CacheError, CacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::debug;

/// Location of the cache root, with idempotent on-demand creation
#[derive(Debug)]
pub struct CacheRoot {
    path: PathBuf,
    created: OnceCell<()>,
}

impl CacheRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            created: OnceCell::new(),
        }
    }

    /// Root path. Does not touch the filesystem.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the root (and missing ancestors) if needed and return it.
    ///
    /// A root that already exists is not an error. Any other creation failure
    /// is fatal for the cache.
    pub async fn ensure(&self) -> CacheResult<&Path> {
        self.created
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.path)
                    .await
                    .map_err(|e| CacheError::RootCreate {
                        path: self.path.clone(),
                        source: e,
                    })?;
                debug!("Cache root ready: {}", self.path.display());
                Ok::<(), CacheError>(())
            })
            .await?;
        Ok(&self.path)
    }
}

impl Clone for CacheRoot {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

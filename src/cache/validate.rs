//! Cache hit validation

use crate::platform::Platform;
use std::path::Path;
use tokio::fs;

/// Check whether `path` holds a usable cached artifact for `platform`.
///
/// Nothing at the path (including a dangling symlink) is never valid. iOS
/// entries must be directories since an `.app` bundle always is one; a plain
/// file there is the leftover of a wrong-type copy. Other platforms accept
/// whatever exists.
pub async fn is_valid(path: &Path, platform: Platform) -> bool {
    let Ok(metadata) = fs::metadata(path).await else {
        return false;
    };

    if platform.expects_bundle() && !metadata.is_dir() {
        return false;
    }

    true
}

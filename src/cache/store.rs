//! Build cache store
//!
//! The public contract the build orchestrator talks to. `resolve` is
//! read-only. `upload` copies an artifact in and re-validates it before
//! reporting the entry.
//!
//! There is no locking. Concurrent uploads of the same key race and the last
//! one to finish wins. A resolve that overlaps an upload of the same key may
//! see a miss or a half-written entry.

use crate::cache::copy::{remove_entry, ArtifactCopier};
use crate::cache::key::CacheKey;
use crate::cache::root::CacheRoot;
use crate::cache::validate::is_valid;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Shape of a stored artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Directory bundle
    Bundle,
    /// Single file
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundle => write!(f, "bundle"),
            Self::File => write!(f, "file"),
        }
    }
}

/// An entry found in the cache root
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified: Option<DateTime<Utc>>,
}

/// Filesystem-backed build artifact cache
#[derive(Debug)]
pub struct CacheStore {
    root: CacheRoot,
    copier: ArtifactCopier,
}

impl CacheStore {
    pub fn new(root: CacheRoot, copier: ArtifactCopier) -> Self {
        Self { root, copier }
    }

    /// Build a store from configuration. A relative `[cache] root` is
    /// resolved against `base_dir` (normally the project root).
    pub fn from_config(config: &Config, base_dir: &Path) -> Self {
        let root = base_dir.join(&config.cache.root);
        Self::new(
            CacheRoot::new(root),
            ArtifactCopier::from_strategies(&config.cache.copy_strategies),
        )
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Look up a cached artifact. `None` means a miss.
    ///
    /// Never writes to the filesystem, not even to create the root.
    pub async fn resolve(
        &self,
        fingerprint: &str,
        platform: Platform,
    ) -> CacheResult<Option<PathBuf>> {
        debug!("Searching for cached {} build: {}", platform, fingerprint);

        let key = match CacheKey::new(fingerprint, platform) {
            Ok(key) => key,
            Err(e) => {
                warn!("Cache miss: {}", e);
                return Ok(None);
            }
        };
        let path = key.path_in(self.root.path());

        if is_valid(&path, platform).await {
            info!("Cache hit for {}: {}", key, path.display());
            Ok(Some(path))
        } else {
            info!("Cache miss for {}", key);
            Ok(None)
        }
    }

    /// Store a freshly built artifact. `None` means the upload failed.
    ///
    /// Only failures that leave the cache unusable (e.g. the root can't be
    /// created) are returned as errors. Everything else is logged and
    /// reported as `None`.
    pub async fn upload(
        &self,
        fingerprint: &str,
        platform: Platform,
        source: &Path,
    ) -> CacheResult<Option<PathBuf>> {
        match self.try_upload(fingerprint, platform, source).await {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Upload failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Same as [`upload`](Self::upload) but returns the reason on failure.
    pub async fn try_upload(
        &self,
        fingerprint: &str,
        platform: Platform,
        source: &Path,
    ) -> CacheResult<PathBuf> {
        let key = CacheKey::new(fingerprint, platform)?;
        info!("Uploading {} build: {}", key, source.display());

        // Checked before anything is created so a bad source leaves no trace.
        // Links are resolved so the entry holds the artifact, not a pointer.
        let source = match fs::canonicalize(source).await {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::SourceNotFound(source.to_path_buf()));
            }
            Err(e) => {
                let dest = key.path_in(self.root());
                return Err(CacheError::copy_failed(source, dest, e.to_string()));
            }
        };
        let source_meta = fs::metadata(&source).await.map_err(|e| {
            CacheError::copy_failed(&source, key.path_in(self.root()), e.to_string())
        })?;

        // Copying a file into an iOS slot can never validate, and clearing the
        // slot first would destroy a good entry.
        if platform.expects_bundle() && !source_meta.is_dir() {
            return Err(CacheError::VerificationFailed {
                path: source,
                platform,
            });
        }

        // The destination is cleared before copying, so a source at or inside
        // the entry would be deleted.
        if let Ok(root) = fs::canonicalize(self.root()).await {
            let entry = key.path_in(&root);
            if source.starts_with(&entry) {
                return Err(CacheError::copy_failed(
                    &source,
                    entry,
                    "source is the cache entry itself",
                ));
            }
        }

        let root = self.root.ensure().await?;
        let dest = key.path_in(root);

        let copied = if source_meta.is_dir() {
            debug!(
                "Copying directory: {} -> {}",
                source.display(),
                dest.display()
            );
            self.copier.copy_dir(&source, &dest).await
        } else {
            debug!("Copying file: {} -> {}", source.display(), dest.display());
            self.copier.copy_file(&source, &dest).await
        };

        if !copied {
            discard_partial(&dest).await;
            return Err(CacheError::copy_failed(
                &source,
                &dest,
                format!(
                    "all copy strategies failed ({})",
                    self.copier.provider_names().join(", ")
                ),
            ));
        }

        if !is_valid(&dest, platform).await {
            discard_partial(&dest).await;
            return Err(CacheError::VerificationFailed {
                path: dest,
                platform,
            });
        }

        info!("Cached {} at {}", key, dest.display());
        Ok(dest)
    }

    /// List entries in the cache root, sorted by key.
    ///
    /// Names that don't follow the entry pattern are skipped. A root that
    /// doesn't exist yet is an empty cache.
    pub async fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        let root = self.root.path();
        let mut dir = match fs::read_dir(root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::io(
                    format!("reading cache directory {}", root.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(format!("listing {}", root.display()), e))?
        {
            let name = item.file_name();
            let Some(key) = name.to_str().and_then(CacheKey::from_file_name) else {
                debug!("Skipping foreign entry: {:?}", name);
                continue;
            };

            let path = item.path();
            let Ok(metadata) = fs::metadata(&path).await else {
                debug!("Skipping unreadable entry: {}", path.display());
                continue;
            };

            entries.push(CacheEntry {
                key,
                path,
                kind: if metadata.is_dir() {
                    EntryKind::Bundle
                } else {
                    EntryKind::File
                },
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

/// Remove what a failed upload left at `dest` so it can't be read as a hit.
async fn discard_partial(dest: &Path) {
    if let Err(e) = remove_entry(dest).await {
        warn!("Failed to remove partial entry {}: {}", dest.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::copy::{CopyProvider, CopyStrategy};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailProvider;

    #[async_trait]
    impl CopyProvider for FailProvider {
        async fn attempt_copy(&self, _source: &Path, dest: &Path) -> bool {
            std::fs::create_dir_all(dest).unwrap();
            std::fs::write(dest.join("half.bin"), b"partial").unwrap();
            false
        }

        fn name(&self) -> &'static str {
            "fail"
        }
    }

    fn store_in(temp: &TempDir) -> CacheStore {
        CacheStore::new(
            CacheRoot::new(temp.path().join(".expo/cache")),
            ArtifactCopier::from_strategies(&[CopyStrategy::Native]),
        )
    }

    fn make_bundle(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let bundle = dir.join(name);
        std::fs::create_dir_all(&bundle).unwrap();
        for (file, content) in files {
            let path = bundle.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        bundle
    }

    #[tokio::test]
    async fn resolve_on_empty_cache_is_a_miss_without_writes() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let hit = store.resolve("nonexistent", Platform::Android).await;
        assert!(hit.unwrap().is_none());
        assert!(!store.root().exists());
    }

    #[tokio::test]
    async fn upload_file_then_resolve() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk-bytes").unwrap();

        let uploaded = store
            .upload("abc123", Platform::Android, &apk)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(uploaded, store.root().join("android_abc123.apk"));

        let resolved = store.resolve("abc123", Platform::Android).await;
        assert_eq!(resolved.unwrap(), Some(uploaded.clone()));
        assert_eq!(std::fs::read(&uploaded).unwrap(), b"apk-bytes");
    }

    #[tokio::test]
    async fn upload_bundle_then_resolve() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let bundle = make_bundle(
            temp.path(),
            "MyApp.app",
            &[("Info.plist", "<plist/>"), ("Assets/icon.png", "png")],
        );

        let uploaded = store
            .upload("xyz", Platform::Ios, &bundle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(uploaded, store.root().join("ios_xyz.app"));
        assert!(uploaded.is_dir());

        let resolved = store.resolve("xyz", Platform::Ios).await.unwrap();
        assert_eq!(resolved, Some(uploaded.clone()));
        let icon = std::fs::read_to_string(uploaded.join("Assets/icon.png")).unwrap();
        assert_eq!(icon, "png");
    }

    #[tokio::test]
    async fn reupload_replaces_contents() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let first = make_bundle(
            temp.path(),
            "v1.app",
            &[("Info.plist", "v1"), ("old-only.txt", "stale")],
        );
        let second = make_bundle(temp.path(), "v2.app", &[("Info.plist", "v2")]);

        let first_upload = store.upload("same", Platform::Ios, &first).await;
        assert!(first_upload.unwrap().is_some());
        let path = store
            .upload("same", Platform::Ios, &second)
            .await
            .unwrap()
            .unwrap();

        let plist = std::fs::read_to_string(path.join("Info.plist")).unwrap();
        assert_eq!(plist, "v2");
        assert!(!path.join("old-only.txt").exists());
    }

    #[tokio::test]
    async fn upload_missing_source_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let missing = temp.path().join("build/missing.apk");

        let result = store.upload("abc", Platform::Android, &missing).await;
        assert!(result.unwrap().is_none());
        assert!(!store.root().exists());

        let err = store
            .try_upload("abc", Platform::Android, &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::SourceNotFound(ref p) if p == &missing));
    }

    #[tokio::test]
    async fn upload_missing_source_keeps_existing_entry() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"good").unwrap();
        let path = store
            .upload("k", Platform::Android, &apk)
            .await
            .unwrap()
            .unwrap();

        let missing = temp.path().join("gone.apk");
        let result = store.upload("k", Platform::Android, &missing).await;
        assert!(result.unwrap().is_none());
        assert_eq!(std::fs::read(&path).unwrap(), b"good");
    }

    #[tokio::test]
    async fn ios_file_entry_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.root().join("ios_abc.app"), b"not a bundle").unwrap();

        let hit = store.resolve("abc", Platform::Ios).await.unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn android_accepts_directory_entry() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(store.root().join("android_abc.apk")).unwrap();

        let hit = store.resolve("abc", Platform::Android).await.unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn ios_file_upload_is_rejected_before_copy() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let file = temp.path().join("MyApp.ipa");
        std::fs::write(&file, b"zip").unwrap();

        let err = store
            .try_upload("abc", Platform::Ios, &file)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::VerificationFailed { .. }));
        assert!(!store.root().exists());

        let result = store.upload("abc", Platform::Ios, &file).await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn ios_file_upload_keeps_existing_bundle() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let bundle = make_bundle(temp.path(), "MyApp.app", &[("Info.plist", "good")]);
        let path = store
            .upload("k", Platform::Ios, &bundle)
            .await
            .unwrap()
            .unwrap();

        let file = temp.path().join("MyApp.ipa");
        std::fs::write(&file, b"zip").unwrap();
        let result = store.upload("k", Platform::Ios, &file).await;
        assert!(result.unwrap().is_none());

        let hit = store.resolve("k", Platform::Ios).await.unwrap();
        assert_eq!(hit, Some(path.clone()));
        let plist = std::fs::read_to_string(path.join("Info.plist")).unwrap();
        assert_eq!(plist, "good");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_source_is_copied_not_linked() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(
            CacheRoot::new(temp.path().join("cache")),
            ArtifactCopier::default(),
        );
        let build = temp.path().join("build");
        let bundle = make_bundle(&build, "MyApp.app", &[("Info.plist", "linked")]);
        let link = temp.path().join("latest.app");
        std::os::unix::fs::symlink(&bundle, &link).unwrap();

        let path = store
            .upload("s1", Platform::Ios, &link)
            .await
            .unwrap()
            .unwrap();
        let entry_meta = std::fs::symlink_metadata(&path).unwrap();
        assert!(entry_meta.is_dir());
        assert!(!entry_meta.file_type().is_symlink());

        // The entry must outlive the build output
        std::fs::remove_dir_all(&build).unwrap();
        let hit = store.resolve("s1", Platform::Ios).await.unwrap();
        assert_eq!(hit, Some(path.clone()));
        let plist = std::fs::read_to_string(path.join("Info.plist")).unwrap();
        assert_eq!(plist, "linked");
    }

    #[tokio::test]
    async fn uploading_an_entry_onto_itself_keeps_it() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let bundle = make_bundle(temp.path(), "MyApp.app", &[("Info.plist", "keep")]);
        let path = store
            .upload("self", Platform::Ios, &bundle)
            .await
            .unwrap()
            .unwrap();

        let err = store
            .try_upload("self", Platform::Ios, &path)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::CopyFailed { .. }));

        let plist = std::fs::read_to_string(path.join("Info.plist")).unwrap();
        assert_eq!(plist, "keep");
    }

    #[tokio::test]
    async fn uploading_an_apk_entry_onto_itself_keeps_it() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk").unwrap();
        let path = store
            .upload("self", Platform::Android, &apk)
            .await
            .unwrap()
            .unwrap();

        let result = store.upload("self", Platform::Android, &path).await;
        assert!(result.unwrap().is_none());
        assert_eq!(std::fs::read(&path).unwrap(), b"apk");
    }

    #[tokio::test]
    async fn failed_copy_reports_none_and_leaves_no_entry() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::new(
            CacheRoot::new(temp.path().join("cache")),
            ArtifactCopier::new(vec![Box::new(FailProvider)]),
        );
        let bundle = make_bundle(temp.path(), "MyApp.app", &[("Info.plist", "x")]);

        let err = store
            .try_upload("abc", Platform::Ios, &bundle)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::CopyFailed { .. }));
        assert!(err.to_string().contains("fail"));

        let result = store.upload("abc", Platform::Ios, &bundle).await;
        assert!(result.unwrap().is_none());
        let hit = store.resolve("abc", Platform::Ios).await.unwrap();
        assert!(hit.is_none());
        assert!(!store.root().join("ios_abc.app").exists());
    }

    #[tokio::test]
    async fn unusable_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let store = CacheStore::new(
            CacheRoot::new(blocker.join("cache")),
            ArtifactCopier::default(),
        );
        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk").unwrap();

        let err = store
            .upload("abc", Platform::Android, &apk)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::RootCreate { .. }));
    }

    #[tokio::test]
    async fn empty_fingerprint_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let hit = store.resolve("", Platform::Ios).await.unwrap();
        assert!(hit.is_none());

        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk").unwrap();
        let result = store.upload("", Platform::Android, &apk).await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_lists_known_names() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(store.entries().await.unwrap().is_empty());

        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk").unwrap();
        let bundle = make_bundle(temp.path(), "MyApp.app", &[("Info.plist", "x")]);
        let ios = store.upload("b2", Platform::Ios, &bundle).await;
        assert!(ios.unwrap().is_some());
        let android = store.upload("a1", Platform::Android, &apk).await;
        assert!(android.unwrap().is_some());
        std::fs::write(store.root().join("notes.txt"), b"ignore me").unwrap();

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.platform(), Platform::Ios);
        assert_eq!(entries[0].kind, EntryKind::Bundle);
        assert_eq!(entries[1].key.fingerprint(), "a1");
        assert_eq!(entries[1].kind, EntryKind::File);
        assert!(entries[1].modified.is_some());
    }

    #[test]
    fn from_config_resolves_relative_root() {
        let config = Config::default();
        let store = CacheStore::from_config(&config, Path::new("/work/app"));
        assert_eq!(store.root(), Path::new("/work/app/.expo/cache"));
    }
}

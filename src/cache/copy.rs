//! Artifact materialization
//!
//! Directory bundles are copied through an ordered chain of copy providers.
//! The first provider to succeed wins. `ditto` is tried first because it
//! preserves bundle attributes on macOS. It is unavailable or restricted in
//! some sandboxes, so a portable `cp -R` follows. An in-process copy can be
//! added through configuration.
//!
//! Single-file artifacts skip the chain and use a plain file copy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

/// Max number of output lines kept when a copy command fails.
const COPY_ERROR_TAIL_LINES: usize = 20;

/// A strategy for duplicating a directory tree
#[async_trait]
pub trait CopyProvider: Send + Sync {
    /// Copy `source` to `dest`. `dest` does not exist when this is called.
    ///
    /// Returns whether the copy completed. Implementations must not panic
    /// and report every failure through the return value.
    async fn attempt_copy(&self, source: &Path, dest: &Path) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Configurable copy strategies, in the order they should be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStrategy {
    /// `ditto <src> <dst>` (macOS, bundle-aware)
    Ditto,
    /// `cp -R <src> <dst>`
    Cp,
    /// In-process recursive copy
    Native,
}

impl CopyStrategy {
    /// Default provider order
    pub fn defaults() -> Vec<CopyStrategy> {
        vec![CopyStrategy::Ditto, CopyStrategy::Cp]
    }

    fn provider(&self) -> Box<dyn CopyProvider> {
        match self {
            Self::Ditto => Box::new(CommandProvider::ditto()),
            Self::Cp => Box::new(CommandProvider::cp()),
            Self::Native => Box::new(NativeProvider),
        }
    }
}

impl fmt::Display for CopyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ditto => write!(f, "ditto"),
            Self::Cp => write!(f, "cp"),
            Self::Native => write!(f, "native"),
        }
    }
}

/// Copies by running an external utility as `<program> <args..> <src> <dst>`
#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: &'static str,
    program: String,
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(name: &'static str, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name,
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn ditto() -> Self {
        Self::new("ditto", "ditto", &[])
    }

    pub fn cp() -> Self {
        Self::new("cp", "cp", &["-R"])
    }
}

#[async_trait]
impl CopyProvider for CommandProvider {
    async fn attempt_copy(&self, source: &Path, dest: &Path) -> bool {
        debug!(
            "Executing: {} {:?} {} {}",
            self.program,
            self.args,
            source.display(),
            dest.display()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    "{} exited with code {}: {}",
                    self.program,
                    output.status.code().unwrap_or(-1),
                    output_tail(&stdout, &stderr)
                );
                false
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.program, e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// In-process recursive copy on `tokio::fs`.
///
/// Keeps file permissions and, on unix, recreates symlinks instead of
/// following them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProvider;

#[async_trait]
impl CopyProvider for NativeProvider {
    async fn attempt_copy(&self, source: &Path, dest: &Path) -> bool {
        match copy_tree(source, dest).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "In-process copy {} -> {} failed: {}",
                    source.display(),
                    dest.display(),
                    e
                );
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

async fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(source.to_path_buf(), dest.to_path_buf())];
    // Applied last so read-only directories can still be filled
    let mut dir_permissions = Vec::new();

    while let Some((from, to)) = pending.pop() {
        let metadata = if from == source {
            fs::metadata(&from).await?
        } else {
            fs::symlink_metadata(&from).await?
        };
        let file_type = metadata.file_type();

        if file_type.is_symlink() {
            copy_symlink(&from, &to).await?;
        } else if file_type.is_dir() {
            fs::create_dir(&to).await?;
            let mut entries = fs::read_dir(&from).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push((entry.path(), to.join(entry.file_name())));
            }
            dir_permissions.push((to, metadata.permissions()));
        } else {
            fs::copy(&from, &to).await?;
        }
    }

    for (dir, permissions) in dir_permissions.into_iter().rev() {
        fs::set_permissions(&dir, permissions).await?;
    }

    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from).await?;
    fs::symlink(target, to).await
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, _to: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot copy symlink {}", from.display()),
    ))
}

/// Keep the useful end of a failed command's output for diagnostics.
fn output_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let start = lines.len().saturating_sub(COPY_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Remove whatever is at `path`. Directories go recursively, anything else
/// (including a symlink to a directory) is unlinked. Absent paths are fine.
pub(crate) async fn remove_entry(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

/// Create the parent of `dest` and clear out any previous entry.
async fn prepare_destination(dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    remove_entry(dest).await
}

/// Materializes artifacts into (or out of) the cache
pub struct ArtifactCopier {
    providers: Vec<Box<dyn CopyProvider>>,
}

impl ArtifactCopier {
    /// Copier with an explicit provider chain
    pub fn new(providers: Vec<Box<dyn CopyProvider>>) -> Self {
        Self { providers }
    }

    /// Copier for the configured strategies. An empty list means defaults.
    pub fn from_strategies(strategies: &[CopyStrategy]) -> Self {
        let strategies = if strategies.is_empty() {
            CopyStrategy::defaults()
        } else {
            strategies.to_vec()
        };
        Self::new(strategies.iter().map(CopyStrategy::provider).collect())
    }

    /// Provider names in attempt order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Copy a directory tree, replacing anything already at `dest`.
    ///
    /// Returns whether some provider succeeded. Never errors.
    pub async fn copy_dir(&self, source: &Path, dest: &Path) -> bool {
        if let Err(e) = prepare_destination(dest).await {
            warn!("Failed to prepare {}: {}", dest.display(), e);
            return false;
        }

        for (attempt, provider) in self.providers.iter().enumerate() {
            // A failed attempt can leave a partial tree behind, and `cp -R`
            // into an existing directory nests the source inside it.
            if attempt > 0 {
                if let Err(e) = remove_entry(dest).await {
                    warn!("Failed to clear {} before retry: {}", dest.display(), e);
                    return false;
                }
            }

            debug!(
                "Copying {} -> {} with {}",
                source.display(),
                dest.display(),
                provider.name()
            );
            if provider.attempt_copy(source, dest).await {
                debug!("{} copy succeeded", provider.name());
                return true;
            }
            warn!("{} copy failed", provider.name());
        }

        false
    }

    /// Copy a single file, replacing anything already at `dest`.
    pub async fn copy_file(&self, source: &Path, dest: &Path) -> bool {
        if let Err(e) = prepare_destination(dest).await {
            warn!("Failed to prepare {}: {}", dest.display(), e);
            return false;
        }

        match fs::copy(source, dest).await {
            Ok(bytes) => {
                debug!("Copied {} bytes to {}", bytes, dest.display());
                true
            }
            Err(e) => {
                warn!(
                    "Failed to copy {} -> {}: {}",
                    source.display(),
                    dest.display(),
                    e
                );
                false
            }
        }
    }
}

impl Default for ArtifactCopier {
    fn default() -> Self {
        Self::from_strategies(&CopyStrategy::defaults())
    }
}

impl fmt::Debug for ArtifactCopier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactCopier")
            .field("providers", &self.provider_names())
            .finish()
    }
}

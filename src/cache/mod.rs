//! Filesystem build artifact cache
//!
//! Stores compiled app builds keyed by a content fingerprint and platform,
//! so a build with an unchanged fingerprint can be reused instead of
//! rebuilt.
//!
//! # Layout
//!
//! Entries sit flat under the cache root:
//!
//! | Platform | Entry | Shape |
//! |----------|-------|-------|
//! | ios | `ios_{fingerprint}.app` | directory bundle |
//! | android | `android_{fingerprint}.apk` | single file |
//!
//! # Entry States
//!
//! | State | Reached by |
//! |-------|------------|
//! | Absent | initial, or external cleanup |
//! | Present | successful upload (re-upload overwrites in place) |
//!
//! Resolve only reads and never changes state.

pub mod copy;
pub mod key;
pub mod root;
pub mod store;
pub mod validate;

pub use copy::{ArtifactCopier, CommandProvider, CopyProvider, CopyStrategy, NativeProvider};
pub use key::{cache_path, CacheKey};
pub use root::CacheRoot;
pub use store::{CacheEntry, CacheStore, EntryKind};
pub use validate::is_valid;

//! buildcache - Local build artifact cache
//!
//! Resolves previously built app artifacts by fingerprint and platform, and
//! stores fresh builds for reuse.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod platform;

pub use cache::CacheStore;
pub use error::{CacheError, CacheResult};
pub use platform::Platform;

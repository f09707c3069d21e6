//! Resolve command - look up a cached build

use crate::cache::CacheStore;
use crate::cli::args::ResolveArgs;
use crate::error::CacheResult;
use crate::platform::Platform;
use console::style;
use std::process::ExitCode;

/// Execute the resolve command.
///
/// Prints the cached path on a hit. A miss is not an error but exits
/// non-zero so scripts can branch on it.
pub async fn execute(args: ResolveArgs, store: &CacheStore) -> CacheResult<ExitCode> {
    let platform: Platform = args.platform.parse()?;

    match store.resolve(&args.fingerprint, platform).await? {
        Some(path) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!(
                "{} No {} build for fingerprint {}",
                style("Cache miss.").yellow(),
                platform,
                args.fingerprint
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

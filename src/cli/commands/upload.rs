//! Upload command - store a build in the cache

use crate::cache::CacheStore;
use crate::cli::args::UploadArgs;
use crate::error::CacheResult;
use crate::platform::Platform;
use console::style;
use std::process::ExitCode;

/// Execute the upload command
pub async fn execute(args: UploadArgs, store: &CacheStore) -> CacheResult<ExitCode> {
    let platform: Platform = args.platform.parse()?;

    let result = store
        .try_upload(&args.fingerprint, platform, &args.build_path)
        .await;
    match result {
        Ok(path) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            eprintln!("{} {}", style("Upload failed:").red(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

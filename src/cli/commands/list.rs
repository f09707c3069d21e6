//! List command - show cached builds

use crate::cache::{CacheEntry, CacheStore, EntryKind};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::CacheResult;
use console::style;
use std::process::ExitCode;

/// Execute the list command
pub async fn execute(args: ListArgs, store: &CacheStore) -> CacheResult<ExitCode> {
    let entries = store.entries().await?;

    match args.format {
        OutputFormat::Table => print_table(store, &entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_table(store: &CacheStore, entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No cached builds in {}", store.root().display());
        return;
    }

    println!(
        "{:<10} {:<42} {:<8} {:<20}",
        "PLATFORM", "FINGERPRINT", "KIND", "MODIFIED"
    );
    println!("{}", "-".repeat(80));

    for entry in entries {
        let kind = match entry.kind {
            EntryKind::Bundle => style("bundle").cyan().to_string(),
            EntryKind::File => style("file").dim().to_string(),
        };
        let modified = entry
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<10} {:<42} {:<8} {:<20}",
            entry.key.platform(),
            entry.key.fingerprint(),
            kind,
            modified
        );
    }

    println!();
    println!("Total: {} build(s)", entries.len());
}

fn print_json(entries: &[CacheEntry]) -> CacheResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson {
        platform: String,
        fingerprint: String,
        path: String,
        kind: EntryKind,
        modified: Option<String>,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            platform: e.key.platform().to_string(),
            fingerprint: e.key.fingerprint().to_string(),
            path: e.path.display().to_string(),
            kind: e.kind,
            modified: e.modified.map(|m| m.to_rfc3339()),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.path.display());
    }
}

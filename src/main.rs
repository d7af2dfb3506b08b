//! Main entry point for the runtar CLI application.
//!
//! This binary provides a command-line interface for creating, extracting
//! and listing classic tar archives.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

use runtar::{Cli, CreateOptions, ExtractOptions, NamePolicy};

/// Application entry point.
///
/// Parses command-line arguments, configures logging and dispatches to the
/// selected mode.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.is_very_quiet() {
        LevelFilter::ERROR
    } else if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .finish()
        .try_init()?;

    if let Some(archive) = &cli.create {
        create_archive(Path::new(archive), &cli).await
    } else if let Some(archive) = &cli.extract {
        extract_archive(Path::new(archive), &cli).await
    } else if let Some(archive) = &cli.list {
        list_archive(Path::new(archive), &cli).await
    } else {
        bail!("one of --create, --extract or --list is required")
    }
}

/// Create an archive from the positional paths.
///
/// Paths that cannot be archived are reported and skipped; the archive is
/// still written with everything else.
async fn create_archive(archive: &Path, cli: &Cli) -> Result<()> {
    if cli.paths.is_empty() {
        bail!("--create needs at least one file or directory");
    }

    let options = CreateOptions {
        root: cli.root.as_ref().map(PathBuf::from),
        name_policy: if cli.reject_outside_root {
            NamePolicy::RejectOutsideRoot
        } else {
            NamePolicy::StripParentRefs
        },
    };

    let report = runtar::create_with(archive, cli.paths.as_slice(), &options)
        .await
        .with_context(|| format!("failed to create {}", archive.display()))?;

    if !cli.is_quiet() {
        for entry in &report.archived {
            println!("  adding: {}", entry.name);
        }
    }
    if !cli.is_very_quiet() {
        for skipped in &report.skipped {
            eprintln!("Skipping: {} ({})", skipped.path.display(), skipped.error);
        }
    }
    if !cli.is_quiet() {
        println!("Created TAR file {}", archive.display());
    }

    Ok(())
}

/// Extract an archive into the single positional output directory.
async fn extract_archive(archive: &Path, cli: &Cli) -> Result<()> {
    let [output_dir] = cli.paths.as_slice() else {
        bail!("--extract needs exactly one output directory");
    };

    let options = ExtractOptions {
        verify_checksums: cli.verify,
    };
    let files = runtar::extract_with(archive, Path::new(output_dir), &options)
        .await
        .with_context(|| format!("failed to extract {}", archive.display()))?;

    if !cli.is_quiet() {
        for file in &files {
            println!("  extracting: {}", file.display());
        }
        println!("Extracted TAR file {} to {}", archive.display(), output_dir);
    }

    Ok(())
}

/// List archive entries.
///
/// Supports two output formats:
/// - Simple format: just entry names, one per line
/// - Verbose format (`-v`): mode, size and name in a table
async fn list_archive(archive: &Path, cli: &Cli) -> Result<()> {
    let options = ExtractOptions {
        verify_checksums: cli.verify,
    };
    let entries = runtar::list_with(archive, &options)
        .await
        .with_context(|| format!("failed to list {}", archive.display()))?;

    if cli.verbose {
        println!("{:>7}  {:>12}  Name", "Mode", "Length");
        println!("{}", "-".repeat(40));
    }

    let mut total = 0u64;
    for entry in &entries {
        if cli.verbose {
            let mode = entry
                .mode
                .map(|m| format!("{m:o}"))
                .unwrap_or_else(|| "-".to_string());
            println!("{:>7}  {:>12}  {}", mode, entry.size, entry.name);
            total += entry.size;
        } else {
            println!("{}", entry.name);
        }
    }

    if cli.verbose {
        println!("{}", "-".repeat(40));
        println!("{:>7}  {:>12}  {} files", "", total, entries.len());
    }

    Ok(())
}

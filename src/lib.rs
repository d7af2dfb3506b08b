//! # runtar
//!
//! A Rust tar utility for the classic fixed-header archive layout.
//!
//! This library packs files and directory trees into a single sequential
//! archive and unpacks such archives back onto the filesystem. Every entry is
//! a 512-byte header, the file contents, and zero padding to the next block.
//!
//! ## Features
//!
//! - Create archives from any mix of files and directories
//! - Extract archives, refusing entries that would escape the output directory
//! - List archive contents
//! - Optional header checksum verification
//! - Structured per-path reports instead of printed diagnostics
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let report = runtar::create(Path::new("out.tar"), &["docs", "README.md"]).await?;
//!     for skipped in &report.skipped {
//!         eprintln!("skipped {}: {}", skipped.path.display(), skipped.error);
//!     }
//!
//!     let files = runtar::extract(Path::new("out.tar"), Path::new("restored")).await?;
//!     println!("extracted {} files", files.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod tar;

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};

pub use cli::Cli;
pub use error::{Error, Result};
pub use tar::{
    ArchiveEntry, CreateReport, EntryHeader, EntryType, NamePolicy, SkippedPath, TarReader,
    TarWriter,
};

/// Options for [`create_with`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Directory archive names are computed against. Defaults to the current
    /// directory at the time of the call.
    pub root: Option<PathBuf>,
    pub name_policy: NamePolicy,
}

/// Options for [`extract_with`] and [`list_with`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub verify_checksums: bool,
}

/// Create `archive_path` from `paths`, naming entries relative to the
/// current directory.
pub async fn create<P: AsRef<Path>>(archive_path: &Path, paths: &[P]) -> Result<CreateReport> {
    create_with(archive_path, paths, &CreateOptions::default()).await
}

/// Create `archive_path` from `paths`.
///
/// Paths that cannot be archived are listed in the returned report; only a
/// failure to create or write the archive itself is an error.
pub async fn create_with<P: AsRef<Path>>(
    archive_path: &Path,
    paths: &[P],
    options: &CreateOptions,
) -> Result<CreateReport> {
    let root = match &options.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };

    let file = File::create(archive_path)
        .await
        .map_err(|source| Error::OpenArchive {
            path: archive_path.to_path_buf(),
            source,
        })?;

    let mut writer = TarWriter::new(BufWriter::new(file), root).name_policy(options.name_policy);
    let mut report = CreateReport::default();
    for path in paths {
        writer.append_path(path.as_ref(), &mut report).await?;
    }
    writer.finish().await?;

    Ok(report)
}

/// Extract `archive_path` into `output_dir`, which is created if needed.
pub async fn extract(archive_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    extract_with(archive_path, output_dir, &ExtractOptions::default()).await
}

pub async fn extract_with(
    archive_path: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
) -> Result<Vec<PathBuf>> {
    open_archive(archive_path, options)
        .await?
        .unpack(output_dir)
        .await
}

/// List the entries of `archive_path` without extracting them.
pub async fn list(archive_path: &Path) -> Result<Vec<EntryHeader>> {
    list_with(archive_path, &ExtractOptions::default()).await
}

pub async fn list_with(archive_path: &Path, options: &ExtractOptions) -> Result<Vec<EntryHeader>> {
    open_archive(archive_path, options).await?.list().await
}

async fn open_archive(
    archive_path: &Path,
    options: &ExtractOptions,
) -> Result<TarReader<BufReader<File>>> {
    let file = File::open(archive_path)
        .await
        .map_err(|source| Error::OpenArchive {
            path: archive_path.to_path_buf(),
            source,
        })?;
    Ok(TarReader::new(BufReader::new(file)).verify_checksums(options.verify_checksums))
}

//! Archive creation.
//!
//! [`TarWriter`] turns files and directory trees into header, payload and
//! padding blocks on any [`AsyncWrite`] sink. Problems with individual input
//! paths never abort the archive: they are collected in a [`CreateReport`]
//! and the walk moves on. Only failures of the sink itself are fatal.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::header::{padding_len, HeaderBlock, BLOCK_SIZE, MAX_ENTRY_SIZE, MAX_NAME_LEN};
use super::path::{archive_name, physical_path, physical_source, NamePolicy};

const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// A regular file that was written to the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub source: PathBuf,
    pub name: String,
    pub size: u64,
}

/// An input path (or a file found beneath one) that was left out.
#[derive(Debug)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub error: Error,
}

/// Per-path outcome of building an archive.
#[derive(Debug, Default)]
pub struct CreateReport {
    pub archived: Vec<ArchiveEntry>,
    pub skipped: Vec<SkippedPath>,
}

impl CreateReport {
    /// True when every input path was archived.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, path: &Path, error: Error) {
        warn!("skipping {}: {}", path.display(), error);
        self.skipped.push(SkippedPath {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// Streaming tar writer.
///
/// ## Example
///
/// ```ignore
/// let file = tokio::fs::File::create("out.tar").await?;
/// let mut writer = TarWriter::new(BufWriter::new(file), std::env::current_dir()?);
/// let mut report = CreateReport::default();
/// writer.append_path(Path::new("docs"), &mut report).await?;
/// writer.finish().await?;
/// ```
pub struct TarWriter<W: AsyncWrite + Unpin> {
    inner: W,
    /// Directory archive names are relative to
    root: PathBuf,
    /// `root` with symlinks resolved, filled on first use
    physical_root: Option<PathBuf>,
    policy: NamePolicy,
}

impl<W: AsyncWrite + Unpin> TarWriter<W> {
    pub fn new(inner: W, root: PathBuf) -> Self {
        Self {
            inner,
            root,
            physical_root: None,
            policy: NamePolicy::default(),
        }
    }

    pub fn name_policy(mut self, policy: NamePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Archive a regular file, or every regular file below a directory.
    ///
    /// Paths that cannot be archived are recorded in `report`. The returned
    /// error is reserved for failures of the archive sink, after which the
    /// archive must be considered corrupt.
    pub async fn append_path(&mut self, path: &Path, report: &mut CreateReport) -> Result<()> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(source) => {
                report.skip(path, Error::Metadata { path: path.to_path_buf(), source });
                return Ok(());
            }
        };

        if metadata.is_dir() {
            self.append_dir(path, report).await
        } else if metadata.is_file() {
            self.append_file(path, report).await
        } else {
            report.skip(path, Error::UnsupportedFileType(path.to_path_buf()));
            Ok(())
        }
    }

    /// Walk `dir` depth-first, archiving regular files in `read_dir` order.
    ///
    /// Directory symlinks are not followed; file symlinks are archived as the
    /// file they point to.
    async fn append_dir(&mut self, dir: &Path, report: &mut CreateReport) -> Result<()> {
        let mut stack = Vec::new();
        match fs::read_dir(dir).await {
            Ok(entries) => stack.push(entries),
            Err(source) => report.skip(dir, Error::Metadata { path: dir.to_path_buf(), source }),
        }

        while let Some(entries) = stack.last_mut() {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    stack.pop();
                    continue;
                }
                Err(source) => {
                    report.skip(dir, Error::Metadata { path: dir.to_path_buf(), source });
                    stack.pop();
                    continue;
                }
            };

            let path = entry.path();
            let is_dir = match entry.file_type().await {
                Ok(file_type) => file_type.is_dir(),
                Err(source) => {
                    report.skip(&path, Error::Metadata { path: path.clone(), source });
                    continue;
                }
            };

            if is_dir {
                match fs::read_dir(&path).await {
                    Ok(sub) => stack.push(sub),
                    Err(source) => report.skip(&path, Error::Metadata { path: path.clone(), source }),
                }
            } else if fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                self.append_file(&path, report).await?;
            }
        }

        Ok(())
    }

    async fn append_file(&mut self, path: &Path, report: &mut CreateReport) -> Result<()> {
        let name = match self.name_for(path).await {
            Ok(name) => name,
            Err(e) => {
                report.skip(path, e);
                return Ok(());
            }
        };

        let opened = async {
            let file = fs::File::open(path).await?;
            let size = file.metadata().await?.len();
            Ok::<_, std::io::Error>((file, size))
        };
        let (file, size) = match opened.await {
            Ok(opened) => opened,
            Err(source) => {
                report.skip(path, Error::Metadata { path: path.to_path_buf(), source });
                return Ok(());
            }
        };

        if size > MAX_ENTRY_SIZE {
            report.skip(path, Error::TooLarge { path: path.to_path_buf(), size });
            return Ok(());
        }
        if name.len() > MAX_NAME_LEN {
            warn!("name of {} truncated to {} bytes", path.display(), MAX_NAME_LEN);
        }

        debug!("adding {} as {} ({} bytes)", path.display(), name, size);
        self.append_source(path, name, size, file, report).await
    }

    /// Archive name of `path`, with symlinked directories resolved on both
    /// the root and the source side.
    async fn name_for(&mut self, path: &Path) -> Result<String> {
        let root = match &self.physical_root {
            Some(root) => root.clone(),
            None => {
                let root = physical_path(&self.root).await?;
                self.physical_root = Some(root.clone());
                root
            }
        };
        let source = physical_source(path).await?;
        archive_name(&root, &source, self.policy).map_err(|e| match e {
            Error::OutsideRoot(_) => Error::OutsideRoot(path.to_path_buf()),
            Error::NonUtf8Path(_) => Error::NonUtf8Path(path.to_path_buf()),
            e => e,
        })
    }

    /// Write the entry for `path` and record the outcome.
    ///
    /// A source that supplies fewer bytes than its recorded size leaves a
    /// zero-filled entry in the archive and is reported as skipped.
    async fn append_source<R>(
        &mut self,
        path: &Path,
        name: String,
        size: u64,
        data: R,
        report: &mut CreateReport,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let copied = self.append_data(&name, size, data).await?;
        if copied != size {
            let error = Error::SourceChanged {
                path: path.to_path_buf(),
                expected: size,
                actual: copied,
            };
            report.skip(path, error);
            return Ok(());
        }

        report.archived.push(ArchiveEntry {
            source: path.to_path_buf(),
            name,
            size,
        });
        Ok(())
    }

    /// Write one entry: header, up to `size` bytes from `data`, then padding.
    ///
    /// Returns how many payload bytes `data` actually supplied. If it ran
    /// short the payload is zero-filled to keep the stream aligned.
    pub async fn append_data<R>(&mut self, name: &str, size: u64, data: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let header = HeaderBlock::encode(name, size);
        self.inner.write_all(header.as_bytes()).await?;

        let mut data = data.take(size);
        let copied = tokio::io::copy(&mut data, &mut self.inner).await?;

        let missing = size - copied;
        self.write_zeros(missing + padding_len(size)).await?;
        Ok(copied)
    }

    /// Write the two terminating zero blocks and flush the sink.
    pub async fn finish(mut self) -> Result<W> {
        self.write_zeros(2 * BLOCK_SIZE as u64).await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }

    async fn write_zeros(&mut self, mut len: u64) -> Result<()> {
        while len > 0 {
            let chunk = len.min(BLOCK_SIZE as u64) as usize;
            self.inner.write_all(&ZERO_BLOCK[..chunk]).await?;
            len -= chunk as u64;
        }
        Ok(())
    }
}

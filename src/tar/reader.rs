//! Archive reading and extraction.
//!
//! [`TarReader`] walks an archive front to back: one header block, the
//! declared number of payload bytes, then padding up to the next block
//! boundary. It never seeks, so any [`AsyncRead`] source works.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::header::{padding_len, EntryHeader, EntryType, Header, HeaderBlock, BLOCK_SIZE};
use super::path::resolve_destination;

/// Streaming tar reader.
pub struct TarReader<R: AsyncRead + Unpin> {
    inner: R,
    verify_checksums: bool,
}

impl<R: AsyncRead + Unpin> TarReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            verify_checksums: false,
        }
    }

    /// Reject headers whose stored checksum does not match their contents.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Read the next header.
    ///
    /// Returns `None` at an end marker or when the stream ends cleanly on a
    /// block boundary. The caller must consume the entry's payload with
    /// [`copy_payload`](Self::copy_payload) or
    /// [`skip_payload`](Self::skip_payload) before asking for the next one.
    pub async fn next_header(&mut self) -> Result<Option<EntryHeader>> {
        let mut buf = [0u8; BLOCK_SIZE];
        let read = read_full(&mut self.inner, &mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        if read < BLOCK_SIZE {
            return Err(Error::TruncatedArchive {
                name: String::from("<header>"),
                expected: BLOCK_SIZE as u64,
                actual: read as u64,
            });
        }

        let block = HeaderBlock::from_bytes(buf);
        let header = match block.decode()? {
            Header::End => return Ok(None),
            Header::Entry(header) => header,
        };
        if self.verify_checksums {
            block.verify_checksum()?;
        }
        Ok(Some(header))
    }

    /// Copy the payload of `header` into `dst` and skip its padding.
    ///
    /// On a short stream whatever was available is still written to `dst`
    /// before [`Error::TruncatedArchive`] is returned.
    pub async fn copy_payload<W>(&mut self, header: &EntryHeader, dst: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut payload = (&mut self.inner).take(header.size);
        let copied = tokio::io::copy(&mut payload, dst).await?;
        if copied < header.size {
            return Err(truncated(header, header.size, copied));
        }
        self.skip(header, padding_len(header.size)).await
    }

    /// Consume the payload of `header` without storing it.
    pub async fn skip_payload(&mut self, header: &EntryHeader) -> Result<()> {
        self.skip(header, header.size + padding_len(header.size)).await
    }

    async fn skip(&mut self, header: &EntryHeader, len: u64) -> Result<()> {
        let mut rest = (&mut self.inner).take(len);
        let skipped = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
        if skipped < len {
            return Err(truncated(header, len, skipped));
        }
        Ok(())
    }

    /// Decode every header, skipping payloads.
    pub async fn list(mut self) -> Result<Vec<EntryHeader>> {
        let mut entries = Vec::new();
        while let Some(header) = self.next_header().await? {
            self.skip_payload(&header).await?;
            entries.push(header);
        }
        Ok(entries)
    }

    /// Recreate every entry below `output_dir`, returning the files written.
    ///
    /// Entries whose names would resolve outside `output_dir` abort the
    /// extraction with [`Error::PathTraversal`] before anything is written
    /// for them.
    pub async fn unpack(mut self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir).await?;

        let mut written = Vec::new();
        while let Some(header) = self.next_header().await? {
            let dest = resolve_destination(output_dir, &header.name)?;

            match header.entry_type {
                EntryType::Regular => {}
                EntryType::Directory => {
                    debug!("creating directory {}", dest.display());
                    fs::create_dir_all(&dest).await?;
                    self.skip_payload(&header).await?;
                    continue;
                }
                EntryType::Other(flag) => {
                    warn!(
                        "skipping {}: unsupported entry type {:?}",
                        header.name, flag as char
                    );
                    self.skip_payload(&header).await?;
                    continue;
                }
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await?;
            }

            debug!("extracting {} ({} bytes)", header.name, header.size);
            let mut file = fs::File::create(&dest).await?;
            let copied = self.copy_payload(&header, &mut file).await;
            file.flush().await?;
            copied?;

            written.push(dest);
        }

        Ok(written)
    }
}

fn truncated(header: &EntryHeader, expected: u64, actual: u64) -> Error {
    Error::TruncatedArchive {
        name: header.name.clone(),
        expected,
        actual,
    }
}

/// Fill `buf` as far as the stream allows, returning the number of bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

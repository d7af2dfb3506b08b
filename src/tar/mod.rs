//! Classic tar archive reading and writing.
//!
//! This module implements the classic pre-POSIX tar layout: no `ustar`
//! magic, no long-name extensions, regular files only.
//!
//! ## Architecture
//!
//! - [`header`]: the 512-byte header record, its field layout and checksum
//! - [`path`]: archive names for source files and extraction destinations
//! - [`writer`]: streaming archive creation from files and directory trees
//! - [`reader`]: streaming listing and extraction
//!
//! ## Archive Format Overview
//!
//! An archive is a sequence of entries, each made of:
//! 1. A 512-byte header carrying the name and payload size as octal text
//! 2. The payload bytes
//! 3. Zero padding up to the next 512-byte boundary
//!
//! Two all-zero blocks end the archive. Readers also stop at any header whose
//! name starts with a NUL byte, or at a clean end of stream.
//!
//! ## Limitations
//!
//! - Names are limited to 99 bytes and silently truncated
//! - Payloads are limited to 8 GiB - 1 by the 11-digit size field
//! - No links, permissions, ownership or timestamps are preserved

pub mod header;
pub mod path;
mod reader;
mod writer;

pub use header::{EntryHeader, EntryType, Header, HeaderBlock, BLOCK_SIZE};
pub use path::NamePolicy;
pub use reader::TarReader;
pub use writer::{ArchiveEntry, CreateReport, SkippedPath, TarWriter};

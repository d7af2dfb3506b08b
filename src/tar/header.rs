//! The fixed 512-byte tar header record.
//!
//! Every field lives at a fixed offset inside the block. The layout below is
//! the only place those offsets are defined; encoding, decoding and checksum
//! computation all go through it.

use std::ops::Range;

use crate::error::{Error, Result};

/// Size of a header block and the alignment unit of every payload.
pub const BLOCK_SIZE: usize = 512;

/// Largest payload the 11-digit octal size field can describe (8 GiB - 1).
pub const MAX_ENTRY_SIZE: u64 = 0o77777777777;

/// Longest name stored in the name slot; one byte is kept for the terminator.
pub const MAX_NAME_LEN: usize = 99;

const NAME: Range<usize> = 0..100;
const MODE: Range<usize> = 100..108;
const UID: Range<usize> = 108..116;
const GID: Range<usize> = 116..124;
const SIZE: Range<usize> = 124..136;
const MTIME: Range<usize> = 136..148;
const CHECKSUM: Range<usize> = 148..156;
const TYPE_FLAG: usize = 156;
const LINK_NAME: Range<usize> = 157..257;

const DEFAULT_MODE: u64 = 0o644;

/// Number of zero bytes that follow a payload of `size` bytes.
pub fn padding_len(size: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (block - size % block) % block
}

/// Entry kind stored in the type flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    Directory,
    Other(u8),
}

impl EntryType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            b'0' | 0 => EntryType::Regular,
            b'5' => EntryType::Directory,
            _ => EntryType::Other(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Directory => b'5',
            EntryType::Other(v) => *v,
        }
    }
}

/// Decoded contents of a non-terminating header.
///
/// Only the name and size are needed to walk an archive. The remaining
/// numeric fields are informational and read as `None` when they do not hold
/// valid octal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub name: String,
    pub size: u64,
    pub mode: Option<u32>,
    pub mtime: Option<u64>,
    pub entry_type: EntryType,
    /// Checksum as stored in the record, not recomputed.
    pub checksum: Option<u32>,
}

/// Result of decoding one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// A block whose name starts with NUL: no more entries follow.
    End,
    Entry(EntryHeader),
}

/// A raw 512-byte header record.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderBlock([u8; BLOCK_SIZE]);

impl HeaderBlock {
    /// Build the header for a regular file called `name` holding `size` bytes.
    ///
    /// Names longer than [`MAX_NAME_LEN`] are truncated at a character
    /// boundary. `size` must not exceed [`MAX_ENTRY_SIZE`]; larger values are
    /// rejected by the writer before a header is built.
    pub fn encode(name: &str, size: u64) -> Self {
        let mut block = Self::end_marker();

        let name = truncate_name(name);
        block.0[NAME][..name.len()].copy_from_slice(name.as_bytes());

        write_octal(&mut block.0[MODE], DEFAULT_MODE, 7);
        write_octal(&mut block.0[UID], 0, 7);
        write_octal(&mut block.0[GID], 0, 7);
        write_octal(&mut block.0[SIZE], size, 11);
        write_octal(&mut block.0[MTIME], 0, 11);
        block.0[TYPE_FLAG] = EntryType::Regular.as_u8();
        // No link target.
        block.0[LINK_NAME].fill(0);

        // The slot keeps its trailing space: six digits and a NUL overwrite
        // only the first seven bytes.
        block.0[CHECKSUM].fill(b' ');
        let checksum = block.checksum();
        write_octal(&mut block.0[CHECKSUM], u64::from(checksum), 6);

        block
    }

    /// An all-zero block, two of which terminate an archive.
    pub fn end_marker() -> Self {
        Self([0u8; BLOCK_SIZE])
    }

    pub fn from_bytes(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    /// Unsigned sum of all bytes with the checksum slot counted as spaces.
    pub fn checksum(&self) -> u32 {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &b)| if CHECKSUM.contains(&i) { b' ' } else { b })
            .map(u32::from)
            .sum()
    }

    pub fn is_end_marker(&self) -> bool {
        self.0[NAME.start] == 0
    }

    pub fn decode(&self) -> Result<Header> {
        if self.is_end_marker() {
            return Ok(Header::End);
        }

        let name = String::from_utf8(self.name_bytes().to_vec()).map_err(|_| {
            Error::InvalidHeader {
                field: "name",
                value: String::from_utf8_lossy(self.name_bytes()).into_owned(),
            }
        })?;

        Ok(Header::Entry(EntryHeader {
            name,
            size: parse_octal(&self.0[SIZE], "size")?,
            mode: parse_octal_u32(&self.0[MODE], "mode").ok(),
            mtime: parse_octal(&self.0[MTIME], "mtime").ok(),
            entry_type: EntryType::from_u8(self.0[TYPE_FLAG]),
            checksum: parse_octal_u32(&self.0[CHECKSUM], "checksum").ok(),
        }))
    }

    /// Compare the stored checksum against the recomputed one.
    pub fn verify_checksum(&self) -> Result<()> {
        let stored = parse_octal_u32(&self.0[CHECKSUM], "checksum")?;
        let computed = self.checksum();
        if stored != computed {
            return Err(Error::ChecksumMismatch {
                name: String::from_utf8_lossy(self.name_bytes()).into_owned(),
                stored,
                computed,
            });
        }
        Ok(())
    }

    /// The name slot up to its NUL terminator.
    fn name_bytes(&self) -> &[u8] {
        let slot = &self.0[NAME];
        let len = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
        &slot[..len]
    }
}

impl std::fmt::Debug for HeaderBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderBlock")
            .field("header", &self.decode())
            .finish()
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Write `value` as `digits` zero-padded octal digits followed by a NUL.
fn write_octal(slot: &mut [u8], value: u64, digits: usize) {
    let text = format!("{:0width$o}", value, width = digits);
    let text = &text.as_bytes()[text.len().saturating_sub(digits)..];
    slot[..digits].copy_from_slice(text);
    slot[digits] = 0;
}

/// Parse an octal text field: leading spaces are skipped, digits run until a
/// NUL, a space or the end of the slot. An empty field reads as zero.
fn parse_octal(slot: &[u8], field: &'static str) -> Result<u64> {
    let invalid = || Error::InvalidHeader {
        field,
        value: String::from_utf8_lossy(slot).into_owned(),
    };

    let mut value: u64 = 0;
    for &b in slot.iter().skip_while(|&&b| b == b' ') {
        match b {
            b'0'..=b'7' => {
                value = value
                    .checked_mul(8)
                    .and_then(|v| v.checked_add(u64::from(b - b'0')))
                    .ok_or_else(invalid)?;
            }
            0 | b' ' => break,
            _ => return Err(invalid()),
        }
    }
    Ok(value)
}

fn parse_octal_u32(slot: &[u8], field: &'static str) -> Result<u32> {
    let value = parse_octal(slot, field)?;
    u32::try_from(value).map_err(|_| Error::InvalidHeader {
        field,
        value: String::from_utf8_lossy(slot).into_owned(),
    })
}

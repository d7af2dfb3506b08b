use std::path::PathBuf;

/// Errors produced while creating, listing or extracting an archive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The archive file itself could not be created or opened.
    #[error("cannot open archive {path}")]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Querying a source path failed (missing, unreadable, ...).
    #[error("cannot read {path}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file or directory: {0}")]
    UnsupportedFileType(PathBuf),

    #[error("{0} is outside of the archive root")]
    OutsideRoot(PathBuf),

    #[error("{0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("entry name is empty")]
    EmptyName,

    #[error("{path} is too large for a tar header ({size} bytes)")]
    TooLarge { path: PathBuf, size: u64 },

    /// A source file changed size while it was being archived.
    #[error("{path} changed while reading: expected {expected} bytes, got {actual}")]
    SourceChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("invalid {field} field in header: {value:?}")]
    InvalidHeader { field: &'static str, value: String },

    #[error("checksum mismatch for {name}: stored {stored:o}, computed {computed:o}")]
    ChecksumMismatch {
        name: String,
        stored: u32,
        computed: u32,
    },

    /// The stream ended before a header or payload was complete.
    #[error("truncated archive at {name:?}: expected {expected} bytes, got {actual}")]
    TruncatedArchive {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// An entry name would resolve outside the output directory.
    #[error("entry {0:?} escapes the output directory")]
    PathTraversal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

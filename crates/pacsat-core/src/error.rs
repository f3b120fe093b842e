//! Error types for the file store and FTL0 session engines.

use thiserror::Error;

/// Errors raised by [`crate::store::FileStore`] operations.
///
/// `add_file` is all-or-nothing: on any of these errors, no index row and
/// no on-disk artifact is left behind.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem I/O failed (create, write, rename, or unlink).
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The index (SQLite) failed to read or write.
    #[error("store index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// No live index row for the requested file number.
    #[error("no such file: {0}")]
    NotFound(u32),

    /// The store root or trash directory could not be accessed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A stored PFH failed to decode.
    #[error("stored header is corrupt for file {file_num}: {source}")]
    CorruptHeader {
        /// File number whose header failed to decode.
        file_num: u32,
        /// Underlying decode error.
        #[source]
        source: pacsat_proto::ProtocolError,
    },

    /// A PFH could not be constructed/encoded for a newly added file.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// Errors raised by the FTL0 upload engine.
///
/// Sessions are retained across recoverable errors (`CrcMismatch`,
/// `Incomplete`) so the client can resend; `DuplicateSession` and
/// `InvalidSize` never create a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// `start_upload` was called for a file number with an already-open
    /// session.
    #[error("upload session for file {0} already open")]
    DuplicateSession(u32),

    /// The declared size was zero or exceeded the configured ceiling.
    #[error("invalid declared size {size} (limit {limit})")]
    InvalidSize {
        /// Declared size that was rejected.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// A chunk's offset/length span extends past the declared size.
    #[error("chunk at offset {offset} with length {len} exceeds declared size {declared_size}")]
    OutOfRange {
        /// Offset of the rejected chunk.
        offset: u32,
        /// Length of the rejected chunk.
        len: u32,
        /// Declared size of the upload.
        declared_size: u32,
    },

    /// `complete_upload` was called while the hole list is non-empty.
    #[error("upload incomplete: {missing_bytes} byte(s) still missing")]
    Incomplete {
        /// Total bytes still outstanding across all holes.
        missing_bytes: u64,
    },

    /// The reassembled body's CRC did not match the client-supplied CRC.
    #[error("CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch {
        /// CRC supplied by the client.
        expected: u16,
        /// CRC computed over the reassembled body.
        computed: u16,
    },

    /// The referenced file number has no open upload session.
    #[error("no upload session open for file {0}")]
    NoSuchSession(u32),

    /// The reassembled body passed CRC verification but the store rejected
    /// it (I/O or index failure committing the finished upload).
    #[error("store rejected completed upload: {0}")]
    Store(String),
}

/// Errors raised by the FTL0 download engine.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The requested file number does not exist in the store.
    #[error("no such file: {0}")]
    NoSuchFile(u32),

    /// Reading the stored file failed.
    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored file's header failed to decode.
    #[error("stored header is corrupt: {0}")]
    CorruptHeader(#[from] pacsat_proto::ProtocolError),
}

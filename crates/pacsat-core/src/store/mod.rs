//! Content-addressed file store: C3.
//!
//! Assigns monotonically increasing file numbers, persists
//! `serialize(PFH) ‖ body` atomically, and indexes stored files by number,
//! callsign, description, and counters with a SQLite-backed full-text
//! mirror. Soft-deleted files move to a `.trash/` directory with a
//! configurable retention window instead of being unlinked immediately.

mod path;
mod sqlite;

pub use sqlite::SqliteFileStore;

use crate::error::StoreError;

/// One row of the store's index: everything about a stored file except its
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Assigned file number.
    pub file_num: u32,
    /// Stored filename (`name.ext`, both trimmed).
    pub filename: String,
    /// Uploading station's callsign.
    pub callsign: String,
    /// Upload time, epoch seconds.
    pub upload_time: u32,
    /// Body size in bytes.
    pub size: u32,
    /// On-disk path, relative to the store root.
    pub path: String,
    /// Compression type (0 = none).
    pub compression_type: u8,
    /// Body description.
    pub description: String,
    /// Download counter.
    pub download_count: u32,
    /// Priority.
    pub priority: u8,
    /// Forwarding callsign list.
    pub forwarding: Vec<String>,
}

/// The content-addressed file store contract (C3).
///
/// Implementations must guarantee: exactly one on-disk artifact per live
/// index row; no index row without an artifact; file numbers are strictly
/// increasing and never reused within the store's lifetime.
pub trait FileStore: Clone + Send + Sync + 'static {
    /// Reserves the next file number under the store-global lock.
    ///
    /// File numbers are strictly increasing and never reused; reserving one
    /// ahead of [`FileStore::add_file`] is what lets the FTL0 upload engine
    /// key an in-flight session by the same number the file will ultimately
    /// be stored under (see the design notes on file-number allocation: a
    /// dedicated reservation step is an explicitly sanctioned alternative
    /// to taking the store lock around `SELECT MAX + 1` inline).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on index failure.
    fn reserve_file_number(&self) -> Result<u32, StoreError>;

    /// Stamps `file_num` into `pfh` (overriding whatever was present) and
    /// atomically persists `serialize(pfh) ‖ body` under the store root,
    /// inserting an index row. `file_num` must have come from
    /// [`FileStore::reserve_file_number`].
    ///
    /// All-or-nothing: on any error, no index row and no visible file are
    /// left behind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O or index failure.
    fn add_file(
        &self,
        file_num: u32,
        callsign: &str,
        pfh: pacsat_proto::Pfh,
        body: &[u8],
        upload_time_secs: u32,
    ) -> Result<(), StoreError>;

    /// Path to the stored artifact for `file_num`, relative to the store
    /// root, or `None` if there is no live row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on index failure.
    fn get_path(&self, file_num: u32) -> Result<Option<String>, StoreError>;

    /// Reads the full stored artifact (`serialize(PFH) ‖ body`) for
    /// `file_num`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no live row, or an I/O
    /// error if the file cannot be read.
    fn open(&self, file_num: u32) -> Result<Vec<u8>, StoreError>;

    /// All live files, ordered newest-upload-first (ties broken by
    /// descending file number).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on index failure.
    fn list(&self) -> Result<Vec<FileRecord>, StoreError>;

    /// Deletes `file_num`. Permanent deletion unlinks the artifact; soft
    /// deletion renames it into `.trash/<file_num>_<epoch>.<basename>`,
    /// removes the index row, then best-effort prunes now-empty ancestor
    /// subdirectories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no live row.
    fn delete(&self, file_num: u32, permanent: bool, now_secs: u32) -> Result<(), StoreError>;

    /// Atomically increments the download counter for `file_num`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no live row.
    fn increment_download_count(&self, file_num: u32) -> Result<(), StoreError>;

    /// Full-text search over `(filename, callsign, description)`, ordered
    /// by relevance, ties broken by newest upload time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on index failure.
    fn search(&self, text: &str) -> Result<Vec<FileRecord>, StoreError>;

    /// Permanently deletes trash entries older than `retention_secs`,
    /// returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn prune_trash(&self, retention_secs: u32, now_secs: u32) -> Result<usize, StoreError>;
}

//! PACSAT file store and FTL0 upload/download session engines.
//!
//! Depends on `pacsat-proto` for the PFH codec and CRC-16. Exposes the
//! content-addressed file store (C3), the FTL0 upload engine (C4), the FTL0
//! download engine (C5), and the [`env::Environment`] abstraction the
//! `pacsat-server` crate's broadcast scheduler and session supervisor are
//! built on.

pub mod download;
pub mod env;
pub mod error;
pub mod store;
pub mod upload;

pub use download::{DownloadEmission, DownloadEngine};
pub use env::Environment;
pub use error::{DownloadError, StoreError, UploadError};
pub use store::{FileRecord, FileStore, SqliteFileStore};
pub use upload::{Hole, UploadEngine, UploadLimits, UploadMetadata};

//! Error types for the radio boundary, broadcast scheduler, and session
//! supervisor.

use thiserror::Error;

/// Errors raised by a [`crate::radio::Radio`] implementation.
///
/// The core engines never match on these variants; they only log and, for
/// the broadcast scheduler, skip the offending frame and continue the
/// sweep.
#[derive(Error, Debug)]
pub enum RadioError {
    /// The underlying transport rejected or failed to send the frame.
    #[error("radio transmit failed: {0}")]
    Transmit(String),

    /// The radio has no destination configured for this kind of frame.
    #[error("no route for frame: {0}")]
    NoRoute(String),
}

/// Errors raised by the directory/chunk broadcast scheduler (C6).
#[derive(Error, Debug)]
pub enum BroadcastError {
    /// Listing the store failed.
    #[error("broadcast could not list store: {0}")]
    Store(#[from] pacsat_core::StoreError),

    /// The requested file number has no live row.
    #[error("no such file to broadcast: {0}")]
    NoSuchFile(u32),

    /// A stored header failed to decode; the sweep skips it and continues.
    #[error("file {file_num} header failed to decode, skipping: {source}")]
    CorruptHeader {
        /// File number whose header failed to decode.
        file_num: u32,
        /// Underlying decode error.
        #[source]
        source: pacsat_proto::ProtocolError,
    },

    /// The radio boundary rejected a frame.
    #[error("radio error during broadcast: {0}")]
    Radio(#[from] RadioError),
}

/// Errors surfaced by the session supervisor's periodic sweep.
///
/// The supervisor logs these and keeps running; it never exits on a single
/// sweep failure.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Pruning expired trash entries failed.
    #[error("trash pruning failed: {0}")]
    Prune(#[from] pacsat_core::StoreError),
}

/// The top-level error type surfaced by the ground station binary.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The file store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] pacsat_core::StoreError),

    /// The broadcast scheduler failed.
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    /// Configuration was invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

//! The radio boundary (C7): the seam between the protocol core and whatever
//! actually keys a transmitter.
//!
//! A concrete adapter (KISS over serial, AGWPE over TCP, connected-mode
//! AX.25) is out of scope here; this module only defines the trait the
//! broadcast scheduler and download dispatch are written against, plus a
//! couple of in-tree implementations that make the rest of the crate
//! runnable and testable without one: [`LoggingRadio`] for the CLI binary,
//! and [`MockRadio`] for tests.

use std::sync::Arc;

use parking_lot::Mutex;
use pacsat_proto::{Pid, RadioEnvelope};

use crate::error::RadioError;

/// Everything the broadcast scheduler and download dispatch need from a
/// transmitter.
///
/// `send_ui` is the one wire primitive: a connectionless UI frame tagged
/// with a PID. `send_chunk`/`send_eof` are the convenience calls the
/// download path uses; what PID and framing they choose is an adapter
/// concern, not a core one; a deployed adapter over-amateur-radio AX.25
/// will pick whatever on-air convention its collaborators expect.
pub trait Radio: Send + Sync + 'static {
    /// Transmits a connectionless UI frame on `port` from `call_from` to
    /// `call_to`, carrying `info` tagged with `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError`] if the underlying transport rejects the
    /// frame.
    fn send_ui(
        &self,
        port: u32,
        call_from: &str,
        call_to: &str,
        pid: Pid,
        info: &[u8],
    ) -> Result<(), RadioError>;

    /// Transmits one download chunk for `file_num` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError`] if the underlying transport rejects the
    /// frame.
    fn send_chunk(&self, file_num: u32, start: u32, data: &[u8]) -> Result<(), RadioError>;

    /// Transmits the end-of-file marker for a completed download.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError`] if the underlying transport rejects the
    /// frame.
    fn send_eof(&self, file_num: u32, size: u32, crc: u16) -> Result<(), RadioError>;
}

/// A stand-in transmitter that logs every outgoing frame instead of keying
/// a radio.
///
/// Lets the CLI binary run the broadcast scheduler and session supervisor
/// end to end without a real adapter wired in. Not a substitute for one:
/// nothing it does reaches an actual transmitter.
pub struct LoggingRadio {
    callsign: String,
}

impl LoggingRadio {
    /// Creates a logging stand-in that identifies as `callsign` in its log
    /// lines.
    #[must_use]
    pub fn new(callsign: impl Into<String>) -> Self {
        Self { callsign: callsign.into() }
    }
}

impl Radio for LoggingRadio {
    fn send_ui(
        &self,
        port: u32,
        call_from: &str,
        call_to: &str,
        pid: Pid,
        info: &[u8],
    ) -> Result<(), RadioError> {
        tracing::info!(
            station = %self.callsign,
            port,
            call_from,
            call_to,
            pid = pid.as_byte(),
            bytes = info.len(),
            "would transmit UI frame (no radio adapter configured)"
        );
        Ok(())
    }

    fn send_chunk(&self, file_num: u32, start: u32, data: &[u8]) -> Result<(), RadioError> {
        tracing::info!(
            station = %self.callsign,
            file_num,
            start,
            bytes = data.len(),
            "would transmit file chunk (no radio adapter configured)"
        );
        Ok(())
    }

    fn send_eof(&self, file_num: u32, size: u32, crc: u16) -> Result<(), RadioError> {
        tracing::info!(
            station = %self.callsign,
            file_num,
            size,
            crc,
            "would transmit end-of-file marker (no radio adapter configured)"
        );
        Ok(())
    }
}

/// Every frame a [`MockRadio`] was asked to send, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// A raw UI frame, captured as the [`RadioEnvelope`] it would encode
    /// to.
    Ui(RadioEnvelope),
    /// A download chunk.
    Chunk { file_num: u32, start: u32, data: Vec<u8> },
    /// A download end-of-file marker.
    Eof { file_num: u32, size: u32, crc: u16 },
}

/// A recording transmitter for tests: never fails, remembers everything
/// sent.
#[derive(Default, Clone)]
pub struct MockRadio {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl MockRadio {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything sent so far, in call order.
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

impl Radio for MockRadio {
    fn send_ui(
        &self,
        port: u32,
        call_from: &str,
        call_to: &str,
        pid: Pid,
        info: &[u8],
    ) -> Result<(), RadioError> {
        let envelope = RadioEnvelope::new(port, pid, call_from, call_to, info.to_vec())
            .map_err(|e| RadioError::Transmit(e.to_string()))?;
        self.sent.lock().push(Sent::Ui(envelope));
        Ok(())
    }

    fn send_chunk(&self, file_num: u32, start: u32, data: &[u8]) -> Result<(), RadioError> {
        self.sent.lock().push(Sent::Chunk { file_num, start, data: data.to_vec() });
        Ok(())
    }

    fn send_eof(&self, file_num: u32, size: u32, crc: u16) -> Result<(), RadioError> {
        self.sent.lock().push(Sent::Eof { file_num, size, crc });
        Ok(())
    }
}

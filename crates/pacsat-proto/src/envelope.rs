//! Frame PIDs and the radio-adapter envelope.
//!
//! These are named interfaces, not a wire format this crate mandates: radio
//! adapters (KISS serial, AGWPE TCP, AX.25) are out of scope, but the core
//! still needs a concrete, testable shape to hand frames across the `Radio`
//! boundary. [`RadioEnvelope`] is that shape.

use crate::error::ProtocolError;

/// Protocol Identifier byte carried in a UI frame, selecting the
/// application the payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pid {
    /// File body chunk, broadcast or download (`0xBB`).
    FileChunk,
    /// Directory entry: one serialized PFH (`0xBD`).
    DirectoryEntry,
    /// Whole-orbit telemetry, opaque to the core (`0xB0`).
    WholeOrbitTelemetry,
    /// Realtime telemetry, opaque to the core (`0xB1`).
    RealtimeTelemetry,
    /// Any PID not named above, preserved verbatim.
    Other(u8),
}

impl Pid {
    /// `0xBB`.
    pub const FILE_CHUNK: u8 = 0xBB;
    /// `0xBD`.
    pub const DIRECTORY_ENTRY: u8 = 0xBD;
    /// `0xB0`.
    pub const WHOLE_ORBIT_TELEMETRY: u8 = 0xB0;
    /// `0xB1`.
    pub const REALTIME_TELEMETRY: u8 = 0xB1;

    /// The raw PID byte.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::FileChunk => Self::FILE_CHUNK,
            Self::DirectoryEntry => Self::DIRECTORY_ENTRY,
            Self::WholeOrbitTelemetry => Self::WHOLE_ORBIT_TELEMETRY,
            Self::RealtimeTelemetry => Self::REALTIME_TELEMETRY,
            Self::Other(byte) => byte,
        }
    }
}

impl From<u8> for Pid {
    fn from(byte: u8) -> Self {
        match byte {
            Self::FILE_CHUNK => Self::FileChunk,
            Self::DIRECTORY_ENTRY => Self::DirectoryEntry,
            Self::WHOLE_ORBIT_TELEMETRY => Self::WholeOrbitTelemetry,
            Self::REALTIME_TELEMETRY => Self::RealtimeTelemetry,
            other => Self::Other(other),
        }
    }
}

const CALLSIGN_WIDTH: usize = 10;
const HEADER_LEN: usize = 4 + 1 + CALLSIGN_WIDTH + CALLSIGN_WIDTH + 4;

/// A frame crossing the `Radio` boundary: `{port, kind, call_from, call_to,
/// data}`.
///
/// Callsign fields are ASCII, space-padded to 10 bytes on the wire. Decoding
/// tolerates non-ASCII bytes in callsign fields by substituting the Unicode
/// replacement character, rather than failing the whole frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioEnvelope {
    /// Radio port number.
    pub port: u32,
    /// PID byte.
    pub kind: Pid,
    /// Originating callsign, space-padded to 10 bytes.
    pub call_from: String,
    /// Destination callsign, space-padded to 10 bytes.
    pub call_to: String,
    /// Frame payload.
    pub data: Vec<u8>,
}

impl RadioEnvelope {
    /// Builds an envelope, space-padding callsigns to their canonical
    /// width.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidField`] if either callsign exceeds 10
    /// bytes.
    pub fn new(port: u32, kind: Pid, call_from: &str, call_to: &str, data: Vec<u8>) -> Result<Self, ProtocolError> {
        Ok(Self {
            port,
            kind,
            call_from: pad_callsign(call_from)?,
            call_to: pad_callsign(call_to)?,
            data,
        })
    }

    /// Encodes this envelope as
    /// `port ‖ kind ‖ call_from ‖ call_to ‖ data_len ‖ data`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        out.extend_from_slice(&self.port.to_le_bytes());
        out.push(self.kind.as_byte());
        out.extend_from_slice(self.call_from.as_bytes());
        out.extend_from_slice(self.call_to.as_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Decodes an envelope from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooShort`] if `bytes` is shorter than
    /// the fixed header, or [`ProtocolError::FrameTruncated`] if the
    /// declared payload length does not match the bytes available.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::FrameTooShort { len: bytes.len() });
        }
        let port = u32::from_le_bytes(bytes[0..4].try_into().unwrap_or_default());
        let kind = Pid::from(bytes[4]);
        let call_from = lossy_callsign(&bytes[5..15]);
        let call_to = lossy_callsign(&bytes[15..25]);
        let data_len = u32::from_le_bytes(bytes[25..29].try_into().unwrap_or_default()) as usize;
        let actual = bytes.len() - HEADER_LEN;
        if data_len != actual {
            return Err(ProtocolError::FrameTruncated { declared: data_len, actual });
        }
        Ok(Self { port, kind, call_from, call_to, data: bytes[HEADER_LEN..].to_vec() })
    }
}

fn pad_callsign(callsign: &str) -> Result<String, ProtocolError> {
    if callsign.len() > CALLSIGN_WIDTH {
        return Err(ProtocolError::InvalidField(format!(
            "callsign {callsign:?} is {} bytes, exceeds the {CALLSIGN_WIDTH}-byte field width",
            callsign.len()
        )));
    }
    let mut padded = callsign.to_string();
    padded.push_str(&" ".repeat(CALLSIGN_WIDTH - callsign.len()));
    Ok(padded)
}

fn lossy_callsign(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_file_chunk_frame() {
        let env =
            RadioEnvelope::new(0, Pid::FileChunk, "KE4AHR-1", "CQ", vec![1, 2, 3, 4]).unwrap();
        let encoded = env.encode();
        let decoded = RadioEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(decoded.kind.as_byte(), Pid::FILE_CHUNK);
    }

    #[test]
    fn tolerates_non_ascii_callsign_bytes() {
        let mut encoded =
            RadioEnvelope::new(0, Pid::DirectoryEntry, "CQ", "CQ", vec![]).unwrap().encode();
        encoded[5] = 0xFF; // corrupt a byte inside call_from
        let decoded = RadioEnvelope::decode(&encoded).unwrap();
        assert!(decoded.call_from.contains('\u{FFFD}'));
    }

    #[test]
    fn frame_too_short_is_rejected() {
        assert!(matches!(
            RadioEnvelope::decode(&[0u8; 10]).unwrap_err(),
            ProtocolError::FrameTooShort { len: 10 }
        ));
    }

    #[test]
    fn declared_length_mismatch_is_rejected() {
        let mut encoded =
            RadioEnvelope::new(0, Pid::FileChunk, "CQ", "CQ", vec![1, 2, 3]).unwrap().encode();
        let len_start = HEADER_LEN - 4;
        encoded[len_start..HEADER_LEN].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            RadioEnvelope::decode(&encoded).unwrap_err(),
            ProtocolError::FrameTruncated { declared: 99, actual: 3 }
        ));
    }

    #[test]
    fn callsign_too_long_is_rejected() {
        assert!(RadioEnvelope::new(0, Pid::FileChunk, "WAYTOOLONGCALLSIGN", "CQ", vec![]).is_err());
    }

    #[test]
    fn unknown_pid_round_trips_via_other() {
        assert_eq!(Pid::from(0x42).as_byte(), 0x42);
        assert_eq!(Pid::from(0x42), Pid::Other(0x42));
    }
}

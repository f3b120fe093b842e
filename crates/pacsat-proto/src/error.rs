//! Error types for wire codecs.

use thiserror::Error;

/// Errors raised while encoding or decoding a PFH, frame envelope, or radio
/// adapter record.
///
/// Decoding never has side effects: a failed `decode` call never mutates or
/// partially installs state in the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The leading two bytes were not `0xAA 0x55`.
    #[error("bad magic: expected 0xAA55")]
    BadMagic,

    /// The CRC-16 over the items blob did not match the prefix value.
    #[error("checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    BadChecksum {
        /// CRC value read from the wire.
        expected: u16,
        /// CRC value computed over the remaining bytes.
        computed: u16,
    },

    /// The buffer ended before a length-prefixed field could be read in
    /// full.
    #[error("truncated input: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of additional bytes that would have been required.
        needed: usize,
    },

    /// An item's declared length or identifier is inconsistent with the
    /// surrounding structure.
    #[error("malformed item: {0}")]
    MalformedItem(String),

    /// A field value does not fit its wire-format width (e.g. a base name
    /// longer than 8 bytes, or a serialized PFH larger than 65535 bytes).
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// A frame envelope was shorter than the fixed header it claims to
    /// carry.
    #[error("frame too short: {len} byte(s)")]
    FrameTooShort {
        /// Length of the buffer that was handed to the decoder.
        len: usize,
    },

    /// A frame's declared payload size does not match the bytes available.
    #[error("frame truncated: declared {declared} byte payload, got {actual}")]
    FrameTruncated {
        /// Payload length declared in the envelope.
        declared: usize,
        /// Payload bytes actually present.
        actual: usize,
    },
}

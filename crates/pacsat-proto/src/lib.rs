//! Wire codecs for the PACSAT ground-station protocol family.
//!
//! This crate has no internal workspace dependencies: it covers the
//! CRC-16/CCITT checksum (`crc16`), the PACSAT File Header TLV codec
//! (`pfh`), and the frame PID / radio-adapter envelope shapes (`envelope`)
//! shared by the upload/download engines and broadcast scheduler.

mod crc16;
mod envelope;
mod error;
mod pfh;

pub use crc16::crc16;
pub use envelope::{Pid, RadioEnvelope};
pub use error::ProtocolError;
pub use pfh::Pfh;

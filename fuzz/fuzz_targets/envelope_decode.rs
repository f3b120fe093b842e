//! Fuzz target for `RadioEnvelope::decode`.
//!
//! Arbitrary bytes crossing the radio boundary should never panic: a short
//! or truncated frame must surface as `ProtocolError`, never a crash or an
//! out-of-bounds slice.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pacsat_proto::RadioEnvelope;

fuzz_target!(|data: &[u8]| {
    let _ = RadioEnvelope::decode(data);
});

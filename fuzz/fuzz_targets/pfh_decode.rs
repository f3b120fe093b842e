//! Fuzz target for `Pfh::decode`.
//!
//! Arbitrary bytes should never panic the decoder: malformed items, bad
//! magic, truncated headers, and oversized lengths must all surface as
//! `ProtocolError`, never a crash.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pacsat_proto::Pfh;

fuzz_target!(|data: &[u8]| {
    let _ = Pfh::decode(data);
});

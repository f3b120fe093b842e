//! The production [`Environment`]: real monotonic time, real blocking
//! sleep, OS-backed randomness.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use pacsat_core::Environment;

/// Wires [`Environment`] to `std::time` and `getrandom`.
///
/// `sleep` blocks the calling thread; it is only ever called from the
/// broadcast scheduler's and session supervisor's own worker threads, never
/// from a request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // OS randomness is assumed always available; a failure here means
        // the host's entropy source is broken, which nothing downstream
        // could recover from either.
        getrandom::getrandom(buffer).unwrap_or_else(|_| {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        });
    }

    fn wall_clock_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

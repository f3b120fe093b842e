//! Environment abstraction for deterministic testing.
//!
//! Decouples the session supervisor and broadcast scheduler from real wall
//! time and OS randomness so their sweep/pacing logic can be driven
//! deterministically in tests, and wired to real `std::time`/OS entropy in
//! production.
//!
//! Unlike an async-runtime environment abstraction, `sleep` here is
//! blocking: the supervisor and broadcast scheduler are modeled as explicit
//! worker threads that tick off a `running` flag between bounded sleeps
//! (see the session supervisor and broadcast scheduler design notes), not
//! as async tasks.

use std::ops::Sub;
use std::time::Duration;

/// Abstract environment providing monotonic time, blocking sleep, and
/// randomness.
///
/// Implementations must guarantee:
/// - `now()` never goes backwards.
/// - `random_bytes()` uses cryptographically secure entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment. Production environments
    /// use `std::time::Instant`; test environments use a virtual clock.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Blocks the calling thread for `duration`.
    ///
    /// This is the only blocking primitive in the trait; it is used
    /// exclusively by worker-thread driver code, never by session/store
    /// logic.
    fn sleep(&self, duration: Duration);

    /// Fills `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, e.g. for session identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Current wall-clock time as Unix epoch seconds.
    ///
    /// PFH creation/upload timestamps are epoch seconds, not the monotonic
    /// instant used for session timeouts, so this is kept separate from
    /// `now()`.
    fn wall_clock_secs(&self) -> u64;
}

/// A deterministic [`Environment`] for tests: virtual clock, seeded RNG.
///
/// Enabled by the `test-util` feature so downstream crates (e.g. the
/// broadcast scheduler and session supervisor tests in `pacsat-server`) can
/// depend on it without pulling simulation code into production builds.
#[cfg(any(test, feature = "test-util"))]
pub mod sim {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::Environment;

    /// Virtual instant: a count of nanoseconds since the environment was
    /// created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct SimInstant(u128);

    impl std::ops::Sub for SimInstant {
        type Output = Duration;
        fn sub(self, rhs: Self) -> Duration {
            Duration::from_nanos(self.0.saturating_sub(rhs.0) as u64)
        }
    }

    /// Deterministic environment: `sleep` advances a virtual clock instead
    /// of blocking, and randomness is a seeded counter-based stream.
    #[derive(Debug, Clone)]
    pub struct SimEnv {
        clock_nanos: Arc<Mutex<u128>>,
        rng_state: Arc<Mutex<u64>>,
        epoch_start_secs: u64,
    }

    impl SimEnv {
        /// Creates a simulated environment with its virtual clock at zero,
        /// seeded with `seed` for reproducible randomness. Wall-clock time
        /// starts at `epoch_start_secs` and advances in lockstep with
        /// `sleep`.
        #[must_use]
        pub fn new(seed: u64, epoch_start_secs: u64) -> Self {
            let seed = if seed == 0 { 0xDEAD_BEEF_u64 } else { seed };
            Self {
                clock_nanos: Arc::new(Mutex::new(0)),
                rng_state: Arc::new(Mutex::new(seed)),
                epoch_start_secs,
            }
        }
    }

    impl Environment for SimEnv {
        type Instant = SimInstant;

        fn now(&self) -> Self::Instant {
            SimInstant(*self.clock_nanos.lock().unwrap_or_else(|e| e.into_inner()))
        }

        fn sleep(&self, duration: Duration) {
            let mut clock = self.clock_nanos.lock().unwrap_or_else(|e| e.into_inner());
            *clock += duration.as_nanos();
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut state = self.rng_state.lock().unwrap_or_else(|e| e.into_inner());
            for byte in buffer.iter_mut() {
                // xorshift64, deterministic and seed-reproducible.
                *state ^= *state << 13;
                *state ^= *state >> 7;
                *state ^= *state << 17;
                *byte = (*state & 0xFF) as u8;
            }
        }

        fn wall_clock_secs(&self) -> u64 {
            let clock = *self.clock_nanos.lock().unwrap_or_else(|e| e.into_inner());
            self.epoch_start_secs + (clock / 1_000_000_000) as u64
        }
    }
}

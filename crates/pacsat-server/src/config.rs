//! Ground station configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for a running ground station.
///
/// Populated from [`crate::Args`] by the CLI binary, or built directly by
/// tests and embedders.
#[derive(Debug, Clone)]
pub struct GroundStationConfig {
    /// Root directory for the file store (artifacts and the SQLite index).
    pub store_root: PathBuf,
    /// This station's callsign, used as the `call_from` on broadcast
    /// frames.
    pub callsign: String,
    /// Interval between directory broadcast sweeps. `None` disables the
    /// periodic sweep entirely; on-demand broadcasts still work.
    pub directory_broadcast_interval: Option<Duration>,
    /// Pacing delay between consecutive directory-entry frames within one
    /// sweep.
    pub directory_pace: Duration,
    /// Maximum payload bytes per file-chunk broadcast frame.
    pub chunk_size: usize,
    /// Pacing delay between consecutive chunk frames within one chunk
    /// broadcast.
    pub chunk_pace: Duration,
    /// Upload session inactivity timeout before the supervisor reaps it.
    pub upload_timeout: Duration,
    /// Download session inactivity timeout before the supervisor reaps it.
    pub download_timeout: Duration,
    /// How often the supervisor sweeps for stale sessions and expired
    /// trash.
    pub supervisor_interval: Duration,
    /// Maximum declared size an upload may claim.
    pub upload_max_size: u32,
    /// How long a soft-deleted file stays in `.trash/` before the
    /// supervisor's sweep permanently removes it.
    pub trash_retention: Duration,
}

impl GroundStationConfig {
    /// Reasonable defaults for a ground station rooted at `store_root`,
    /// identifying as `callsign`.
    ///
    /// Matches the FTL0 reference timeouts: 300s session inactivity, 60s
    /// supervisor sweep, 20,000,000-byte upload ceiling, 30-day trash
    /// retention.
    #[must_use]
    pub fn new(store_root: impl Into<PathBuf>, callsign: impl Into<String>) -> Self {
        Self {
            store_root: store_root.into(),
            callsign: callsign.into(),
            directory_broadcast_interval: Some(Duration::from_secs(600)),
            directory_pace: Duration::from_millis(500),
            chunk_size: 256,
            chunk_pace: Duration::from_millis(100),
            upload_timeout: Duration::from_secs(300),
            download_timeout: Duration::from_secs(300),
            supervisor_interval: Duration::from_secs(60),
            upload_max_size: 20_000_000,
            trash_retention: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

//! Directory and chunk broadcast scheduler: C6.
//!
//! Two kinds of outbound broadcast, serialized through one lock so a
//! long-running chunk broadcast never interleaves with a directory sweep on
//! the air:
//!
//! - periodic directory sweep: one PID `0xBD` frame per live file, newest
//!   first, each frame a serialized PFH;
//! - on-demand chunk broadcast: one PID `0xBB` frame per `chunk_size`-byte
//!   slice of a file's body, in order, followed by an end-of-file marker.
//!
//! Modeled as an explicit worker thread ticking a `running` flag between
//! bounded sleeps, not an async task, matching [`pacsat_core::Environment`]'s
//! blocking `sleep`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use pacsat_core::{Environment, FileStore};
use pacsat_proto::{crc16, Pfh, Pid};

use crate::error::BroadcastError;
use crate::radio::Radio;

/// The step size used while a worker thread waits out its sweep interval,
/// so `stop()` takes effect within one step rather than a whole interval.
const POLL_STEP: Duration = Duration::from_millis(200);

/// Periodic directory broadcast plus on-demand chunk broadcast (C6).
pub struct BroadcastScheduler<S, E> {
    store: S,
    radio: Arc<dyn Radio>,
    env: E,
    callsign: String,
    directory_interval: Option<Duration>,
    directory_pace: Duration,
    chunk_size: usize,
    chunk_pace: Duration,
    running: Arc<AtomicBool>,
    /// Held for the duration of any broadcast (directory sweep or chunk
    /// broadcast) so the two never interleave on the air.
    air_lock: Arc<SyncMutex<()>>,
}

impl<S: FileStore, E: Environment> BroadcastScheduler<S, E> {
    /// Creates a scheduler over `store`, transmitting through `radio` as
    /// `callsign`.
    #[must_use]
    pub fn new(
        store: S,
        radio: Arc<dyn Radio>,
        env: E,
        callsign: impl Into<String>,
        directory_interval: Option<Duration>,
        directory_pace: Duration,
        chunk_size: usize,
        chunk_pace: Duration,
    ) -> Self {
        Self {
            store,
            radio,
            env,
            callsign: callsign.into(),
            directory_interval,
            directory_pace,
            chunk_size: chunk_size.max(1),
            chunk_pace,
            running: Arc::new(AtomicBool::new(false)),
            air_lock: Arc::new(SyncMutex::new(())),
        }
    }

    /// Broadcasts one PID `0xBD` frame per live file, newest upload first.
    ///
    /// Files whose stored header fails to re-decode are logged and skipped;
    /// the sweep never aborts partway through.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError`] if listing the store or transmitting a
    /// frame fails.
    pub fn broadcast_directory(&self) -> Result<usize, BroadcastError> {
        let _guard = self.air_lock.lock();
        let records = self.store.list()?;
        let mut sent = 0;
        let last = records.len().saturating_sub(1);
        for (i, record) in records.iter().enumerate() {
            match self.broadcast_one_header(record.file_num) {
                Ok(()) => sent += 1,
                Err(BroadcastError::CorruptHeader { file_num, source }) => {
                    tracing::warn!(file_num, %source, "skipping file with corrupt header during directory sweep");
                }
                Err(other) => return Err(other),
            }
            if i != last {
                self.env.sleep(self.directory_pace);
            }
        }
        Ok(sent)
    }

    /// Broadcasts a single PID `0xBD` frame for `file_num`, outside the
    /// periodic sweep.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::NoSuchFile`] if `file_num` has no live row.
    pub fn broadcast_single_file(&self, file_num: u32) -> Result<(), BroadcastError> {
        let _guard = self.air_lock.lock();
        self.broadcast_one_header(file_num)
    }

    fn broadcast_one_header(&self, file_num: u32) -> Result<(), BroadcastError> {
        let stored = self.store.open(file_num).map_err(|e| match e {
            pacsat_core::StoreError::NotFound(n) => BroadcastError::NoSuchFile(n),
            other => BroadcastError::Store(other),
        })?;
        let pfh = Pfh::decode(&stored)
            .map_err(|source| BroadcastError::CorruptHeader { file_num, source })?;
        let payload = pfh
            .encode()
            .map_err(|source| BroadcastError::CorruptHeader { file_num, source })?;
        self.radio.send_ui(0, &self.callsign, "CQ", Pid::DirectoryEntry, &payload)?;
        Ok(())
    }

    /// Broadcasts the full body of `file_num` as a sequence of PID `0xBB`
    /// chunk frames, paced `chunk_pace` apart, followed by an end-of-file
    /// marker.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::NoSuchFile`] if `file_num` has no live row.
    pub fn broadcast_file_chunks(&self, file_num: u32) -> Result<usize, BroadcastError> {
        let _guard = self.air_lock.lock();
        let stored = self.store.open(file_num).map_err(|e| match e {
            pacsat_core::StoreError::NotFound(n) => BroadcastError::NoSuchFile(n),
            other => BroadcastError::Store(other),
        })?;
        let pfh = Pfh::decode(&stored)
            .map_err(|source| BroadcastError::CorruptHeader { file_num, source })?;
        let body = &stored[pfh.body_offset as usize..];

        let chunks: Vec<&[u8]> = body.chunks(self.chunk_size).collect();
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let start = (i * self.chunk_size) as u32;
            self.radio.send_chunk(file_num, start, chunk)?;
            if i != last {
                self.env.sleep(self.chunk_pace);
            }
        }
        self.radio.send_eof(file_num, body.len() as u32, crc16(body))?;
        Ok(chunks.len())
    }

    /// Spawns the periodic directory-sweep worker thread.
    ///
    /// A no-op if `directory_interval` is `None`. Returns immediately; the
    /// sweep loop runs on its own thread until [`BroadcastScheduler::stop`]
    /// is called.
    pub fn start(self: Arc<Self>) -> Option<std::thread::JoinHandle<()>>
    where
        S: 'static,
        E: 'static,
    {
        let interval = self.directory_interval?;
        self.running.store(true, Ordering::SeqCst);
        let scheduler = self;
        Some(std::thread::spawn(move || {
            while scheduler.running.load(Ordering::SeqCst) {
                if let Err(error) = scheduler.broadcast_directory() {
                    tracing::error!(%error, "directory broadcast sweep failed");
                }
                let mut waited = Duration::ZERO;
                while waited < interval && scheduler.running.load(Ordering::SeqCst) {
                    let step = POLL_STEP.min(interval - waited);
                    scheduler.env.sleep(step);
                    waited += step;
                }
            }
        }))
    }

    /// Signals the worker thread started by [`BroadcastScheduler::start`]
    /// to stop after its current sleep step.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

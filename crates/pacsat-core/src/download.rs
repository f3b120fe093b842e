//! FTL0 download engine: C5.
//!
//! Every request is self-describing by its hole list — "download session"
//! state here is test/diagnostic bookkeeping (`last_activity` per client) and
//! fairness ordering, not progress tracking. `handle_request` resolves the
//! file, clamps each requested range to the body, and returns a sequence of
//! chunk/end-of-file emissions for the caller to push through the `Radio`
//! boundary with pacing; this engine never calls the radio directly so it
//! stays testable without one.

use parking_lot::Mutex;
use pacsat_proto::crc16;

use crate::env::Environment;
use crate::error::DownloadError;
use crate::store::FileStore;
use crate::upload::Hole;

/// One outbound emission produced by [`DownloadEngine::handle_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEmission {
    /// A chunk of the body for the byte range `[start, end]` (inclusive).
    Chunk {
        /// File number the chunk belongs to.
        file_num: u32,
        /// Start offset of the chunk within the body.
        start: u32,
        /// Chunk payload.
        data: Vec<u8>,
    },
    /// End-of-file marker: the hole list was empty, signaling client
    /// completion.
    EndOfFile {
        /// File number that finished downloading.
        file_num: u32,
        /// Total body size.
        size: u32,
        /// CRC-16 of the whole body.
        crc: u16,
    },
}

struct Tracked<I> {
    #[allow(dead_code)]
    client_callsign: String,
    last_activity: I,
}

/// The FTL0 download session engine (C5).
///
/// Outstanding requests are processed in arrival order (round-robin per
/// chunk emission reduces, with no queued per-client state in this core, to
/// simply not prioritizing any client over another — see `SPEC_FULL.md`'s
/// download-session fairness note).
pub struct DownloadEngine<E: Environment> {
    env: E,
    sessions: Mutex<std::collections::HashMap<u32, Tracked<E::Instant>>>,
}

impl<E: Environment> DownloadEngine<E> {
    /// Creates a download engine using `env` for session-activity
    /// timestamps.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self { env, sessions: Mutex::new(std::collections::HashMap::new()) }
    }

    /// Serves a hole-list request for `file_num` from `store`.
    ///
    /// Resolves the file, decodes its PFH, clamps each requested `(start,
    /// end)` range to `[0, body.len()-1]` (dropping ranges that become empty
    /// after clamping), and returns one [`DownloadEmission::Chunk`] per
    /// surviving range. An empty `hole_list` means the client is signaling
    /// completion: the download counter is incremented once and a single
    /// [`DownloadEmission::EndOfFile`] is returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NoSuchFile`] if `file_num` has no live row.
    pub fn handle_request(
        &self,
        file_num: u32,
        hole_list: &[Hole],
        client_callsign: &str,
        store: &impl FileStore,
    ) -> Result<Vec<DownloadEmission>, DownloadError> {
        self.sessions.lock().entry(file_num).or_insert_with(|| Tracked {
            client_callsign: client_callsign.to_string(),
            last_activity: self.env.now(),
        });
        if let Some(tracked) = self.sessions.lock().get_mut(&file_num) {
            tracked.last_activity = self.env.now();
        }

        let stored = store.open(file_num).map_err(|e| match e {
            crate::error::StoreError::NotFound(_) => DownloadError::NoSuchFile(file_num),
            other => DownloadError::Io(std::io::Error::other(other.to_string())),
        })?;
        let pfh = pacsat_proto::Pfh::decode(&stored)?;
        let body = &stored[pfh.body_offset as usize..];
        let body_len = body.len() as u32;

        if hole_list.is_empty() {
            store
                .increment_download_count(file_num)
                .map_err(|e| DownloadError::Io(std::io::Error::other(e.to_string())))?;
            self.sessions.lock().remove(&file_num);
            return Ok(vec![DownloadEmission::EndOfFile {
                file_num,
                size: body_len,
                crc: crc16(body),
            }]);
        }

        let mut emissions = Vec::with_capacity(hole_list.len());
        for &(start, end) in hole_list {
            if body_len == 0 || start >= body_len {
                continue;
            }
            let clamped_end = end.min(body_len - 1);
            if clamped_end < start {
                continue;
            }
            let data = body[start as usize..=clamped_end as usize].to_vec();
            emissions.push(DownloadEmission::Chunk { file_num, start, data });
        }
        Ok(emissions)
    }

    /// Drops download sessions whose `last_activity` is older than
    /// `timeout`, returning the file numbers dropped. Called by the session
    /// supervisor.
    pub fn reap_stale(&self, timeout: std::time::Duration) -> Vec<u32> {
        let now = self.env.now();
        let mut sessions = self.sessions.lock();
        let stale: Vec<u32> = sessions
            .iter()
            .filter(|(_, s)| now - s.last_activity > timeout)
            .map(|(&fnum, _)| fnum)
            .collect();
        for fnum in &stale {
            sessions.remove(fnum);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::sim::SimEnv;
    use crate::store::SqliteFileStore;

    fn store_with_file(body: &[u8]) -> (tempfile::TempDir, SqliteFileStore, u32) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteFileStore::open(dir.path()).unwrap();
        let fnum = store.reserve_file_number().unwrap();
        let pfh = pacsat_proto::Pfh::new(0, "HELLO", "TXT", 0, 0, 1_000, 1_000, 0, 0).unwrap();
        store.add_file(fnum, "CALL", pfh, body, 1_000).unwrap();
        (dir, store, fnum)
    }

    #[test]
    fn serves_requested_chunks() {
        let (_dir, store, fnum) = store_with_file(b"Hello PACSAT ground station!");
        let engine = DownloadEngine::new(SimEnv::new(1, 0));

        let emissions =
            engine.handle_request(fnum, &[(0, 4)], "CLIENT-1", &store).unwrap();
        assert_eq!(
            emissions,
            vec![DownloadEmission::Chunk { file_num: fnum, start: 0, data: b"Hello".to_vec() }]
        );
    }

    #[test]
    fn empty_hole_list_emits_eof_and_increments_counter() {
        let body = b"Hello PACSAT ground station!";
        let (_dir, store, fnum) = store_with_file(body);
        let engine = DownloadEngine::new(SimEnv::new(1, 0));

        let emissions = engine.handle_request(fnum, &[], "CLIENT-1", &store).unwrap();
        assert_eq!(
            emissions,
            vec![DownloadEmission::EndOfFile {
                file_num: fnum,
                size: body.len() as u32,
                crc: crc16(body)
            }]
        );
        let record = store.list().unwrap().into_iter().next().unwrap();
        assert_eq!(record.download_count, 1);
    }

    #[test]
    fn out_of_range_request_is_clamped_and_dropped_if_empty() {
        let body = b"short";
        let (_dir, store, fnum) = store_with_file(body);
        let engine = DownloadEngine::new(SimEnv::new(1, 0));

        let emissions = engine.handle_request(fnum, &[(0, 100)], "CLIENT-1", &store).unwrap();
        assert_eq!(
            emissions,
            vec![DownloadEmission::Chunk { file_num: fnum, start: 0, data: body.to_vec() }]
        );

        let emissions = engine.handle_request(fnum, &[(10, 20)], "CLIENT-1", &store).unwrap();
        assert!(emissions.is_empty());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteFileStore::open(dir.path()).unwrap();
        let engine = DownloadEngine::new(SimEnv::new(1, 0));

        let err = engine.handle_request(999, &[], "CLIENT-1", &store).unwrap_err();
        assert!(matches!(err, DownloadError::NoSuchFile(999)));
    }

    #[test]
    fn supervisor_reaps_stale_download_sessions() {
        let env = SimEnv::new(1, 0);
        let (_dir, store, fnum) = store_with_file(b"data");
        let engine = DownloadEngine::new(env.clone());

        engine.handle_request(fnum, &[(0, 1)], "CLIENT-1", &store).unwrap();
        env.sleep(std::time::Duration::from_secs(301));
        let reaped = engine.reap_stale(std::time::Duration::from_secs(300));
        assert_eq!(reaped, vec![fnum]);
    }
}

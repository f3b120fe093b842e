//! FTL0 upload engine: C4.
//!
//! Tracks one [`UploadSession`] per in-flight file number, accepts
//! out-of-order chunks, and computes the hole list of still-missing byte
//! ranges. A session survives CRC mismatches and incomplete-completion
//! attempts so the client can resend; it is dropped only on success or on
//! supervisor timeout.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use pacsat_proto::crc16;

use crate::env::Environment;
use crate::error::UploadError;
use crate::store::FileStore;

/// An inclusive, half-open-free byte range `[start, end]` still missing from
/// an in-flight upload.
pub type Hole = (u32, u32);

/// Metadata the client supplies alongside a completed upload, used to
/// synthesize the stored [`pacsat_proto::Pfh`]. Server-stamped fields (file
/// number, size, upload time, body offset) are never taken from here.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    /// Base name, truncated/padded to 8 bytes by [`pacsat_proto::Pfh::new`].
    pub name: String,
    /// Extension, truncated/padded to 3 bytes.
    pub ext: String,
    /// File type byte.
    pub file_type: u8,
    /// Body description.
    pub description: String,
}

/// Configured limits on upload sessions.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Maximum declared size accepted by `start_upload`, in bytes.
    pub max_size: u32,
}

impl Default for UploadLimits {
    /// 20,000,000 bytes, matching the original hard-coded ceiling (see
    /// the "Open Question" resolution in `SPEC_FULL.md`: treated as
    /// configuration here rather than a literal).
    fn default() -> Self {
        Self { max_size: 20_000_000 }
    }
}

struct Session<I> {
    declared_size: u32,
    callsign: String,
    chunks: BTreeMap<u32, Vec<u8>>,
    last_activity: I,
}

impl<I: Copy> Session<I> {
    fn holes(&self) -> Vec<Hole> {
        compute_holes(&self.chunks, self.declared_size)
    }
}

/// Computes the hole list for a set of installed chunks against a declared
/// total size: walks chunks in offset order, emitting a hole for each gap
/// and a final hole for a missing tail.
fn compute_holes(chunks: &BTreeMap<u32, Vec<u8>>, declared_size: u32) -> Vec<Hole> {
    if chunks.is_empty() {
        return if declared_size == 0 { Vec::new() } else { vec![(0, declared_size - 1)] };
    }

    let mut holes = Vec::new();
    let mut expected: u32 = 0;
    for (&offset, data) in chunks {
        if offset > expected {
            holes.push((expected, offset - 1));
        }
        expected = expected.max(offset + data.len() as u32);
    }
    if expected < declared_size {
        holes.push((expected, declared_size - 1));
    }
    holes
}

/// The FTL0 upload session engine (C4).
///
/// Holds one [`Mutex`]-guarded session map; the guard is never held across
/// store I/O, matching the concurrency model's "no lock across a blocking
/// call" rule (the map is only touched to look up/mutate in-memory session
/// state, and `complete_upload` clones the reassembled body out before
/// releasing the lock to call the store).
pub struct UploadEngine<E: Environment> {
    limits: UploadLimits,
    env: E,
    sessions: Mutex<std::collections::HashMap<u32, Session<E::Instant>>>,
}

impl<E: Environment> UploadEngine<E> {
    /// Creates an upload engine with the given limits, using `env` for
    /// session-activity timestamps.
    #[must_use]
    pub fn new(limits: UploadLimits, env: E) -> Self {
        Self { limits, env, sessions: Mutex::new(std::collections::HashMap::new()) }
    }

    /// Begins tracking an upload for `file_num`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::DuplicateSession`] if a session for `file_num`
    /// is already open, or [`UploadError::InvalidSize`] if `declared_size` is
    /// zero or exceeds the configured ceiling. Neither error creates a
    /// session.
    pub fn start_upload(
        &self,
        file_num: u32,
        declared_size: u32,
        callsign: &str,
    ) -> Result<(), UploadError> {
        if declared_size == 0 || declared_size > self.limits.max_size {
            return Err(UploadError::InvalidSize {
                size: u64::from(declared_size),
                limit: u64::from(self.limits.max_size),
            });
        }

        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&file_num) {
            return Err(UploadError::DuplicateSession(file_num));
        }
        sessions.insert(
            file_num,
            Session {
                declared_size,
                callsign: callsign.to_string(),
                chunks: BTreeMap::new(),
                last_activity: self.env.now(),
            },
        );
        tracing::info!(file_num, declared_size, callsign, "upload session started");
        Ok(())
    }

    /// Installs a chunk at `offset`, first-write-wins on duplicate offsets,
    /// and returns the resulting hole list.
    ///
    /// A zero-length chunk is accepted and ignored (it can neither fill nor
    /// extend a hole).
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NoSuchSession`] if no session for `file_num` is
    /// open, or [`UploadError::OutOfRange`] if `[offset, offset+len)` would
    /// extend past the declared size.
    pub fn add_chunk(
        &self,
        file_num: u32,
        offset: u32,
        data: Vec<u8>,
    ) -> Result<Vec<Hole>, UploadError> {
        let mut sessions = self.sessions.lock();
        let session =
            sessions.get_mut(&file_num).ok_or(UploadError::NoSuchSession(file_num))?;

        if data.is_empty() {
            return Ok(session.holes());
        }

        let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let end = offset.checked_add(len).ok_or(UploadError::OutOfRange {
            offset,
            len,
            declared_size: session.declared_size,
        })?;
        if end > session.declared_size {
            return Err(UploadError::OutOfRange { offset, len, declared_size: session.declared_size });
        }

        session.chunks.entry(offset).or_insert(data);
        session.last_activity = self.env.now();
        Ok(session.holes())
    }

    /// Finalizes an upload: requires the hole list to be empty and the
    /// reassembled body's CRC to match `client_crc`. On success, stores the
    /// file via `store` and drops the session; on failure, the session is
    /// retained so the client can resend.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NoSuchSession`], [`UploadError::Incomplete`], or
    /// [`UploadError::CrcMismatch`]. Store failures propagate as
    /// [`UploadError::Store`].
    pub fn complete_upload(
        &self,
        file_num: u32,
        client_crc: u16,
        metadata: &UploadMetadata,
        store: &impl FileStore,
        upload_time_secs: u32,
    ) -> Result<(), UploadError> {
        // Reassemble and validate under the lock, but release it before the
        // store write: store I/O must never happen while holding the
        // session-map lock.
        let (callsign, body) = {
            let mut sessions = self.sessions.lock();
            let session =
                sessions.get_mut(&file_num).ok_or(UploadError::NoSuchSession(file_num))?;

            let holes = session.holes();
            if !holes.is_empty() {
                let missing_bytes: u64 =
                    holes.iter().map(|(s, e)| u64::from(e - s) + 1).sum();
                return Err(UploadError::Incomplete { missing_bytes });
            }

            let mut body = Vec::with_capacity(session.declared_size as usize);
            for chunk in session.chunks.values() {
                body.extend_from_slice(chunk);
            }

            let computed = crc16(&body);
            if computed != client_crc {
                return Err(UploadError::CrcMismatch { expected: client_crc, computed });
            }

            (session.callsign.clone(), body)
        };

        let pfh = pacsat_proto::Pfh::new(
            file_num,
            &metadata.name,
            &metadata.ext,
            metadata.file_type,
            body.len() as u32,
            upload_time_secs,
            upload_time_secs,
            0,
            0,
        )
        .map_err(|e| UploadError::Store(format!("invalid header for file {file_num}: {e}")))?
        .with_description(metadata.description.clone());

        store
            .add_file(file_num, &callsign, pfh, &body, upload_time_secs)
            .map_err(|e| UploadError::Store(e.to_string()))?;

        self.sessions.lock().remove(&file_num);
        tracing::info!(file_num, bytes = body.len(), callsign, "upload completed");
        Ok(())
    }

    /// Drops upload sessions whose `last_activity` is older than `timeout`,
    /// returning the file numbers dropped. Called by the session supervisor.
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
            tracing::info!(file_num = fnum, "upload session reaped after inactivity timeout");
        }
        stale
    }

    /// Whether a session for `file_num` is currently open (test/diagnostic
    /// use).
    #[must_use]
    pub fn has_session(&self, file_num: u32) -> bool {
        self.sessions.lock().contains_key(&file_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::sim::SimEnv;
    use crate::store::SqliteFileStore;

    fn engine() -> UploadEngine<SimEnv> {
        UploadEngine::new(UploadLimits::default(), SimEnv::new(1, 1_735_689_600))
    }

    #[test]
    fn scenario_2_upload_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteFileStore::open(dir.path()).unwrap();
        let engine = engine();

        engine.start_upload(1001, 28, "G0K8KA-0").unwrap();
        assert_eq!(engine.add_chunk(1001, 0, b"Hello ".to_vec()).unwrap(), vec![(6, 27)]);
        assert_eq!(engine.add_chunk(1001, 6, b"PACSAT ".to_vec()).unwrap(), vec![(13, 27)]);
        assert_eq!(engine.add_chunk(1001, 13, b"ground station!".to_vec()).unwrap(), vec![]);

        let body = b"Hello PACSAT ground station!";
        let crc = crc16(body);
        let metadata = UploadMetadata {
            name: "HELLO".to_string(),
            ext: "TXT".to_string(),
            file_type: 0,
            description: String::new(),
        };
        engine.complete_upload(1001, crc, &metadata, &store, 1_735_689_600).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_num, 1001);
        assert_eq!(listed[0].callsign, "G0K8KA-0");
        assert_eq!(listed[0].size, 28);
        assert!(!engine.has_session(1001));
    }

    #[test]
    fn scenario_3_upload_with_packet_loss() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteFileStore::open(dir.path()).unwrap();
        let engine = engine();

        engine.start_upload(1002, 20, "LOSS-0").unwrap();
        engine.add_chunk(1002, 0, b"0123456789".to_vec()).unwrap();
        let holes = engine.add_chunk(1002, 15, b"FGHIJ".to_vec()).unwrap();
        assert_eq!(holes, vec![(10, 14)]);

        let holes = engine.add_chunk(1002, 10, b"ABCDE".to_vec()).unwrap();
        assert!(holes.is_empty());

        let body = b"0123456789ABCDEFGHIJ";
        let crc = crc16(body);
        let metadata = UploadMetadata {
            name: "LOSSY".to_string(),
            ext: "BIN".to_string(),
            file_type: 0,
            description: String::new(),
        };
        engine.complete_upload(1002, crc, &metadata, &store, 1_000).unwrap();

        let stored = store.open(1002).unwrap();
        let pfh = pacsat_proto::Pfh::decode(&stored).unwrap();
        assert_eq!(&stored[pfh.body_offset as usize..], body.as_slice());
    }

    #[test]
    fn scenario_4_crc_mismatch_retains_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteFileStore::open(dir.path()).unwrap();
        let engine = engine();

        engine.start_upload(1002, 20, "LOSS-0").unwrap();
        engine.add_chunk(1002, 0, b"0123456789".to_vec()).unwrap();
        engine.add_chunk(1002, 10, b"ABCDEFGHIJ".to_vec()).unwrap();

        let metadata = UploadMetadata {
            name: "LOSSY".to_string(),
            ext: "BIN".to_string(),
            file_type: 0,
            description: String::new(),
        };
        let err = engine.complete_upload(1002, 0x0000, &metadata, &store, 1_000).unwrap_err();
        assert!(matches!(err, UploadError::CrcMismatch { .. }));
        assert!(engine.has_session(1002));

        let correct_crc = crc16(b"0123456789ABCDEFGHIJ");
        engine.complete_upload(1002, correct_crc, &metadata, &store, 1_000).unwrap();
        assert!(!engine.has_session(1002));
    }

    #[test]
    fn duplicate_session_is_rejected() {
        let engine = engine();
        engine.start_upload(1, 10, "CALL").unwrap();
        assert!(matches!(
            engine.start_upload(1, 10, "CALL").unwrap_err(),
            UploadError::DuplicateSession(1)
        ));
    }

    #[test]
    fn invalid_size_never_creates_a_session() {
        let engine = engine();
        assert!(engine.start_upload(1, 0, "CALL").is_err());
        assert!(engine.start_upload(2, 20_000_001, "CALL").is_err());
        assert!(!engine.has_session(1));
        assert!(!engine.has_session(2));
    }

    #[test]
    fn chunk_straddling_declared_size_is_rejected() {
        let engine = engine();
        engine.start_upload(1, 10, "CALL").unwrap();
        let err = engine.add_chunk(1, 8, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, UploadError::OutOfRange { .. }));
    }

    #[test]
    fn zero_length_chunk_is_ignored() {
        let engine = engine();
        engine.start_upload(1, 10, "CALL").unwrap();
        let holes = engine.add_chunk(1, 3, vec![]).unwrap();
        assert_eq!(holes, vec![(0, 9)]);
    }

    #[test]
    fn duplicate_offset_is_first_write_wins() {
        let engine = engine();
        engine.start_upload(1, 10, "CALL").unwrap();
        engine.add_chunk(1, 0, b"aaaaaaaaaa".to_vec()).unwrap();
        let holes = engine.add_chunk(1, 0, b"bbbbbbbbbb".to_vec()).unwrap();
        assert!(holes.is_empty());
        let crc = crc16(b"aaaaaaaaaa");
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteFileStore::open(dir.path()).unwrap();
        let metadata = UploadMetadata {
            name: "DUP".to_string(),
            ext: "BIN".to_string(),
            file_type: 0,
            description: String::new(),
        };
        engine.complete_upload(1, crc, &metadata, &store, 1_000).unwrap();
    }

    #[test]
    fn repeated_identical_chunk_is_idempotent() {
        let engine = engine();
        engine.start_upload(1, 10, "CALL").unwrap();
        let first = engine.add_chunk(1, 0, b"aaaaa".to_vec()).unwrap();
        let second = engine.add_chunk(1, 0, b"aaaaa".to_vec()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn supervisor_reaps_stale_sessions() {
        let env = SimEnv::new(1, 0);
        let engine = UploadEngine::new(UploadLimits::default(), env.clone());
        engine.start_upload(1, 10, "CALL").unwrap();

        env.sleep(std::time::Duration::from_secs(301));
        let reaped = engine.reap_stale(std::time::Duration::from_secs(300));
        assert_eq!(reaped, vec![1]);
        assert!(!engine.has_session(1));
    }

    #[test]
    fn active_session_survives_reap() {
        let env = SimEnv::new(1, 0);
        let engine = UploadEngine::new(UploadLimits::default(), env.clone());
        engine.start_upload(1, 10, "CALL").unwrap();

        env.sleep(std::time::Duration::from_secs(299));
        let reaped = engine.reap_stale(std::time::Duration::from_secs(300));
        assert!(reaped.is_empty());
        assert!(engine.has_session(1));
    }
}

//! PACSAT ground station runtime.
//!
//! Assembles the file store, FTL0 upload/download engines, directory/chunk
//! broadcast scheduler (C6), radio boundary (C7), and session supervisor
//! (C8) from `pacsat-core` and `pacsat-proto` into one running station.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod radio;
pub mod supervisor;
pub mod system_env;

use std::sync::Arc;

use pacsat_core::{DownloadEngine, Environment, FileStore, SqliteFileStore, UploadEngine, UploadLimits};

pub use broadcast::BroadcastScheduler;
pub use config::GroundStationConfig;
pub use error::ServerError;
pub use radio::{LoggingRadio, MockRadio, Radio};
pub use supervisor::Supervisor;
pub use system_env::SystemEnv;

/// A fully assembled ground station: store, engines, scheduler, and
/// supervisor, wired together from one [`GroundStationConfig`].
///
/// Generic over the environment so the whole station can be driven by a
/// [`pacsat_core::env::sim::SimEnv`] in tests or [`SystemEnv`] in
/// production.
pub struct GroundStation<E: Environment> {
    /// The content-addressed file store.
    pub store: SqliteFileStore,
    /// The FTL0 upload session engine.
    pub upload: Arc<UploadEngine<E>>,
    /// The FTL0 download session engine.
    pub download: Arc<DownloadEngine<E>>,
    /// The directory/chunk broadcast scheduler.
    pub broadcast: Arc<BroadcastScheduler<SqliteFileStore, E>>,
    /// The session supervisor.
    pub supervisor: Arc<Supervisor<SqliteFileStore, E>>,
}

impl<E: Environment> GroundStation<E> {
    /// Opens the store at `config.store_root` and assembles every
    /// component, transmitting through `radio`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Store`] if the store cannot be opened.
    pub fn open(config: &GroundStationConfig, radio: Arc<dyn Radio>, env: E) -> Result<Self, ServerError> {
        let store = SqliteFileStore::open(&config.store_root)?;
        let upload = Arc::new(UploadEngine::new(
            UploadLimits { max_size: config.upload_max_size },
            env.clone(),
        ));
        let download = Arc::new(DownloadEngine::new(env.clone()));
        let broadcast = Arc::new(BroadcastScheduler::new(
            store.clone(),
            radio,
            env.clone(),
            config.callsign.clone(),
            config.directory_broadcast_interval,
            config.directory_pace,
            config.chunk_size,
            config.chunk_pace,
        ));
        let supervisor = Arc::new(Supervisor::new(
            store.clone(),
            upload.clone(),
            download.clone(),
            env,
            config.supervisor_interval,
            config.upload_timeout,
            config.download_timeout,
            config.trash_retention,
        ));

        Ok(Self { store, upload, download, broadcast, supervisor })
    }

    /// Starts the broadcast scheduler's and session supervisor's worker
    /// threads. Returns immediately; the threads run until
    /// [`GroundStation::shutdown`] is called.
    pub fn run(&self) -> Handles
    where
        E: 'static,
    {
        Handles {
            broadcast: Arc::clone(&self.broadcast).start(),
            supervisor: Some(Arc::clone(&self.supervisor).start()),
        }
    }

    /// Signals both worker threads to stop.
    pub fn shutdown(&self) {
        self.broadcast.stop();
        self.supervisor.stop();
    }
}

/// Join handles for the worker threads started by [`GroundStation::run`].
pub struct Handles {
    broadcast: Option<std::thread::JoinHandle<()>>,
    supervisor: Option<std::thread::JoinHandle<()>>,
}

impl Handles {
    /// Blocks until both worker threads have exited (normally after
    /// [`GroundStation::shutdown`] is called from another thread).
    pub fn join(self) {
        if let Some(handle) = self.broadcast {
            let _ = handle.join();
        }
        if let Some(handle) = self.supervisor {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacsat_core::env::sim::SimEnv;

    #[test]
    fn open_assembles_every_component() {
        let dir = tempfile::tempdir().unwrap();
        let config = GroundStationConfig::new(dir.path(), "GS-1");
        let env = SimEnv::new(1, 0);
        let radio: Arc<dyn Radio> = Arc::new(MockRadio::new());

        let station = GroundStation::open(&config, radio, env).unwrap();
        assert!(station.store.list().unwrap().is_empty());
        assert!(!station.upload.has_session(1));
    }

    #[test]
    fn run_and_shutdown_stop_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GroundStationConfig::new(dir.path(), "GS-1");
        config.directory_broadcast_interval = Some(std::time::Duration::from_millis(50));
        config.supervisor_interval = std::time::Duration::from_millis(50);
        let env = SystemEnv;
        let radio: Arc<dyn Radio> = Arc::new(MockRadio::new());

        let station = GroundStation::open(&config, radio, env).unwrap();
        let handles = station.run();
        std::thread::sleep(std::time::Duration::from_millis(120));
        station.shutdown();
        handles.join();
    }
}

//! `pacsat-server`: runs a ground station's directory/chunk broadcast
//! scheduler and session supervisor against a file store.
//!
//! No radio adapter ships in this binary (KISS/AGWPE/AX.25 transports are
//! out of scope); outgoing frames are logged by [`pacsat_server::LoggingRadio`]
//! instead of transmitted. Wiring a real adapter means implementing
//! [`pacsat_server::Radio`] and passing it to [`pacsat_server::GroundStation::open`]
//! in place of the logging stand-in.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pacsat_server::{GroundStation, GroundStationConfig, LoggingRadio, Radio, ServerError, SystemEnv};

/// Ground station CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "pacsat-server", about = "PACSAT store-and-forward ground station")]
struct Args {
    /// Root directory for the file store.
    #[arg(long, default_value = "./pacsat-store")]
    store_root: PathBuf,

    /// This station's callsign.
    #[arg(long)]
    callsign: String,

    /// Minutes between periodic directory broadcast sweeps. `0` disables
    /// the periodic sweep.
    #[arg(long, default_value_t = 10)]
    directory_interval_mins: u64,

    /// Maximum declared upload size, in bytes.
    #[arg(long, default_value_t = 20_000_000)]
    upload_max_size: u32,

    /// Log level filter (e.g. `info`, `debug`, `pacsat_server=trace`).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = GroundStationConfig::new(args.store_root.clone(), args.callsign.clone());
    config.directory_broadcast_interval = if args.directory_interval_mins == 0 {
        None
    } else {
        Some(Duration::from_secs(args.directory_interval_mins * 60))
    };
    config.upload_max_size = args.upload_max_size;

    tracing::info!(
        store_root = %args.store_root.display(),
        callsign = %args.callsign,
        "starting ground station"
    );

    let radio: Arc<dyn Radio> = Arc::new(LoggingRadio::new(args.callsign.clone()));
    let station = GroundStation::open(&config, radio, SystemEnv)?;
    let _handles = station.run();

    // No signal-handling crate is in the dependency stack: the worker
    // threads run for the lifetime of the process and `Ctrl-C` terminates
    // it directly rather than through `GroundStation::shutdown`.
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}

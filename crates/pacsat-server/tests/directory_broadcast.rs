//! Scenario: directory broadcast over three files ingested seconds apart.

use std::sync::Arc;
use std::time::Duration;

use pacsat_core::env::sim::SimEnv;
use pacsat_core::{Environment, SqliteFileStore};
use pacsat_proto::Pfh;
use pacsat_server::broadcast::BroadcastScheduler;
use pacsat_server::radio::{MockRadio, Sent};
use pacsat_server::Radio;

#[test]
fn directory_broadcast_over_three_files_is_newest_first_and_paced() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteFileStore::open(dir.path()).unwrap();
    let env = SimEnv::new(1, 1_735_689_600);

    for (i, name) in ["FILE0", "FILE1", "FILE2"].iter().enumerate() {
        let fnum = store.reserve_file_number().unwrap();
        let upload_time = 1_735_689_600 + (i as u32) * 2;
        let pfh = Pfh::new(0, name, "TXT", 0, 0, upload_time, upload_time, 0, 0).unwrap();
        store.add_file(fnum, "GS-TEST-0", pfh, b"payload", upload_time).unwrap();
        env.sleep(Duration::from_secs(2));
    }

    let radio = Arc::new(MockRadio::new());
    let timing_env = env.clone();
    let scheduler = BroadcastScheduler::new(
        store,
        radio.clone() as Arc<dyn Radio>,
        env,
        "GS-TEST-0",
        None,
        Duration::from_millis(500),
        256,
        Duration::from_millis(100),
    );

    let before_sweep = timing_env.now();
    let sent = scheduler.broadcast_directory().unwrap();
    let sweep_duration = timing_env.now() - before_sweep;
    assert_eq!(sent, 3);
    // 3 frames means 2 inter-frame gaps, each paced at >= 500ms.
    assert!(
        sweep_duration >= Duration::from_millis(1000),
        "expected at least 1000ms of pacing across 3 frames, got {sweep_duration:?}"
    );

    let frames = radio.sent();
    assert_eq!(frames.len(), 3);

    let names: Vec<String> = frames
        .iter()
        .map(|frame| match frame {
            Sent::Ui(envelope) => {
                assert_eq!(envelope.kind.as_byte(), pacsat_proto::Pid::DIRECTORY_ENTRY);
                let pfh = Pfh::decode(&[envelope.data.as_slice(), b"payload"].concat()).unwrap();
                pfh.trimmed_name().to_string()
            }
            other => panic!("unexpected frame: {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["FILE2", "FILE1", "FILE0"]);
}

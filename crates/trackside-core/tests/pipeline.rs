use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trackside_core::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// One scripted connection attempt
enum Step {
    Fail,
    Lines(&'static str),
}

/// Transport replaying a fixed script, cancelling `done` when it runs out
struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    done: CancellationToken,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>, done: CancellationToken) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            done,
            opens: AtomicUsize::new(0),
        }
    }
}

impl Transport for &ScriptedTransport {
    type Stream = Cursor<Vec<u8>>;

    async fn open(&self) -> io::Result<Cursor<Vec<u8>>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Lines(text)) => Ok(Cursor::new(text.as_bytes().to_vec())),
            Some(Step::Fail) => Err(io::Error::new(io::ErrorKind::NotFound, "unplugged")),
            None => {
                self.done.cancel();
                Err(io::Error::new(io::ErrorKind::Other, "script finished"))
            }
        }
    }

    fn describe(&self) -> String {
        "script".into()
    }
}

fn supervisor(simulation: Duration) -> Supervisor {
    let config = TelemetryConfig {
        simulation: SimulationConfig {
            duration: simulation,
            ..SimulationConfig::default()
        },
        ..TelemetryConfig::default()
    };
    Supervisor::new(&config, Arc::new(SqliteStore::open_in_memory().unwrap()))
}

async fn replay(sup: &Supervisor, steps: Vec<Step>) -> usize {
    let done = CancellationToken::new();
    let transport = ScriptedTransport::new(steps, done.clone());
    SourceReader::new(&transport, sup.pipeline()).run(done).await;
    transport.opens.load(Ordering::SeqCst)
}

fn sample(t: i64, lap: u32) -> Sample {
    Sample {
        timestamp_ms: t,
        lap,
        voltage: Some(48.0),
        current: Some(t as f64),
        amp_hours: None,
        speed: Some(10.0),
        torque: None,
        latitude: None,
        longitude: None,
    }
}

#[test]
fn test_laps_and_series() {
    let store = SqliteStore::open_in_memory().unwrap();
    for (t, lap) in [(10, 1), (20, 1), (40, 2), (30, 3), (35, 2)] {
        store.append(&sample(t, lap)).unwrap();
    }

    let index = store.list_laps().unwrap();
    assert_eq!(index.laps, vec![1, 2, 3]);
    assert_eq!(index.latest, 3);

    let series = store.lap_series(2).unwrap();
    let times: Vec<i64> = series.iter().map(|p| p.timestamp_ms).collect();
    assert_eq!(times, vec![35, 40]);
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.append(&sample(1, 5)).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.list_laps().unwrap().laps, vec![5]);
    assert_eq!(store.sample_count().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_torque_scenario_end_to_end() {
    init_tracing();
    let sup = supervisor(Duration::from_secs(15));
    let mut sub = sup.broadcaster().subscribe();

    replay(&sup, vec![Step::Lines("{\"A\": 50, \"lap\": 3}\n")]).await;

    let received = sub.recv().await.unwrap();
    assert_eq!(received.lap, 3);
    assert!((received.torque.unwrap() - 27.0).abs() < 1e-9);

    let series = sup.store().lap_series(3).unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].torque, received.torque);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_line_does_not_interrupt() {
    let sup = supervisor(Duration::from_secs(15));

    replay(
        &sup,
        vec![Step::Lines(
            "{\"t\": 1, \"lap\": 1}\n<<<noise>>>\n\n{\"t\": 2, \"lap\": 1}\n",
        )],
    )
    .await;

    let times: Vec<i64> = sup
        .store()
        .lap_series(1)
        .unwrap()
        .iter()
        .map(|p| p.timestamp_ms)
        .collect();
    assert_eq!(times, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_reader_reconnects_after_faults() {
    let sup = supervisor(Duration::from_secs(15));

    let opens = replay(
        &sup,
        vec![
            Step::Fail,
            Step::Lines("{\"t\": 1, \"lap\": 2}\n"),
            Step::Fail,
            Step::Fail,
            Step::Lines("{\"t\": 2, \"lap\": 2}"),
        ],
    )
    .await;

    // Five scripted attempts plus the one that ends the script
    assert_eq!(opens, 6);
    assert_eq!(sup.store().lap_series(2).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_live_suppressed_during_simulation() {
    let sup = supervisor(Duration::from_secs(60));

    assert_eq!(sup.start_simulation().await, StartOutcome::Started);
    replay(&sup, vec![Step::Lines("{\"t\": 1, \"lap\": 7}\n")]).await;
    assert!(sup.store().lap_series(7).unwrap().is_empty());
    assert_eq!(sup.store().list_laps().unwrap().laps, vec![1]);

    assert_eq!(sup.stop_simulation().await, StopOutcome::Stopped);
    let mut sub = sup.broadcaster().subscribe();
    // Latest is the final simulated sample
    assert_eq!(sub.recv().await.unwrap().lap, 1);

    replay(&sup, vec![Step::Lines("{\"t\": 2, \"lap\": 8}\n")]).await;
    assert_eq!(sup.store().lap_series(8).unwrap().len(), 1);
    assert_eq!(sub.recv().await.unwrap().lap, 8);
}

#[tokio::test(start_paused = true)]
async fn test_late_observer_sees_latest_first() {
    let sup = supervisor(Duration::from_secs(15));
    replay(&sup, vec![Step::Lines("{\"t\": 5, \"lap\": 1}\n")]).await;

    let mut sub = sup.broadcaster().subscribe();
    replay(&sup, vec![Step::Lines("{\"t\": 6, \"lap\": 1}\n")]).await;

    assert_eq!(sub.recv().await.unwrap().timestamp_ms, 5);
    assert_eq!(sub.recv().await.unwrap().timestamp_ms, 6);
}

#[tokio::test(start_paused = true)]
async fn test_simulation_start_stop_cycle() {
    let sup = supervisor(Duration::from_secs(15));

    assert_eq!(sup.stop_simulation().await, StopOutcome::NotRunning);
    assert_eq!(sup.start_simulation().await, StartOutcome::Started);
    assert_eq!(sup.start_simulation().await, StartOutcome::AlreadyRunning);

    tokio::time::sleep(Duration::from_millis(550)).await;
    assert_eq!(sup.stop_simulation().await, StopOutcome::Stopped);
    let count = sup.store().sample_count().unwrap();

    // Nothing more arrives once stopped
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sup.store().sample_count().unwrap(), count);
    assert!(count >= 5);

    let track = sup.store().lap_positions(1).unwrap();
    assert_eq!(track.len() as u64, count);
}

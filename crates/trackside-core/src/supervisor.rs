//! Ingestion supervisor
//!
//! Owns the mode flag and the simulation task. Live reading is never stopped;
//! it is the fallback whenever no simulation is running, and its output is
//! simply discarded while one is.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::config::TelemetryConfig;
use crate::enrich::Enricher;
use crate::mode::{IngestionMode, ModeFlag};
use crate::pipeline::Pipeline;
use crate::simulation::{SimulationConfig, SimulationGenerator};
use crate::store::SampleStore;

/// How long `stop_simulation` waits for the generator to drain
pub const STOP_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new generator was started
    Started,
    /// A simulation was already running; nothing changed
    AlreadyRunning,
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The running simulation was halted
    Stopped,
    /// No simulation was running
    NotRunning,
}

/// Snapshot of the simulation switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStatus {
    /// Whether simulated data currently owns the pipeline
    pub running: bool,
}

struct SimulationTask {
    stop: CancellationToken,
    handle: JoinHandle<u64>,
}

/// Switches the pipeline between live and simulated input
pub struct Supervisor {
    pipeline: Pipeline,
    simulation_config: SimulationConfig,
    simulation: Mutex<Option<SimulationTask>>,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Build the pipeline for `config` on top of `store`, starting in live mode
    pub fn new(config: &TelemetryConfig, store: Arc<dyn SampleStore>) -> Self {
        let pipeline = Pipeline::new(
            Enricher::new(config.torque),
            store,
            Broadcaster::new(),
            Arc::new(ModeFlag::new(IngestionMode::Live)),
        );
        Self::with_pipeline(pipeline, config.simulation.clone())
    }

    /// Supervise an existing pipeline
    pub fn with_pipeline(pipeline: Pipeline, simulation_config: SimulationConfig) -> Self {
        Self {
            pipeline,
            simulation_config,
            simulation: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Pipeline handle for producers
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline.clone()
    }

    /// Observer fan-out
    pub fn broadcaster(&self) -> &Broadcaster {
        self.pipeline.broadcaster()
    }

    /// Sample store for historical queries
    pub fn store(&self) -> &Arc<dyn SampleStore> {
        self.pipeline.store()
    }

    /// Token cancelled on [`Supervisor::shutdown`]; long-lived tasks watch it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Current mode, read without blocking
    pub fn mode(&self) -> IngestionMode {
        self.pipeline.mode().get()
    }

    /// Whether a simulation owns the pipeline
    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            running: self.mode() == IngestionMode::Simulated,
        }
    }

    /// Hand the pipeline to a fresh simulation run
    pub async fn start_simulation(&self) -> StartOutcome {
        let mut slot = self.simulation.lock().await;

        if self.pipeline.mode().is_simulated() {
            return StartOutcome::AlreadyRunning;
        }

        // Reap the previous run before flipping the flag, so its final
        // hand-back to Live cannot land on top of the new run
        if let Some(previous) = slot.take() {
            previous.stop.cancel();
            if let Err(e) = previous.handle.await {
                tracing::warn!(error = %e, "Previous simulation task failed");
            }
        }

        if !self
            .pipeline
            .mode()
            .transition(IngestionMode::Live, IngestionMode::Simulated)
        {
            return StartOutcome::AlreadyRunning;
        }

        let stop = self.shutdown.child_token();
        let generator = SimulationGenerator::new(self.simulation_config.clone(), self.pipeline());
        let handle = tokio::spawn(generator.run(stop.clone()));
        *slot = Some(SimulationTask { stop, handle });

        tracing::info!("Switched to simulated telemetry");
        StartOutcome::Started
    }

    /// Halt the running simulation and fall back to live input
    pub async fn stop_simulation(&self) -> StopOutcome {
        let mut slot = self.simulation.lock().await;

        if !self
            .pipeline
            .mode()
            .transition(IngestionMode::Simulated, IngestionMode::Live)
        {
            return StopOutcome::NotRunning;
        }

        if let Some(mut task) = slot.take() {
            task.stop.cancel();
            match tokio::time::timeout(STOP_GRACE_PERIOD, &mut task.handle).await {
                Ok(Ok(samples)) => tracing::debug!(samples, "Simulation drained"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Simulation task failed"),
                Err(_) => {
                    // Still finishing a write; the next start reaps it
                    tracing::warn!("Simulation did not drain within grace period");
                    *slot = Some(task);
                }
            }
        }

        tracing::info!("Switched to live telemetry");
        StopOutcome::Stopped
    }

    /// Stop every task spawned by or watching this supervisor
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.stop_simulation().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{PositionPoint, Sample, SeriesPoint};
    use crate::store::{LapIndex, SqliteStore, StoreError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    /// Store whose writes stall, like a disk under heavy load
    struct SlowStore {
        inner: SqliteStore,
        delay: Duration,
        writing: AtomicBool,
    }

    impl SampleStore for SlowStore {
        fn append(&self, sample: &Sample) -> Result<(), StoreError> {
            self.writing.store(true, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.append(sample)
        }
        fn list_laps(&self) -> Result<LapIndex, StoreError> {
            self.inner.list_laps()
        }
        fn lap_series(&self, lap: u32) -> Result<Vec<SeriesPoint>, StoreError> {
            self.inner.lap_series(lap)
        }
        fn lap_positions(&self, lap: u32) -> Result<Vec<PositionPoint>, StoreError> {
            self.inner.lap_positions(lap)
        }
        fn sample_count(&self) -> Result<u64, StoreError> {
            self.inner.sample_count()
        }
    }

    fn supervisor(duration: Duration) -> Supervisor {
        let config = TelemetryConfig {
            simulation: SimulationConfig {
                duration,
                ..SimulationConfig::default()
            },
            ..TelemetryConfig::default()
        };
        Supervisor::new(&config, Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_reports_already_running() {
        let sup = supervisor(Duration::from_secs(15));

        assert_eq!(sup.start_simulation().await, StartOutcome::Started);
        assert_eq!(sup.start_simulation().await, StartOutcome::AlreadyRunning);
        assert!(sup.status().running);

        assert_eq!(sup.stop_simulation().await, StopOutcome::Stopped);
        assert!(!sup.status().running);
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let sup = supervisor(Duration::from_secs(15));
        assert_eq!(sup.stop_simulation().await, StopOutcome::NotRunning);
        assert_eq!(sup.mode(), IngestionMode::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_ends_itself() {
        let sup = supervisor(Duration::from_secs(1));
        sup.start_simulation().await;

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(!sup.status().running);
        assert_eq!(sup.stop_simulation().await, StopOutcome::NotRunning);
        // Roughly one sample per 100 ms tick
        let count = sup.store().sample_count().unwrap();
        assert!((9..=11).contains(&count), "count {count}");
        assert_eq!(sup.store().list_laps().unwrap().laps, vec![1]);

        // And can be started again afterwards
        assert_eq!(sup.start_simulation().await, StartOutcome::Started);
    }

    #[tokio::test]
    async fn test_stop_is_bounded_by_grace_period_during_slow_write() {
        let store = Arc::new(SlowStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            delay: Duration::from_millis(800),
            writing: AtomicBool::new(false),
        });
        let sup = Supervisor::new(&TelemetryConfig::default(), store.clone());

        assert_eq!(sup.start_simulation().await, StartOutcome::Started);
        while !store.writing.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let began = Instant::now();
        assert_eq!(sup.stop_simulation().await, StopOutcome::Stopped);
        let took = began.elapsed();
        assert!(took < Duration::from_millis(600), "stop took {took:?}");
        assert_eq!(sup.mode(), IngestionMode::Live);

        // The old generator is still writing; a restart waits for it, so its
        // hand-back to Live cannot end the new run
        assert_eq!(sup.start_simulation().await, StartOutcome::Started);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sup.status().running);

        sup.shutdown().await;
    }
}

//! Simulation Mode - synthetic telemetry for running without hardware
//!
//! Generates a plausible electric vehicle lap: throttle swells slowly, voltage
//! sags under load, current and speed follow the throttle with a little noise,
//! and the GPS position spirals out from a fixed origin.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::enrich::TorqueModel;
use crate::mode::IngestionMode;
use crate::pipeline::Pipeline;
use crate::sample::{
    RawRecord, KEY_AMP_HOURS, KEY_CURRENT, KEY_LAP, KEY_LATITUDE, KEY_LONGITUDE, KEY_SPEED,
    KEY_TIMESTAMP, KEY_TORQUE, KEY_VOLTAGE,
};

/// GPS origin of the synthetic track
const ORIGIN: (f64, f64) = (40.7128, -74.0060);

/// Simulation schedule
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Time between samples
    pub tick: Duration,
    /// Total run length before the generator stops itself
    pub duration: Duration,
    /// Lap number stamped on every sample
    pub lap: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            duration: Duration::from_secs(15),
            lap: 1,
        }
    }
}

/// Fixed vehicle model with bounded jitter
pub struct SimulationModel {
    torque_model: TorqueModel,
    lap: u32,
    rng: StdRng,
}

impl SimulationModel {
    /// Create a model seeded from system entropy
    pub fn new(torque_model: TorqueModel, lap: u32) -> Self {
        Self::with_rng(torque_model, lap, StdRng::from_entropy())
    }

    /// Create a reproducible model
    pub fn with_seed(torque_model: TorqueModel, lap: u32, seed: u64) -> Self {
        Self::with_rng(torque_model, lap, StdRng::seed_from_u64(seed))
    }

    fn with_rng(torque_model: TorqueModel, lap: u32, rng: StdRng) -> Self {
        Self {
            torque_model,
            lap,
            rng,
        }
    }

    /// Produce the record for `elapsed_ms` into a run that began at `start_ms`
    pub fn record_at(&mut self, start_ms: i64, elapsed_ms: u64) -> RawRecord {
        let t = elapsed_ms as f64 / 1000.0;

        let throttle = 0.5 + 0.4 * (t * 0.5).sin();
        // Pack sags under load
        let voltage = 48.0 - throttle * 2.0;
        let current = throttle * 100.0 + self.rng.gen_range(-2.0..=2.0);
        let speed = throttle * 40.0 + self.rng.gen_range(-1.0..=1.0);
        let amp_hours = (elapsed_ms as f64 / 3_600_000.0) * 50.0;
        let torque = self.torque_model.torque_from_current(current);

        let radius = t * 0.00001;
        let lat = ORIGIN.0 + radius * (t * 0.1).cos();
        let lon = ORIGIN.1 + radius * (t * 0.1).sin();

        RawRecord::new()
            .with(KEY_TIMESTAMP, start_ms + elapsed_ms as i64)
            .with(KEY_LAP, self.lap)
            .with(KEY_VOLTAGE, round_to(voltage, 1))
            .with(KEY_CURRENT, round_to(current, 1))
            .with(KEY_AMP_HOURS, round_to(amp_hours, 2))
            .with(KEY_SPEED, round_to(speed, 1))
            .with(KEY_TORQUE, round_to(torque, 1))
            .with(KEY_LATITUDE, round_to(lat, 6))
            .with(KEY_LONGITUDE, round_to(lon, 6))
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Drives a [`SimulationModel`] into the pipeline on a fixed cadence
pub struct SimulationGenerator {
    config: SimulationConfig,
    model: SimulationModel,
    pipeline: Pipeline,
}

impl SimulationGenerator {
    /// Create a generator feeding `pipeline`
    pub fn new(config: SimulationConfig, pipeline: Pipeline) -> Self {
        let model = SimulationModel::new(*pipeline.enricher().torque_model(), config.lap);
        Self::with_model(config, model, pipeline)
    }

    /// Create a generator with a specific model
    pub fn with_model(config: SimulationConfig, model: SimulationModel, pipeline: Pipeline) -> Self {
        Self {
            config,
            model,
            pipeline,
        }
    }

    /// Run until the configured duration elapses, `stop` is cancelled, or the
    /// mode flag leaves `Simulated`. Always hands the flag back to `Live`.
    ///
    /// Returns the number of samples produced.
    pub async fn run(mut self, stop: CancellationToken) -> u64 {
        let start_ms = chrono::Utc::now().timestamp_millis();
        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval(self.config.tick);
        let mut produced = 0u64;

        tracing::info!(
            duration_ms = self.config.duration.as_millis() as u64,
            lap = self.config.lap,
            "Simulation started"
        );

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if stop.is_cancelled() {
                break;
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.duration {
                break;
            }

            let raw = self.model.record_at(start_ms, elapsed.as_millis() as u64);
            if self.pipeline.offer(IngestionMode::Simulated, &raw).await.is_none() {
                // Mode was switched back underneath us
                break;
            }
            produced += 1;
        }

        self.pipeline
            .mode()
            .transition(IngestionMode::Simulated, IngestionMode::Live);
        tracing::info!(samples = produced, "Simulation finished");
        produced
    }
}

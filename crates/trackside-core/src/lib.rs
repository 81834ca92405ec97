//! # Trackside Core Library
//!
//! Core functionality for the Trackside vehicle telemetry server.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Enrichment of raw telemetry records into canonical samples (torque derivation)
//! - Append-only, lap-indexed sample storage backed by SQLite
//! - Real-time fan-out of samples to any number of observers
//! - A self-reconnecting serial line reader for the live source
//! - A time-bounded simulation generator for running without hardware
//! - The ingestion supervisor switching between live and simulated input
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trackside_core::prelude::*;
//!
//! let config = TelemetryConfig::default();
//! let store = Arc::new(SqliteStore::open(&config.database_path)?);
//! let supervisor = Supervisor::new(&config, store);
//!
//! // Live reader runs for the life of the process
//! let reader = SourceReader::new(SerialTransport::new(&config.transport), supervisor.pipeline());
//! tokio::spawn(reader.run(supervisor.shutdown_token()));
//!
//! // Observers get the latest sample first, then every new one
//! let mut sub = supervisor.broadcaster().subscribe();
//! supervisor.start_simulation().await;
//! while let Some(sample) = sub.recv().await {
//!     println!("lap {} torque {:?}", sample.lap, sample.torque);
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod enrich;
pub mod mode;
pub mod pipeline;
pub mod sample;
pub mod simulation;
pub mod source;
pub mod store;
pub mod supervisor;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::broadcast::{Broadcaster, SubscriberId, Subscription};
    pub use crate::config::{ConfigError, TelemetryConfig, TransportConfig};
    pub use crate::enrich::{Enricher, TorqueModel};
    pub use crate::mode::{IngestionMode, ModeFlag};
    pub use crate::pipeline::Pipeline;
    pub use crate::sample::{PositionPoint, RawRecord, Sample, SeriesPoint};
    pub use crate::simulation::{SimulationConfig, SimulationGenerator};
    pub use crate::source::{SerialTransport, SourceReader, Transport};
    pub use crate::store::{LapIndex, SampleStore, SqliteStore, StoreError};
    pub use crate::supervisor::{SimulationStatus, StartOutcome, StopOutcome, Supervisor};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

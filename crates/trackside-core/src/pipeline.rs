//! Ingestion pipeline
//!
//! Enrich, persist, broadcast. A failed persist is logged and the sample is
//! still broadcast.

use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::enrich::Enricher;
use crate::mode::{IngestionMode, ModeFlag};
use crate::sample::{RawRecord, Sample};
use crate::store::SampleStore;

/// Shared path from producers to storage and observers
#[derive(Clone)]
pub struct Pipeline {
    enricher: Enricher,
    store: Arc<dyn SampleStore>,
    broadcaster: Broadcaster,
    mode: Arc<ModeFlag>,
}

impl Pipeline {
    /// Assemble a pipeline
    pub fn new(
        enricher: Enricher,
        store: Arc<dyn SampleStore>,
        broadcaster: Broadcaster,
        mode: Arc<ModeFlag>,
    ) -> Self {
        Self {
            enricher,
            store,
            broadcaster,
            mode,
        }
    }

    /// The enricher in use
    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// The sample store
    pub fn store(&self) -> &Arc<dyn SampleStore> {
        &self.store
    }

    /// The observer fan-out
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The shared mode flag
    pub fn mode(&self) -> &Arc<ModeFlag> {
        &self.mode
    }

    /// Route a record produced by `producer`.
    ///
    /// The record is discarded unless `producer` is the active mode. Returns
    /// the enriched sample when it was routed.
    pub async fn offer(&self, producer: IngestionMode, raw: &RawRecord) -> Option<Sample> {
        if self.mode.get() != producer {
            tracing::trace!(?producer, "Discarding sample from inactive producer");
            return None;
        }
        Some(self.ingest(raw).await)
    }

    /// Enrich a record, persist it and broadcast it, regardless of mode.
    ///
    /// The append runs on the blocking pool; the caller waits for it, so each
    /// producer's samples are stored and published in order.
    pub async fn ingest(&self, raw: &RawRecord) -> Sample {
        let sample = self.enricher.enrich(raw);

        let store = Arc::clone(&self.store);
        let row = sample.clone();
        match tokio::task::spawn_blocking(move || store.append(&row)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                error = %e,
                lap = sample.lap,
                t_ms = sample.timestamp_ms,
                "Failed to persist sample"
            ),
            Err(e) => tracing::warn!(error = %e, "Persist task failed"),
        }
        self.broadcaster.publish(&sample);

        sample
    }
}

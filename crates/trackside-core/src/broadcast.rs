//! Sample fan-out
//!
//! Delivers every published sample to all current observers and remembers
//! the most recent one so late joiners are never left blank.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::sample::Sample;

/// Samples queued per observer before it is considered stalled
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 256;

/// Identifies one observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An observer's end of the fan-out
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Sample>,
}

impl Subscription {
    /// This observer's id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next sample. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }

    /// Take a queued sample without waiting
    pub fn try_recv(&mut self) -> Option<Sample> {
        self.rx.try_recv().ok()
    }
}

#[derive(Default)]
struct Inner {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Sample>>,
    latest: Option<Sample>,
}

/// Fan-out hub shared by producers and observers
#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<Inner>>,
}

impl Broadcaster {
    /// Create an empty broadcaster
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds no invariants a panicking holder could break
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new observer.
    ///
    /// The latest sample, if any, is queued before registration so it is
    /// always the first thing the observer receives.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = SubscriberId(Uuid::new_v4());

        let mut inner = self.lock();
        if let Some(latest) = &inner.latest {
            // Fresh channel with free capacity, cannot fail
            let _ = tx.try_send(latest.clone());
        }
        inner.subscribers.insert(id, tx);
        drop(inner);

        tracing::debug!(subscriber = %id, "Observer subscribed");
        Subscription { id, rx }
    }

    /// Remove an observer. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.lock().subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "Observer unsubscribed");
        }
    }

    /// Record `sample` as the latest and deliver it to every observer.
    ///
    /// Observers that are closed or have fallen a full queue behind are
    /// dropped; the rest are unaffected. Returns the number delivered to.
    pub fn publish(&self, sample: &Sample) -> usize {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Sample>)> = {
            let mut inner = self.lock();
            inner.latest = Some(sample.clone());
            inner
                .subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut failed = Vec::new();
        for (id, tx) in &snapshot {
            match tx.try_send(sample.clone()) {
                Ok(()) => {}
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, "Observer disconnected");
                    failed.push(*id);
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, "Observer stalled, dropping it");
                    failed.push(*id);
                }
            }
        }

        if !failed.is_empty() {
            let mut inner = self.lock();
            for id in &failed {
                inner.subscribers.remove(id);
            }
        }

        snapshot.len() - failed.len()
    }

    /// Most recently published sample
    pub fn latest(&self) -> Option<Sample> {
        self.lock().latest.clone()
    }

    /// Number of registered observers
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

//! Ingestion mode
//!
//! Process-wide flag deciding which producer may forward samples. Producers
//! check it before routing each sample; transitions are compare-and-swap so
//! racing start/stop/completion can never leave two producers active.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Which producer currently feeds the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionMode {
    /// The hardware source
    Live,
    /// The synthetic generator
    Simulated,
}

impl IngestionMode {
    fn as_u8(self) -> u8 {
        match self {
            IngestionMode::Live => 0,
            IngestionMode::Simulated => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => IngestionMode::Simulated,
            _ => IngestionMode::Live,
        }
    }
}

/// Atomically shared [`IngestionMode`]
#[derive(Debug)]
pub struct ModeFlag {
    mode: AtomicU8,
}

impl Default for ModeFlag {
    fn default() -> Self {
        Self::new(IngestionMode::Live)
    }
}

impl ModeFlag {
    /// Create a flag in the given mode
    pub fn new(mode: IngestionMode) -> Self {
        Self {
            mode: AtomicU8::new(mode.as_u8()),
        }
    }

    /// Current mode
    pub fn get(&self) -> IngestionMode {
        IngestionMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Whether the live source may forward samples
    pub fn is_live(&self) -> bool {
        self.get() == IngestionMode::Live
    }

    /// Whether the simulation may forward samples
    pub fn is_simulated(&self) -> bool {
        self.get() == IngestionMode::Simulated
    }

    /// Switch from `from` to `to`. Returns false if the flag was not in `from`.
    pub fn transition(&self, from: IngestionMode, to: IngestionMode) -> bool {
        self.mode
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_live() {
        let flag = ModeFlag::default();
        assert!(flag.is_live());
        assert!(!flag.is_simulated());
    }

    #[test]
    fn test_transition_requires_expected_mode() {
        let flag = ModeFlag::default();
        assert!(flag.transition(IngestionMode::Live, IngestionMode::Simulated));
        assert!(!flag.transition(IngestionMode::Live, IngestionMode::Simulated));
        assert_eq!(flag.get(), IngestionMode::Simulated);

        assert!(flag.transition(IngestionMode::Simulated, IngestionMode::Live));
        assert!(!flag.transition(IngestionMode::Simulated, IngestionMode::Live));
        assert!(flag.is_live());
    }
}

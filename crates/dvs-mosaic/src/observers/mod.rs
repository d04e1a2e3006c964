//! Hooks for watching a reconstruction while it runs.
//!
//! Observers are notified after every processed batch and once at the end.
//! They only receive shared references, so they cannot change the filter
//! result; typical uses are progress logging, snapshots and statistics.
//!
//! ```
//! use dvs_mosaic::observers::{BatchObserver, BatchObserverVec};
//! use dvs_mosaic::{BatchReport, ReconstructionState};
//!
//! #[derive(Default)]
//! struct UpdateCounter {
//!     updates: usize,
//! }
//!
//! impl BatchObserver for UpdateCounter {
//!     fn on_batch(&mut self, report: &BatchReport<'_>, _state: &ReconstructionState) {
//!         self.updates += report.updated;
//!     }
//! }
//!
//! let mut observers = BatchObserverVec::new();
//! observers.add(UpdateCounter::default());
//! assert_eq!(observers.len(), 1);
//! ```

mod progress;

pub use progress::ProgressObserver;

use crate::gradient_map::ReconstructionState;
use crate::processor::{BatchReport, ProcessingSummary};

/// Receives read-only views of the reconstruction after each batch.
pub trait BatchObserver {
    fn on_batch(&mut self, report: &BatchReport<'_>, state: &ReconstructionState);

    /// Called once when processing stops, whatever the reason.
    fn on_complete(&mut self, _state: &ReconstructionState, _summary: &ProcessingSummary) {}
}

/// Ordered collection of observers notified together.
#[derive(Default)]
pub struct BatchObserverVec {
    observers: Vec<Box<dyn BatchObserver>>,
}

impl BatchObserverVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: impl BatchObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify_batch(&mut self, report: &BatchReport<'_>, state: &ReconstructionState) {
        for observer in &mut self.observers {
            observer.on_batch(report, state);
        }
    }

    pub fn notify_complete(&mut self, state: &ReconstructionState, summary: &ProcessingSummary) {
        for observer in &mut self.observers {
            observer.on_complete(state, summary);
        }
    }
}

impl std::fmt::Debug for BatchObserverVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchObserverVec")
            .field("observers", &self.observers.len())
            .finish()
    }
}

use super::BatchObserver;
use crate::gradient_map::ReconstructionState;
use crate::processor::{BatchReport, ProcessingSummary};
use tracing::info;

/// Logs a progress line every `every` batches and the summary at the end.
#[derive(Debug, Clone)]
pub struct ProgressObserver {
    every: usize,
    events_seen: usize,
    updates: usize,
}

impl ProgressObserver {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            events_seen: 0,
            updates: 0,
        }
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new(50)
    }
}

impl BatchObserver for ProgressObserver {
    fn on_batch(&mut self, report: &BatchReport<'_>, _state: &ReconstructionState) {
        self.events_seen += report.events.len();
        self.updates += report.updated;
        if (report.index + 1) % self.every == 0 {
            info!(
                batch = report.index,
                time = report.representative_time,
                events = self.events_seen,
                updates = self.updates,
                "progress"
            );
        }
    }

    fn on_complete(&mut self, state: &ReconstructionState, summary: &ProcessingSummary) {
        info!(
            batches = summary.batches,
            touched_sensor_pixels = state.event_map.touched_pixels(),
            "{summary}"
        );
    }
}

use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

/// Loading phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Wasm,
    Dependencies,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    /// Percentage in `0..=100`.
    pub progress: u8,
    /// Elapsed milliseconds; only set on the final event of a phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_time: Option<u64>,
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress reporter for one phase.
///
/// Reported values never decrease, and [`PhaseProgress::finish`] always emits
/// `100` together with the elapsed time.
pub struct PhaseProgress {
    phase: ProgressPhase,
    started: Instant,
    last: u8,
    sink: Option<ProgressSink>,
}

impl PhaseProgress {
    pub fn start(phase: ProgressPhase, sink: Option<ProgressSink>) -> Self {
        Self {
            phase,
            started: Instant::now(),
            last: 0,
            sink,
        }
    }

    /// Reports `done / total` as a percentage, rounding halves up.
    pub fn report_ratio(&mut self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let (done, total) = (u128::from(done.min(total)), u128::from(total));
        let pct = (done * 100 + total / 2) / total;
        self.report(u8::try_from(pct).unwrap_or(100));
    }

    pub fn report(&mut self, progress: u8) {
        let progress = progress.min(100).max(self.last);
        self.last = progress;
        self.emit(progress, None);
    }

    /// Emits the terminal event and returns the elapsed milliseconds.
    pub fn finish(mut self) -> u64 {
        let cost = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last = 100;
        self.emit(100, Some(cost));
        cost
    }

    fn emit(&self, progress: u8, cost_time: Option<u64>) {
        if let Some(sink) = &self.sink {
            sink(ProgressEvent {
                phase: self.phase,
                progress,
                cost_time,
            });
        }
    }
}

//! Per-run state shared between the orchestrator and its sampler thread.

use crate::types::{CpuSample, ResourceSample, RunSeries};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type SharedRunState = Arc<RunState>;

/// Readings taken during one sampling tick; `None` for anything that failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReadings {
    pub cpu: Option<CpuSample>,
    pub target: Option<ResourceSample>,
    pub client: Option<ResourceSample>,
}

#[derive(Debug)]
pub struct RunState {
    stop: AtomicBool,
    ticks: AtomicUsize,
    // None once drained; late ticks from an abandoned sampler are dropped.
    series: Mutex<Option<RunSeries>>,
}

impl RunState {
    pub fn new() -> SharedRunState {
        Arc::new(Self {
            stop: AtomicBool::new(false),
            ticks: AtomicUsize::new(0),
            series: Mutex::new(Some(RunSeries::default())),
        })
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Ticks whose readings were accepted.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Appends one tick atomically. Returns false if the run is stopped or
    /// already drained; nothing is appended in that case.
    pub fn record_tick(&self, tick: TickReadings) -> bool {
        if self.stop_requested() {
            return false;
        }
        let mut guard = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(series) = guard.as_mut() else {
            return false;
        };
        if let Some(c) = tick.cpu {
            series.cpu.push(c);
        }
        if let Some(t) = tick.target {
            series.target.push(t);
        }
        if let Some(c) = tick.client {
            series.client.push(c);
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Takes the collected series and closes the run to further appends.
    pub fn drain(&self) -> RunSeries {
        self.request_stop();
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(cpu: f64) -> TickReadings {
        TickReadings {
            cpu: Some(CpuSample {
                tick: 0,
                value_percent: cpu,
            }),
            target: None,
            client: Some(ResourceSample {
                timestamp: 1.0,
                memory_mb: 10.0,
                memory_percent: 1.0,
            }),
        }
    }

    #[test]
    fn drain_closes_the_run() {
        let state = RunState::new();
        assert!(state.record_tick(tick(5.0)));
        assert!(state.record_tick(tick(7.0)));
        let series = state.drain();
        assert_eq!(series.cpu.len(), 2);
        assert_eq!(series.client.len(), 2);
        assert!(series.target.is_empty());

        assert!(!state.record_tick(tick(9.0)));
        assert!(state.drain().cpu.is_empty());
        assert_eq!(state.ticks(), 2);
    }

    #[test]
    fn stop_rejects_new_ticks() {
        let state = RunState::new();
        state.request_stop();
        assert!(!state.record_tick(tick(1.0)));
        assert!(state.drain().cpu.is_empty());
    }
}

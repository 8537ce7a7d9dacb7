//! Reduction of sampled series into summary statistics.

use crate::types::{CpuSample, CpuStats, MemoryStats, ProcessSnapshot, ResourceSample, TimeSeries};

pub(crate) fn peak(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

pub(crate) fn low(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.min(v))))
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl MemoryStats {
    /// `initial`/`final_` are the before/after snapshots; peak and average come
    /// from the series and fall back to `final_` when it is empty. Peak may be
    /// below `initial` or `final_` when the series missed the extremes.
    pub fn reduce(
        initial: &ProcessSnapshot,
        final_: &ProcessSnapshot,
        series: &TimeSeries<ResourceSample>,
    ) -> Self {
        let mb = || series.iter().map(|s| s.memory_mb);
        let pct = || series.iter().map(|s| s.memory_percent);
        Self {
            initial_mb: initial.memory_mb,
            initial_percent: initial.memory_percent,
            final_mb: final_.memory_mb,
            final_percent: final_.memory_percent,
            delta_mb: final_.memory_mb - initial.memory_mb,
            delta_percent: final_.memory_percent - initial.memory_percent,
            peak_mb: peak(mb()).unwrap_or(final_.memory_mb),
            peak_percent: peak(pct()).unwrap_or(final_.memory_percent),
            average_mb: mean(mb()).unwrap_or(final_.memory_mb),
            average_percent: mean(pct()).unwrap_or(final_.memory_percent),
        }
    }
}

impl CpuStats {
    /// `None` for an empty series: there is no snapshot to fall back on.
    pub fn reduce(series: &TimeSeries<CpuSample>) -> Option<Self> {
        let vals = || series.iter().map(|s| s.value_percent);
        Some(Self {
            average_percent: mean(vals())?,
            peak_percent: peak(vals())?,
            min_percent: low(vals())?,
        })
    }
}

/// Items per second, or `None` when the duration is zero, negative or not finite.
pub fn throughput(count: u64, duration_seconds: f64) -> Option<f64> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return None;
    }
    Some(count as f64 / duration_seconds)
}

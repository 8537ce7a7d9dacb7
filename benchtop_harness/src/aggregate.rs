//! Roll-up of repeated runs of the same operation.

use crate::stats::{mean, peak};
use crate::types::{MemoryStats, RunSummary};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessAggregate {
    /// Runs that had stats for this process.
    pub runs: usize,
    pub average_delta_mb: f64,
    pub average_delta_percent: f64,
    pub peak_mb: f64,
    pub peak_percent: f64,
    pub average_mb: f64,
    pub average_percent: f64,
}

impl ProcessAggregate {
    fn from_stats(stats: &[MemoryStats]) -> Option<Self> {
        let field = |f: fn(&MemoryStats) -> f64| stats.iter().map(f);
        Some(Self {
            runs: stats.len(),
            average_delta_mb: mean(field(|s| s.delta_mb))?,
            average_delta_percent: mean(field(|s| s.delta_percent))?,
            peak_mb: peak(field(|s| s.peak_mb))?,
            peak_percent: peak(field(|s| s.peak_percent))?,
            average_mb: mean(field(|s| s.average_mb))?,
            average_percent: mean(field(|s| s.average_percent))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuAggregate {
    pub runs: usize,
    pub average_percent: f64,
    pub peak_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkAggregate {
    pub runs: usize,
    pub total_duration: f64,
    pub average_duration: f64,
    /// Runs per second over the summed durations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_memory: Option<ProcessAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_memory: Option<ProcessAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuAggregate>,
}

impl BenchmarkAggregate {
    /// Blocks a run did not monitor are left out of the per-process averages
    /// instead of being counted as zero.
    pub fn from_summaries(summaries: &[RunSummary]) -> Self {
        let total: f64 = summaries.iter().map(|s| s.duration_seconds).sum();
        let runs = summaries.len();
        let target: Vec<MemoryStats> = summaries.iter().filter_map(|s| s.target_memory).collect();
        let client: Vec<MemoryStats> = summaries.iter().filter_map(|s| s.client_memory).collect();
        let cpu: Vec<_> = summaries.iter().filter_map(|s| s.cpu).collect();

        let cpu = mean(cpu.iter().map(|c| c.average_percent)).and_then(|average_percent| {
            Some(CpuAggregate {
                runs: cpu.len(),
                average_percent,
                peak_percent: peak(cpu.iter().map(|c| c.peak_percent))?,
            })
        });

        Self {
            runs,
            total_duration: total,
            average_duration: if runs == 0 { 0.0 } else { total / runs as f64 },
            throughput: (total > 0.0).then(|| runs as f64 / total),
            target_memory: ProcessAggregate::from_stats(&target),
            client_memory: ProcessAggregate::from_stats(&client),
            cpu,
        }
    }
}

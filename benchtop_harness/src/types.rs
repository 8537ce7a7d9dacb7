//! Samples, per-run series and run summaries.
//! These types are also the serialized shape handed to callers and the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch as f64 (0.0 if the clock is before the epoch).
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: f64,
    pub memory_mb: f64,
    pub memory_percent: f64,
}

/// System-wide CPU reading. CPU readings carry no wall-clock timestamp; `tick`
/// is the sampler tick that took it, so `tick * interval` is its time offset
/// even when other ticks produced no reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub tick: usize,
    pub value_percent: f64,
}

/// Ordering rule applied when a sample is appended after `prev`.
pub trait SeriesSample {
    fn follow(&mut self, _prev: &Self) {}
}

impl SeriesSample for CpuSample {}

impl SeriesSample for ResourceSample {
    /// A timestamp earlier than the previous one (wall clock stepped back) is
    /// clamped so timestamps never decrease within a series.
    fn follow(&mut self, prev: &Self) {
        if self.timestamp < prev.timestamp {
            self.timestamp = prev.timestamp;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub memory_mb: f64,
    pub memory_percent: f64,
}

impl ProcessSnapshot {
    pub fn to_sample(&self, timestamp: f64) -> ResourceSample {
        ResourceSample {
            timestamp,
            memory_mb: self.memory_mb,
            memory_percent: self.memory_percent,
        }
    }
}

/// Append-only sequence of samples for one metric of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T> {
    samples: Vec<T>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<T> TimeSeries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<T: SeriesSample> TimeSeries<T> {
    pub fn push(&mut self, mut sample: T) {
        if let Some(last) = self.samples.last() {
            sample.follow(last);
        }
        self.samples.push(sample);
    }
}

/// All series collected during one run. Created empty per run, never shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSeries {
    pub cpu: TimeSeries<CpuSample>,
    pub target: TimeSeries<ResourceSample>,
    pub client: TimeSeries<ResourceSample>,
}

impl RunSeries {
    pub fn counts(&self) -> SampleCounts {
        SampleCounts {
            cpu: self.cpu.len(),
            target: self.target.len(),
            client: self.client.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub cpu: usize,
    pub target: usize,
    pub client: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoredProcess {
    Target,
    Client,
}

impl fmt::Display for MonitoredProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoredProcess::Target => f.write_str("target"),
            MonitoredProcess::Client => f.write_str("client"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationCategory {
    /// Read-only / idempotent work such as queries.
    Read,
    /// Ingestion, updates and deletes.
    Mutation,
}

/// Tag recorded with every run and ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Ingest,
    Update,
    Delete,
    #[serde(alias = "query")]
    Benchmark,
}

impl Operation {
    pub fn category(self) -> OperationCategory {
        match self {
            Operation::Benchmark => OperationCategory::Read,
            Operation::Ingest | Operation::Update | Operation::Delete => {
                OperationCategory::Mutation
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Ingest => "ingest",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Benchmark => "benchmark",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ingest" => Ok(Operation::Ingest),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "benchmark" | "query" => Ok(Operation::Benchmark),
            other => Err(format!(
                "unknown operation '{other}' (expected ingest, update, delete or benchmark)"
            )),
        }
    }
}

/// Reduced memory statistics for one monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub initial_mb: f64,
    pub initial_percent: f64,
    pub final_mb: f64,
    pub final_percent: f64,
    pub delta_mb: f64,
    pub delta_percent: f64,
    pub peak_mb: f64,
    pub peak_percent: f64,
    pub average_mb: f64,
    pub average_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub average_percent: f64,
    pub peak_percent: f64,
    pub min_percent: f64,
}

/// Non-fatal conditions attached to a run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// The target was not located before, during or after the run.
    TargetProcessNotFound { name: String },
    /// A process was seen but could not be read at both ends of the run.
    ProcessUnavailable {
        process: MonitoredProcess,
        reason: String,
    },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::TargetProcessNotFound { name } => {
                write!(f, "target process '{name}' not found; not monitored")
            }
            RunWarning::ProcessUnavailable { process, reason } => {
                write!(f, "{process} process unavailable: {reason}")
            }
        }
    }
}

/// Outcome of one benchmark run. `None` stat blocks mean "not monitored".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub operation: Operation,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    pub target_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pid: Option<u32>,
    #[serde(
        rename = "target_memory_stats",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_memory: Option<MemoryStats>,
    #[serde(
        rename = "client_memory_stats",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_memory: Option<MemoryStats>,
    #[serde(rename = "cpu_stats", default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuStats>,
    #[serde(default)]
    pub samples: SampleCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RunWarning>,
}

impl RunSummary {
    pub fn target_not_found(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, RunWarning::TargetProcessNotFound { .. }))
    }
}

/// What a benchmark call hands back: the operation's own result, the summary,
/// and the raw series for the log writer.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkOutcome<R> {
    pub result: R,
    #[serde(flatten)]
    pub summary: RunSummary,
    #[serde(skip)]
    pub series: RunSeries,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_series_never_goes_back_in_time() {
        let mut s = TimeSeries::<ResourceSample>::new();
        for ts in [10.0, 12.0, 11.0, 13.0] {
            s.push(ResourceSample {
                timestamp: ts,
                memory_mb: 1.0,
                memory_percent: 0.1,
            });
        }
        let stamps: Vec<f64> = s.iter().map(|x| x.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 12.0, 12.0, 13.0]);
    }

    #[test]
    fn series_element_type_is_inferred_from_push() {
        let mut cpu = TimeSeries::new();
        cpu.push(CpuSample {
            tick: 3,
            value_percent: 40.0,
        });
        cpu.push(CpuSample {
            tick: 1,
            value_percent: 10.0,
        });
        // CPU samples are kept as recorded.
        let ticks: Vec<usize> = cpu.iter().map(|c| c.tick).collect();
        assert_eq!(ticks, vec![3, 1]);
    }

    #[test]
    fn operation_parse_and_category() {
        assert_eq!("query".parse::<Operation>().unwrap(), Operation::Benchmark);
        assert_eq!(" Ingest ".parse::<Operation>().unwrap(), Operation::Ingest);
        assert!("compact".parse::<Operation>().is_err());
        assert_eq!(Operation::Benchmark.category(), OperationCategory::Read);
        assert_eq!(Operation::Delete.category(), OperationCategory::Mutation);

        let op: Operation = serde_json::from_str("\"query\"").unwrap();
        assert_eq!(op, Operation::Benchmark);
        assert_eq!(serde_json::to_string(&Operation::Update).unwrap(), "\"update\"");
    }

    #[test]
    fn absent_stat_blocks_are_omitted_from_json() {
        let summary = RunSummary {
            operation: Operation::Benchmark,
            started_at: Utc::now(),
            duration_seconds: 0.25,
            target_name: "weaviate".into(),
            target_pid: None,
            target_memory: None,
            client_memory: None,
            cpu: None,
            samples: SampleCounts::default(),
            warnings: vec![RunWarning::TargetProcessNotFound {
                name: "weaviate".into(),
            }],
        };
        let v = serde_json::to_value(&summary).unwrap();
        assert!(v.get("target_memory_stats").is_none());
        assert_eq!(v["duration"], 0.25);
        assert_eq!(v["warnings"][0]["kind"], "target_process_not_found");
        assert!(summary.target_not_found());
    }
}

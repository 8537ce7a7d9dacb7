//! Metrics ledger: a JSON array of run summaries, one element per run, kept
//! across restarts for trend analysis.
//!
//! Appends are read-modify-write of the whole file with no locking; callers
//! must not append from two processes at once.

use crate::error::PersistError;
use crate::stats::throughput;
use crate::types::{CpuStats, MemoryStats, Operation, OperationCategory, RunSummary, RunWarning};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    /// Seconds spent in the timed operation.
    #[serde(alias = "duration (s)")]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_affected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_memory_stats: Option<MemoryStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_memory_stats: Option<MemoryStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_stats: Option<CpuStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RunWarning>,
}

/// RFC 3339, or ISO-8601 without an offset (read as local time, as the
/// dashboard that shares this file writes it).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    // A local time skipped by a DST jump has no mapping; fall back to UTC.
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    )
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
}

impl LedgerEntry {
    /// Stamps the entry with the current time. `work` is the number of rows or
    /// records the operation handled, if the caller knows it: ingest runs record
    /// it as processed rows, update/delete runs as records affected.
    pub fn from_summary(summary: &RunSummary, work: Option<u64>) -> Self {
        let (processed_rows, records_affected) = match summary.operation {
            Operation::Ingest => (work, None),
            Operation::Update | Operation::Delete => (None, work),
            Operation::Benchmark => (None, None),
        };
        Self {
            timestamp: Utc::now(),
            operation: summary.operation,
            duration: summary.duration_seconds,
            processed_rows,
            records_affected,
            throughput: work.and_then(|n| throughput(n, summary.duration_seconds)),
            target_memory_stats: summary.target_memory,
            client_memory_stats: summary.client_memory,
            cpu_stats: summary.cpu,
            warnings: summary.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

pub struct MetricsLedger {
    path: PathBuf,
}

impl MetricsLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file reads as an empty ledger. A malformed file is an error so
    /// the next append cannot overwrite history.
    pub fn load(&self) -> Result<Vec<LedgerEntry>, PersistError> {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistError::Ledger {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data).map_err(|source| PersistError::LedgerCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Appends one entry and rewrites the file. Returns the new entry count.
    pub fn append(&self, entry: &LedgerEntry) -> Result<usize, PersistError> {
        let mut entries = self.load()?;
        entries.push(entry.clone());
        self.save(&entries)?;
        debug!(path = %self.path.display(), entries = entries.len(), "ledger updated");
        Ok(entries.len())
    }

    pub fn append_summary(
        &self,
        summary: &RunSummary,
        work: Option<u64>,
    ) -> Result<LedgerEntry, PersistError> {
        let entry = LedgerEntry::from_summary(summary, work);
        self.append(&entry)?;
        Ok(entry)
    }

    /// Throughput over time for mutations, latency over time for benchmarks,
    /// in insertion order.
    pub fn trend(&self, operation: Operation) -> Result<Vec<TrendPoint>, PersistError> {
        let points = self
            .load()?
            .into_iter()
            .filter(|e| e.operation == operation)
            .filter_map(|e| {
                let value = match operation.category() {
                    OperationCategory::Mutation => e.throughput?,
                    OperationCategory::Read => e.duration,
                };
                Some(TrendPoint {
                    timestamp: e.timestamp,
                    value,
                })
            })
            .collect();
        Ok(points)
    }

    fn save(&self, entries: &[LedgerEntry]) -> Result<(), PersistError> {
        let io_err = |source: std::io::Error| PersistError::Ledger {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_vec_pretty(entries)?;
        // Write beside the ledger and rename so a crash never leaves half a file.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

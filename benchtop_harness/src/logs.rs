//! Per-run CSV logs of the raw series. Each run overwrites the previous run's
//! files of the same family; history lives in the ledger.

use crate::config::HarnessConfig;
use crate::error::PersistError;
use crate::types::{CpuSample, OperationCategory, ResourceSample, RunSeries, TimeSeries};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const CPU_HEADER: &str = "time_offset,cpu_percent";
pub const MEMORY_HEADER: &str = "timestamp,memory_mb,memory_percent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub cpu: PathBuf,
    pub target: PathBuf,
    pub client: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// What was written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogReport {
    pub cpu: LogFile,
    pub target: LogFile,
    pub client: LogFile,
}

pub struct LogWriter {
    dir: PathBuf,
    interval: Duration,
}

impl LogWriter {
    /// `interval` is the sampling cadence used to synthesize CPU time offsets.
    pub fn new(dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            interval,
        }
    }

    pub fn from_config(cfg: &HarnessConfig) -> Self {
        Self::new(cfg.log_dir.clone(), cfg.sample_interval)
    }

    /// Read and mutation runs write separate file families.
    pub fn paths(&self, category: OperationCategory) -> LogPaths {
        let prefix = match category {
            OperationCategory::Read => "",
            OperationCategory::Mutation => "mutation_",
        };
        LogPaths {
            cpu: self.dir.join(format!("{prefix}cpu_usage_log.txt")),
            target: self.dir.join(format!("{prefix}target_memory_log.txt")),
            client: self.dir.join(format!("{prefix}client_memory_log.txt")),
        }
    }

    pub fn write_run(
        &self,
        series: &RunSeries,
        category: OperationCategory,
    ) -> Result<LogReport, PersistError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistError::Log {
            path: self.dir.clone(),
            source,
        })?;
        let paths = self.paths(category);
        let cpu = render_cpu_log(&series.cpu, self.interval);
        let target = render_memory_log(&series.target);
        let client = render_memory_log(&series.client);
        let report = LogReport {
            cpu: write_file(&paths.cpu, &cpu, series.cpu.len())?,
            target: write_file(&paths.target, &target, series.target.len())?,
            client: write_file(&paths.client, &client, series.client.len())?,
        };
        info!(
            dir = %self.dir.display(),
            cpu = report.cpu.rows,
            target = report.target.rows,
            client = report.client.rows,
            "run logs saved"
        );
        Ok(report)
    }
}

fn write_file(path: &Path, contents: &str, rows: usize) -> Result<LogFile, PersistError> {
    fs::write(path, contents).map_err(|source| PersistError::Log {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(LogFile {
        path: path.to_path_buf(),
        rows,
    })
}

pub fn render_cpu_log(series: &TimeSeries<CpuSample>, interval: Duration) -> String {
    let step = interval.as_secs_f64();
    let mut out = String::with_capacity(32 + series.len() * 16);
    out.push_str(CPU_HEADER);
    out.push('\n');
    for s in series.iter() {
        let _ = writeln!(out, "{:.3},{:.1}", s.tick as f64 * step, s.value_percent);
    }
    out
}

pub fn render_memory_log(series: &TimeSeries<ResourceSample>) -> String {
    let mut out = String::with_capacity(40 + series.len() * 32);
    out.push_str(MEMORY_HEADER);
    out.push('\n');
    for s in series.iter() {
        let _ = writeln!(
            out,
            "{:.2},{:.2},{:.2}",
            s.timestamp, s.memory_mb, s.memory_percent
        );
    }
    out
}

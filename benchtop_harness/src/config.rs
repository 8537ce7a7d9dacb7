//! Harness settings: defaults plus `BENCHTOP_*` environment overrides.

use crate::types::{Operation, OperationCategory};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TARGET: &str = "weaviate";

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Case-insensitive substring identifying the monitored server process.
    pub target_name: String,
    pub sample_interval: Duration,
    /// Blocking window of each CPU reading; never longer than `sample_interval`.
    pub cpu_window: Duration,
    pub read_settle: Duration,
    pub mutation_settle: Duration,
    pub ingest_settle: Duration,
    pub log_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target_name: DEFAULT_TARGET.to_string(),
            sample_interval: Duration::from_millis(100),
            cpu_window: Duration::from_millis(10),
            read_settle: Duration::from_millis(500),
            mutation_settle: Duration::from_millis(1_000),
            ingest_settle: Duration::from_millis(2_000),
            log_dir: PathBuf::from("."),
            ledger_path: default_ledger_path(),
        }
    }
}

fn ms_var(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    get(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unparsable values keep
    /// their defaults.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let target_name = get("BENCHTOP_TARGET")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(d.target_name);
        let sample_interval = ms_var(&get, "BENCHTOP_SAMPLE_INTERVAL_MS", d.sample_interval);
        let cpu_window = ms_var(&get, "BENCHTOP_CPU_WINDOW_MS", d.cpu_window);
        let cfg = Self {
            target_name,
            sample_interval: sample_interval.max(Duration::from_millis(1)),
            cpu_window,
            read_settle: ms_var(&get, "BENCHTOP_READ_SETTLE_MS", d.read_settle),
            mutation_settle: ms_var(&get, "BENCHTOP_MUTATION_SETTLE_MS", d.mutation_settle),
            ingest_settle: ms_var(&get, "BENCHTOP_INGEST_SETTLE_MS", d.ingest_settle),
            log_dir: get("BENCHTOP_LOG_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.log_dir),
            ledger_path: get("BENCHTOP_LEDGER")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.ledger_path),
        };
        cfg.clamped()
    }

    fn clamped(mut self) -> Self {
        if self.cpu_window > self.sample_interval {
            self.cpu_window = self.sample_interval;
        }
        self
    }

    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_name = name.into();
        self
    }

    pub fn with_sampling(mut self, interval: Duration, cpu_window: Duration) -> Self {
        self.sample_interval = interval.max(Duration::from_millis(1));
        self.cpu_window = cpu_window;
        self.clamped()
    }

    pub fn with_settle(mut self, read: Duration, mutation: Duration, ingest: Duration) -> Self {
        self.read_settle = read;
        self.mutation_settle = mutation;
        self.ingest_settle = ingest;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    pub fn settle_delay(&self, operation: Operation) -> Duration {
        match operation.category() {
            OperationCategory::Read => self.read_settle,
            OperationCategory::Mutation => self.mutation_settle_for(operation),
        }
    }

    // Ingest gets the longest wait: bulk inserts trigger the most deferred work.
    pub(crate) fn mutation_settle_for(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Ingest => self.ingest_settle,
            _ => self.mutation_settle,
        }
    }
}

/// $XDG_DATA_HOME/benchtop/operation_metrics.json, falling back to the platform
/// data dir and finally the working directory.
pub fn default_ledger_path() -> PathBuf {
    let base = if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else {
        dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."))
    };
    base.join("benchtop").join("operation_metrics.json")
}

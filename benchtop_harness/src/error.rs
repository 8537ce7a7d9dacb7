//! Error types for the harness.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reading the process directory or CPU counters.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("process unavailable: {0}")]
    ProcessUnavailable(String),
    #[error("cpu usage unavailable: {0}")]
    CpuUnavailable(String),
}

/// Failures of a benchmark run. No summary is produced when these occur.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The timed operation failed; its error is passed through unchanged.
    #[error(transparent)]
    Operation(anyhow::Error),
    #[error("snapshot task failed: {0}")]
    Snapshot(#[from] tokio::task::JoinError),
    #[error("'{0}' is not a mutating operation")]
    NotAMutation(crate::types::Operation),
}

/// Failures writing run logs or the metrics ledger. These never invalidate a
/// summary that was already computed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write log {}: {source}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to access ledger {}: {source}", .path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ledger {} is malformed: {source}", .path.display())]
    LedgerCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

//! benchtop_harness: times an operation while sampling system CPU and the
//! memory of both the calling process and a named server process.
//!
//! A [`Harness`] brackets the operation with before/after snapshots and a
//! background sampler, reduces what was collected into a [`RunSummary`], and
//! leaves the raw series in the [`BenchmarkOutcome`] for [`LogWriter`].
//! [`MetricsLedger`] keeps summaries across restarts.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logs;
pub mod orchestrator;
pub mod probe;
pub mod sampler;
pub mod state;
pub mod stats;
pub mod types;

pub use aggregate::BenchmarkAggregate;
pub use config::HarnessConfig;
pub use error::{HarnessError, PersistError, ProbeError};
pub use ledger::{LedgerEntry, MetricsLedger, TrendPoint};
pub use logs::{LogReport, LogWriter};
pub use orchestrator::Harness;
pub use probe::{ProcessProbe, SysinfoProbe};
pub use types::{
    BenchmarkOutcome, CpuStats, MemoryStats, Operation, OperationCategory, RunSummary, RunWarning,
};

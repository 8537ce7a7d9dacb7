//! Benchmark orchestrator: brackets an operation with before/after snapshots
//! and a background sampler, then reduces what was collected.
//!
//! Timing of one run:
//! 1. before-snapshots of client and target
//! 2. sampler started, operation awaited, duration measured
//! 3. settling delay with the sampler still running
//! 4. sampler told to stop (not joined), after-snapshots taken, series drained
//!
//! "final" is therefore the snapshot at the end of the settling window, taken
//! after every sample that made it into the series.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, ProbeError};
use crate::probe::{ProcessProbe, SysinfoProbe};
use crate::sampler::{spawn_sampler, SamplerConfig};
use crate::state::RunState;
use crate::types::{
    BenchmarkOutcome, CpuStats, MemoryStats, MonitoredProcess, Operation, OperationCategory,
    ProcessSnapshot, RunSeries, RunSummary, RunWarning,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug)]
pub(crate) struct Snapshots {
    pub client: Result<ProcessSnapshot, ProbeError>,
    pub target: Option<ProcessSnapshot>,
}

/// Runs benchmarks. Every call builds its own run state and series, so one
/// harness can be reused across sequential runs.
pub struct Harness {
    probe: Arc<dyn ProcessProbe>,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_probe(Arc::new(SysinfoProbe::new()), config)
    }

    pub fn with_probe(probe: Arc<dyn ProcessProbe>, config: HarnessConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Read-only operation (query): short settling delay.
    pub async fn benchmark_read<F, Fut, R>(&self, op: F) -> Result<BenchmarkOutcome<R>, HarnessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        self.run(Operation::Benchmark, self.config.read_settle, op)
            .await
    }

    /// Mutating operation (ingest/update/delete): longer settling delay so lagging
    /// reclamation shows up in the final snapshot. The result is still returned.
    /// A read operation is rejected before `op` runs.
    pub async fn benchmark_mutation<F, Fut, R>(
        &self,
        operation: Operation,
        op: F,
    ) -> Result<BenchmarkOutcome<R>, HarnessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        if operation.category() != OperationCategory::Mutation {
            return Err(HarnessError::NotAMutation(operation));
        }
        let settle = self.config.mutation_settle_for(operation);
        self.run(operation, settle, op).await
    }

    /// Picks read or mutation bracketing from the operation's category.
    pub async fn benchmark<F, Fut, R>(
        &self,
        operation: Operation,
        op: F,
    ) -> Result<BenchmarkOutcome<R>, HarnessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        let settle = self.config.settle_delay(operation);
        self.run(operation, settle, op).await
    }

    async fn run<F, Fut, R>(
        &self,
        operation: Operation,
        settle: Duration,
        op: F,
    ) -> Result<BenchmarkOutcome<R>, HarnessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        let started_at = Utc::now();
        let before = self.snapshots().await?;
        if before.target.is_none() {
            warn!(
                target_name = %self.config.target_name,
                "target process not found; make sure it is running"
            );
        }

        let state = RunState::new();
        let sampler = spawn_sampler(
            Arc::clone(&self.probe),
            Arc::clone(&state),
            SamplerConfig::from(&self.config),
        );

        let clock = Instant::now();
        let outcome = op().await;
        let duration = clock.elapsed();

        let result = match outcome {
            Ok(r) => r,
            Err(e) => {
                state.drain();
                drop(sampler);
                return Err(HarnessError::Operation(e));
            }
        };

        tokio::time::sleep(settle).await;
        state.request_stop();
        // Detached: a tick in flight finishes on its own and is discarded by drain.
        drop(sampler);

        let after = self.snapshots().await?;
        let series = state.drain();
        let summary = summarize(
            operation,
            started_at,
            duration,
            &self.config.target_name,
            before,
            after,
            &series,
        );
        info!(
            operation = %operation,
            duration_s = summary.duration_seconds,
            cpu_samples = summary.samples.cpu,
            target_samples = summary.samples.target,
            client_samples = summary.samples.client,
            "benchmark run complete"
        );
        Ok(BenchmarkOutcome {
            result,
            summary,
            series,
        })
    }

    async fn snapshots(&self) -> Result<Snapshots, HarnessError> {
        let probe = Arc::clone(&self.probe);
        let name = self.config.target_name.clone();
        let snaps = tokio::task::spawn_blocking(move || Snapshots {
            client: probe.current_snapshot(),
            target: probe.find_snapshot(&name),
        })
        .await?;
        Ok(snaps)
    }
}

pub(crate) fn summarize(
    operation: Operation,
    started_at: DateTime<Utc>,
    duration: Duration,
    target_name: &str,
    before: Snapshots,
    after: Snapshots,
    series: &RunSeries,
) -> RunSummary {
    let mut warnings = Vec::new();

    let (target_memory, target_pid) = match (&before.target, &after.target) {
        (Some(i), Some(f)) if i.pid == f.pid => {
            (Some(MemoryStats::reduce(i, f, &series.target)), Some(f.pid))
        }
        (None, None) if series.target.is_empty() => {
            warn!(target_name, "target process never found; not monitored");
            warnings.push(RunWarning::TargetProcessNotFound {
                name: target_name.to_string(),
            });
            (None, None)
        }
        (i, f) => {
            let reason = match (i, f) {
                (Some(i), Some(f)) => format!("pid changed from {} to {}", i.pid, f.pid),
                (None, _) => "not found before the run".to_string(),
                (_, None) => "not found after the run".to_string(),
            };
            warn!(target_name, %reason, "target process unavailable; not monitored");
            warnings.push(RunWarning::ProcessUnavailable {
                process: MonitoredProcess::Target,
                reason,
            });
            (None, f.as_ref().or(i.as_ref()).map(|s| s.pid))
        }
    };

    let client_memory = match (before.client, after.client) {
        (Ok(i), Ok(f)) => Some(MemoryStats::reduce(&i, &f, &series.client)),
        (Err(e), _) | (_, Err(e)) => {
            warn!("client process unavailable: {e}");
            warnings.push(RunWarning::ProcessUnavailable {
                process: MonitoredProcess::Client,
                reason: e.to_string(),
            });
            None
        }
    };

    RunSummary {
        operation,
        started_at,
        duration_seconds: duration.as_secs_f64(),
        target_name: target_name.to_string(),
        target_pid,
        target_memory,
        client_memory,
        cpu: CpuStats::reduce(&series.cpu),
        samples: series.counts(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe {
        client: f64,
        target: Option<f64>,
        cpu: f64,
        scans: AtomicUsize,
    }

    impl FixedProbe {
        fn new(target: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                client: 64.0,
                target,
                cpu: 30.0,
                scans: AtomicUsize::new(0),
            })
        }
    }

    impl ProcessProbe for FixedProbe {
        fn current_snapshot(&self) -> Result<ProcessSnapshot, ProbeError> {
            Ok(ProcessSnapshot {
                pid: 1,
                name: "benchtop".into(),
                memory_mb: self.client,
                memory_percent: 0.5,
            })
        }

        fn find_snapshot(&self, _name: &str) -> Option<ProcessSnapshot> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.target.map(|mb| ProcessSnapshot {
                pid: 99,
                name: "weaviate".into(),
                memory_mb: mb,
                memory_percent: 2.0,
            })
        }

        fn system_cpu_percent(&self, window: Duration) -> Result<Option<f64>, ProbeError> {
            std::thread::sleep(window);
            Ok(Some(self.cpu))
        }
    }

    fn fast_config() -> HarnessConfig {
        HarnessConfig::default()
            .with_sampling(Duration::from_millis(20), Duration::from_millis(1))
            .with_settle(
                Duration::from_millis(40),
                Duration::from_millis(60),
                Duration::from_millis(80),
            )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_target_is_omitted_not_zeroed() {
        let harness = Harness::with_probe(FixedProbe::new(None), fast_config());
        let out = harness
            .benchmark_read(|| async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok::<_, anyhow::Error>("rows")
            })
            .await
            .expect("run completes");

        assert_eq!(out.result, "rows");
        let s = &out.summary;
        assert!(s.target_memory.is_none());
        assert!(s.target_pid.is_none());
        assert!(s.target_not_found());
        assert!(s.client_memory.is_some());
        let cpu = s.cpu.expect("cpu sampled");
        assert_eq!(cpu.average_percent, 30.0);
        assert_eq!(s.samples.target, 0);
        assert!(s.samples.cpu > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn read_run_samples_at_the_configured_cadence() {
        let cfg = HarnessConfig::default()
            .with_sampling(Duration::from_millis(100), Duration::from_millis(1))
            .with_settle(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        let harness = Harness::with_probe(FixedProbe::new(Some(500.0)), cfg);
        let out = harness
            .benchmark_read(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok::<_, anyhow::Error>(())
            })
            .await
            .unwrap();
        let s = &out.summary;
        assert!(s.duration_seconds >= 0.3);
        assert!(
            (2..=6).contains(&s.samples.target),
            "unexpected sample count {}",
            s.samples.target
        );
        let t = s.target_memory.expect("target monitored");
        assert_eq!(t.peak_mb, 500.0);
        assert_eq!(t.delta_mb, 0.0);
        assert_eq!(s.target_pid, Some(99));
        assert!(s.warnings.is_empty());
        assert_eq!(out.series.target.len(), s.samples.target);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn operation_failure_propagates_without_summary() {
        let probe = FixedProbe::new(Some(1.0));
        let harness = Harness::with_probe(probe.clone(), fast_config());
        let err = harness
            .benchmark_mutation(Operation::Delete, || async {
                Err::<u64, _>(anyhow::anyhow!("delete rejected by server"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Operation(_)));
        assert_eq!(err.to_string(), "delete rejected by server");

        // The sampler must wind down: scans stop growing.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let seen = probe.scans.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(probe.scans.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn mutation_entry_rejects_read_operations() {
        let probe = FixedProbe::new(Some(1.0));
        let harness = Harness::with_probe(probe.clone(), fast_config());
        let ran = std::sync::atomic::AtomicBool::new(false);
        let err = harness
            .benchmark_mutation(Operation::Benchmark, || async {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::NotAMutation(Operation::Benchmark)));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(probe.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn mutation_keeps_result_and_tag() {
        let harness = Harness::with_probe(FixedProbe::new(Some(120.0)), fast_config());
        let out = harness
            .benchmark_mutation(Operation::Update, || async { Ok::<_, anyhow::Error>(17u64) })
            .await
            .unwrap();
        assert_eq!(out.result, 17);
        assert_eq!(out.summary.operation, Operation::Update);
        let t = out.summary.target_memory.unwrap();
        assert_eq!(t.peak_mb, t.final_mb);
        assert_eq!(t.average_mb, t.final_mb);
        assert_eq!(t.delta_mb, 0.0);
    }

    fn snapshot(pid: u32, mb: f64) -> ProcessSnapshot {
        ProcessSnapshot {
            pid,
            name: "weaviate".into(),
            memory_mb: mb,
            memory_percent: mb / 10.0,
        }
    }

    #[test]
    fn zero_duration_run_with_empty_series_falls_back_to_final() {
        let before = Snapshots {
            client: Ok(snapshot(1, 40.0)),
            target: Some(snapshot(9, 200.0)),
        };
        let after = Snapshots {
            client: Ok(snapshot(1, 40.0)),
            target: Some(snapshot(9, 200.0)),
        };
        let s = summarize(
            Operation::Benchmark,
            Utc::now(),
            Duration::ZERO,
            "weaviate",
            before,
            after,
            &RunSeries::default(),
        );
        assert_eq!(s.duration_seconds, 0.0);
        let t = s.target_memory.unwrap();
        assert_eq!((t.peak_mb, t.average_mb, t.delta_mb), (200.0, 200.0, 0.0));
        assert!(s.cpu.is_none());
    }

    #[test]
    fn target_restart_is_reported_unavailable() {
        let before = Snapshots {
            client: Ok(snapshot(1, 40.0)),
            target: Some(snapshot(9, 200.0)),
        };
        let after = Snapshots {
            client: Err(ProbeError::ProcessUnavailable("denied".into())),
            target: Some(snapshot(10, 20.0)),
        };
        let s = summarize(
            Operation::Update,
            Utc::now(),
            Duration::from_millis(5),
            "weaviate",
            before,
            after,
            &RunSeries::default(),
        );
        assert!(s.target_memory.is_none());
        assert!(s.client_memory.is_none());
        assert!(!s.target_not_found());
        assert_eq!(s.target_pid, Some(10));
        assert!(s.warnings.iter().any(|w| matches!(
            w,
            RunWarning::ProcessUnavailable {
                process: MonitoredProcess::Client,
                ..
            }
        )));
    }
}

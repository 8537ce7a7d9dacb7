//! Process metrics reader using sysinfo.
//! Point-in-time readings of this process, a named target process, and system CPU.

use crate::error::ProbeError;
use crate::types::ProcessSnapshot;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, Process, ProcessRefreshKind, ProcessesToUpdate,
    RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL,
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of resource readings. The sampler thread and the orchestrator share
/// one probe, so implementations must be thread-safe.
pub trait ProcessProbe: Send + Sync {
    /// Resident memory of the calling process.
    fn current_snapshot(&self) -> Result<ProcessSnapshot, ProbeError>;

    /// Lowest-pid process whose name contains `name_substring`, ignoring case.
    /// Scans the whole process table.
    fn find_snapshot(&self, name_substring: &str) -> Option<ProcessSnapshot>;

    /// System-wide CPU utilization since the previous reading (or baseline).
    ///
    /// Blocks for at most `window`. The span covered is never shorter than
    /// `window` nor than the OS counter resolution
    /// ([`MINIMUM_CPU_UPDATE_INTERVAL`]); `Ok(None)` means that span cannot be
    /// reached within `window` yet and there is no new reading this time.
    fn system_cpu_percent(&self, window: Duration) -> Result<Option<f64>, ProbeError>;

    /// Starts a fresh CPU span so the next reading excludes time before this call.
    fn reset_cpu_baseline(&self) {}
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

pub fn percent_of_total(bytes: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(bytes as f64 / total as f64 * 100.0)
}

fn snapshot_of(p: &Process, total_memory: u64) -> Option<ProcessSnapshot> {
    let rss = p.memory();
    Some(ProcessSnapshot {
        pid: p.pid().as_u32(),
        name: p.name().to_string_lossy().into_owned(),
        memory_mb: bytes_to_mb(rss),
        memory_percent: percent_of_total(rss, total_memory)?,
    })
}

/// CPU counters plus the time of the last refresh sysinfo actually applied.
struct CpuMeter {
    sys: System,
    refreshed_at: Instant,
}

impl CpuMeter {
    fn refresh(&mut self) {
        self.sys.refresh_cpu_usage();
        self.refreshed_at = Instant::now();
    }
}

/// How long to wait before a CPU reading, given the time since the last
/// refresh. `None` when the span `max(window, min_span)` is out of reach
/// within `window`.
fn cpu_wait(since: Duration, window: Duration, min_span: Duration) -> Option<Duration> {
    if since + window < min_span {
        return None;
    }
    Some(window.max(min_span).saturating_sub(since))
}

pub struct SysinfoProbe {
    // Separate handles: the CPU reading holds its lock while it waits and must
    // not stall process scans from the foreground.
    procs: Mutex<System>,
    cpu: Mutex<CpuMeter>,
    self_pid: Option<Pid>,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let procs = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        // Construction performs the first effective CPU refresh.
        let cpu = CpuMeter {
            sys: System::new_with_specifics(
                RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
            ),
            refreshed_at: Instant::now(),
        };
        Self {
            procs: Mutex::new(procs),
            cpu: Mutex::new(cpu),
            self_pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl ProcessProbe for SysinfoProbe {
    fn current_snapshot(&self) -> Result<ProcessSnapshot, ProbeError> {
        let pid = self
            .self_pid
            .ok_or_else(|| ProbeError::ProcessUnavailable("current pid unknown".into()))?;
        let mut sys = self.procs.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let total = sys.total_memory();
        let p = sys.process(pid).ok_or_else(|| {
            ProbeError::ProcessUnavailable(format!("pid {} not readable", pid.as_u32()))
        })?;
        snapshot_of(p, total)
            .ok_or_else(|| ProbeError::ProcessUnavailable("total system memory unknown".into()))
    }

    fn find_snapshot(&self, name_substring: &str) -> Option<ProcessSnapshot> {
        let needle = name_substring.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let mut sys = self.procs.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let total = sys.total_memory();
        // Lowest matching pid, so repeated scans agree on the same process.
        sys.processes()
            .values()
            .filter(|p| p.name().to_string_lossy().to_lowercase().contains(&needle))
            .min_by_key(|p| p.pid().as_u32())
            .and_then(|p| snapshot_of(p, total))
    }

    fn system_cpu_percent(&self, window: Duration) -> Result<Option<f64>, ProbeError> {
        let mut meter = self.cpu.lock().unwrap_or_else(PoisonError::into_inner);
        // sysinfo ignores refreshes closer together than its minimum interval,
        // so every refresh here must be at least that far from the previous one.
        let Some(wait) = cpu_wait(
            meter.refreshed_at.elapsed(),
            window,
            MINIMUM_CPU_UPDATE_INTERVAL,
        ) else {
            return Ok(None);
        };
        std::thread::sleep(wait);
        meter.refresh();
        if meter.sys.cpus().is_empty() {
            return Err(ProbeError::CpuUnavailable("no cpus reported".into()));
        }
        let usage = f64::from(meter.sys.global_cpu_usage());
        if !usage.is_finite() {
            return Err(ProbeError::CpuUnavailable(format!("bad reading {usage}")));
        }
        Ok(Some(usage.clamp(0.0, 100.0)))
    }

    fn reset_cpu_baseline(&self) {
        let mut meter = self.cpu.lock().unwrap_or_else(PoisonError::into_inner);
        // A refresh within the minimum interval would be ignored; the existing
        // baseline is recent enough in that case.
        if meter.refreshed_at.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL {
            meter.refresh();
        }
    }
}

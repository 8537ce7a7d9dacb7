//! Background sampler: one tick per interval, appending CPU, client and target
//! readings to the run's series until the run is stopped.

use crate::config::HarnessConfig;
use crate::probe::ProcessProbe;
use crate::state::{RunState, TickReadings};
use crate::types::{unix_now, CpuSample};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub cpu_window: Duration,
    pub target_name: String,
}

impl From<&HarnessConfig> for SamplerConfig {
    fn from(cfg: &HarnessConfig) -> Self {
        Self {
            interval: cfg.sample_interval,
            cpu_window: cfg.cpu_window,
            target_name: cfg.target_name.clone(),
        }
    }
}

/// Runs the sampler on tokio's blocking pool: the CPU reading sleeps for its
/// window and would otherwise stall a runtime worker. The handle may be dropped;
/// the loop exits on its own at the next stop check.
pub fn spawn_sampler(
    probe: Arc<dyn ProcessProbe>,
    state: Arc<RunState>,
    config: SamplerConfig,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || run_sampler(probe.as_ref(), &state, &config))
}

pub(crate) fn run_sampler(probe: &dyn ProcessProbe, state: &RunState, config: &SamplerConfig) {
    debug!(
        interval_ms = config.interval.as_millis() as u64,
        target = %config.target_name,
        "sampler started"
    );
    let mut client_lost = false;
    let mut target_lost = false;
    // The first target pid we see; a different pid later means the server
    // restarted and the series would mix two processes.
    let mut target_pid: Option<u32> = None;
    let mut tick = 0usize;
    probe.reset_cpu_baseline();

    while !state.stop_requested() {
        let tick_start = Instant::now();

        // None when the CPU counters have not moved on enough since the last
        // reading; the next tick picks it up.
        let cpu = match probe.system_cpu_percent(config.cpu_window) {
            Ok(v) => v.map(|value_percent| CpuSample {
                tick,
                value_percent,
            }),
            Err(e) => {
                debug!("cpu reading skipped: {e}");
                None
            }
        };

        let client = if client_lost {
            None
        } else {
            match probe.current_snapshot() {
                Ok(s) => Some(s.to_sample(unix_now())),
                Err(e) => {
                    debug!("client process no longer readable, sampling stopped for it: {e}");
                    client_lost = true;
                    None
                }
            }
        };

        let target = if target_lost {
            None
        } else {
            match (probe.find_snapshot(&config.target_name), target_pid) {
                (Some(s), None) => {
                    target_pid = Some(s.pid);
                    Some(s.to_sample(unix_now()))
                }
                (Some(s), Some(pid)) if s.pid == pid => Some(s.to_sample(unix_now())),
                (found, Some(pid)) => {
                    debug!(
                        pid,
                        now = ?found.map(|s| s.pid),
                        "target process went away, sampling stopped for it"
                    );
                    target_lost = true;
                    None
                }
                (None, None) => None,
            }
        };

        if !state.record_tick(TickReadings {
            cpu,
            target,
            client,
        }) {
            break;
        }
        tick += 1;

        if let Some(rest) = config.interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    debug!(ticks = state.ticks(), "sampler stopped");
}

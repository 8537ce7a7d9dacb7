//! Plain-text rendering of run summaries, aggregates and ledger trends.
//! Missing stat blocks always print as "not monitored", never as zeros.

use benchtop_harness::aggregate::ProcessAggregate;
use benchtop_harness::stats::throughput;
use benchtop_harness::{BenchmarkAggregate, MemoryStats, Operation, RunSummary, TrendPoint};
use std::fmt::Write as _;

const NOT_MONITORED: &str = "not monitored";

fn memory_block(out: &mut String, label: &str, stats: Option<&MemoryStats>) {
    let Some(m) = stats else {
        let _ = writeln!(out, "{label}: {NOT_MONITORED}");
        return;
    };
    let _ = writeln!(out, "{label}:");
    let _ = writeln!(
        out,
        "  initial {:>10.2} MB ({:.2}%)   final {:>10.2} MB ({:.2}%)",
        m.initial_mb, m.initial_percent, m.final_mb, m.final_percent
    );
    let _ = writeln!(
        out,
        "  delta   {:>+10.2} MB ({:+.2}%)",
        m.delta_mb, m.delta_percent
    );
    let _ = writeln!(
        out,
        "  peak    {:>10.2} MB ({:.2}%)   average {:>8.2} MB ({:.2}%)",
        m.peak_mb, m.peak_percent, m.average_mb, m.average_percent
    );
}

/// `count` is the number of rows/records the operation handled, if known.
pub fn render_summary(summary: &RunSummary, count: Option<u64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "operation: {}", summary.operation);
    let _ = writeln!(out, "duration:  {:.3} s", summary.duration_seconds);
    if let Some(n) = count {
        match throughput(n, summary.duration_seconds) {
            Some(t) => {
                let _ = writeln!(out, "throughput: {t:.2} items/s ({n} items)");
            }
            None => {
                let _ = writeln!(out, "throughput: unavailable ({n} items)");
            }
        }
    }

    let target_label = match summary.target_pid {
        Some(pid) => format!("target {} (pid {pid})", summary.target_name),
        None => format!("target {}", summary.target_name),
    };
    memory_block(&mut out, &target_label, summary.target_memory.as_ref());
    memory_block(&mut out, "client", summary.client_memory.as_ref());

    match &summary.cpu {
        Some(c) => {
            let _ = writeln!(
                out,
                "cpu: average {:.1}%  peak {:.1}%  min {:.1}%",
                c.average_percent, c.peak_percent, c.min_percent
            );
        }
        None => {
            let _ = writeln!(out, "cpu: {NOT_MONITORED}");
        }
    }
    let _ = writeln!(
        out,
        "samples: cpu {}, target {}, client {}",
        summary.samples.cpu, summary.samples.target, summary.samples.client
    );
    for w in &summary.warnings {
        let _ = writeln!(out, "warning: {w}");
    }
    out
}

fn aggregate_block(out: &mut String, label: &str, agg: Option<&ProcessAggregate>) {
    match agg {
        Some(a) => {
            let _ = writeln!(
                out,
                "{label} ({} runs): avg delta {:+.2} MB ({:+.2}%)  peak {:.2} MB ({:.2}%)  avg {:.2} MB ({:.2}%)",
                a.runs,
                a.average_delta_mb,
                a.average_delta_percent,
                a.peak_mb,
                a.peak_percent,
                a.average_mb,
                a.average_percent
            );
        }
        None => {
            let _ = writeln!(out, "{label}: {NOT_MONITORED}");
        }
    }
}

pub fn render_aggregate(agg: &BenchmarkAggregate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "runs: {}", agg.runs);
    let _ = writeln!(
        out,
        "total {:.3} s, average {:.3} s per run",
        agg.total_duration, agg.average_duration
    );
    match agg.throughput {
        Some(t) => {
            let _ = writeln!(out, "throughput: {t:.2} runs/s");
        }
        None => {
            let _ = writeln!(out, "throughput: unavailable");
        }
    }
    aggregate_block(&mut out, "target", agg.target_memory.as_ref());
    aggregate_block(&mut out, "client", agg.client_memory.as_ref());
    match &agg.cpu {
        Some(c) => {
            let _ = writeln!(
                out,
                "cpu ({} runs): average {:.1}%  peak {:.1}%",
                c.runs, c.average_percent, c.peak_percent
            );
        }
        None => {
            let _ = writeln!(out, "cpu: {NOT_MONITORED}");
        }
    }
    out
}

pub fn render_trend(operation: Operation, points: &[TrendPoint]) -> String {
    let unit = match operation {
        Operation::Benchmark => "duration_s",
        _ => "throughput",
    };
    let mut out = String::new();
    if points.is_empty() {
        let _ = writeln!(out, "no {operation} entries in the ledger");
        return out;
    }
    let _ = writeln!(out, "timestamp,{unit}");
    for p in points {
        let _ = writeln!(out, "{},{:.3}", p.timestamp.to_rfc3339(), p.value);
    }
    out
}

//! Entry point for the benchtop CLI. Parses args, times the command and
//! persists the run.

use anyhow::Result;
use benchtop::cli::{parse_args, ArgsError, CliArgs};
use benchtop::report::{render_aggregate, render_summary, render_trend};
use benchtop::runner::run_command;
use benchtop_harness::{
    BenchmarkAggregate, Harness, HarnessConfig, LogWriter, MetricsLedger, RunSummary,
};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn config_for(args: &CliArgs) -> HarnessConfig {
    let mut cfg = HarnessConfig::from_env();
    if let Some(t) = &args.target {
        cfg = cfg.with_target(t.clone());
    }
    if let Some(dir) = &args.log_dir {
        cfg = cfg.with_log_dir(dir.clone());
    }
    if let Some(path) = &args.ledger {
        cfg = cfg.with_ledger_path(path.clone());
    }
    cfg
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match parse_args(env::args()) {
        Ok(v) => v,
        Err(ArgsError::Help(text)) => {
            println!("{text}");
            return Ok(());
        }
        Err(ArgsError::Invalid(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    init_tracing();
    let cfg = config_for(&args);

    if let Some(op) = args.history {
        let points = MetricsLedger::new(&cfg.ledger_path).trend(op)?;
        print!("{}", render_trend(op, &points));
        return Ok(());
    }

    let harness = Harness::new(cfg.clone());
    let writer = LogWriter::from_config(&cfg);
    let ledger = (!args.no_ledger).then(|| MetricsLedger::new(&cfg.ledger_path));
    let mut summaries: Vec<RunSummary> = Vec::with_capacity(args.repeat);

    for run in 1..=args.repeat {
        if args.repeat > 1 {
            info!(run, of = args.repeat, "starting run");
        }
        let command = args.command.clone();
        let outcome = harness
            .benchmark(args.op, move || async move { run_command(&command).await })
            .await?;

        // Persistence failures never discard the summary.
        if let Err(e) = writer.write_run(&outcome.series, args.op.category()) {
            warn!("run logs not saved: {e}");
        }
        if let Some(ledger) = &ledger {
            if let Err(e) = ledger.append_summary(&outcome.summary, args.count) {
                warn!("ledger not updated: {e}");
            }
        }
        if !args.json {
            if args.repeat > 1 {
                println!("--- run {run}/{} ---", args.repeat);
            }
            print!("{}", render_summary(&outcome.summary, args.count));
        }
        summaries.push(outcome.summary);
    }

    let aggregate = (summaries.len() > 1).then(|| BenchmarkAggregate::from_summaries(&summaries));
    if args.json {
        let value = match (&aggregate, summaries.as_slice()) {
            (Some(agg), _) => serde_json::json!({ "runs": summaries, "aggregate": agg }),
            (None, [only]) => serde_json::to_value(only)?,
            (None, _) => serde_json::Value::Null,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if let Some(agg) = &aggregate {
        println!("--- aggregate ---");
        print!("{}", render_aggregate(agg));
    }
    Ok(())
}

//! CLI arg parsing tests for benchtop
use std::process::Command;

fn run(args: &[&str]) -> (Option<i32>, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_benchtop"))
        .args(args)
        .output()
        .expect("run benchtop");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status.code(), text)
}

#[test]
fn test_help_mentions_short_and_long_flags() {
    let (code, text) = run(&["--help"]);
    assert_eq!(code, Some(0));
    for flag in ["--op", "-o", "--target", "-T", "--repeat", "-r", "--ledger", "-L"] {
        assert!(text.contains(flag), "help text missing {flag}\n{text}");
    }
}

#[test]
fn test_help_wins_over_other_flags() {
    let (code, text) = run(&["-T", "qdrant", "--op", "ingest", "--help"]);
    assert_eq!(code, Some(0));
    assert!(text.contains("Usage:"));
}

#[test]
fn test_missing_command_is_usage_error() {
    let (code, text) = run(&["--op", "ingest"]);
    assert_eq!(code, Some(2));
    assert!(text.contains("Missing command"), "{text}");
}

#[test]
fn test_bad_operation_is_usage_error() {
    let (code, text) = run(&["--op", "compact", "--", "true"]);
    assert_eq!(code, Some(2));
    assert!(text.contains("unknown operation"), "{text}");
}

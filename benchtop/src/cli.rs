//! Command-line parsing for the benchtop binary.

use benchtop_harness::Operation;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub op: Operation,
    pub target: Option<String>,
    pub repeat: usize,
    /// Rows or records the command processes; enables throughput.
    pub count: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
    pub no_ledger: bool,
    pub json: bool,
    pub history: Option<Operation>,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    /// `--help` was given; carries the usage text.
    Help(String),
    Invalid(String),
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [OPTIONS] -- COMMAND [ARGS...]\n\
         \n\
         Times COMMAND while sampling system CPU and the memory of this process\n\
         and of the target server process.\n\
         \n\
         Options:\n\
         \x20 -o, --op OP          ingest | update | delete | benchmark (default: benchmark)\n\
         \x20 -T, --target NAME    target process name substring (default: $BENCHTOP_TARGET or weaviate)\n\
         \x20 -r, --repeat N       run a benchmark N times and aggregate (default: 1)\n\
         \x20 -n, --count N        rows/records the command processes, for throughput\n\
         \x20 -l, --log-dir DIR    directory for per-run logs (default: $BENCHTOP_LOG_DIR or .)\n\
         \x20 -L, --ledger PATH    metrics ledger file (default: $BENCHTOP_LEDGER or data dir)\n\
         \x20     --no-ledger      do not append to the metrics ledger\n\
         \x20     --json           print the summary as JSON\n\
         \x20     --history OP     print the ledger trend for OP and exit\n\
         \x20 -h, --help           show this help"
    )
}

fn parse_op(flag: &str, v: Option<String>) -> Result<Operation, ArgsError> {
    let v = v.ok_or_else(|| ArgsError::Invalid(format!("{flag} needs a value")))?;
    v.parse().map_err(ArgsError::Invalid)
}

fn parse_num<T: std::str::FromStr>(flag: &str, v: Option<String>) -> Result<T, ArgsError> {
    let v = v.ok_or_else(|| ArgsError::Invalid(format!("{flag} needs a value")))?;
    v.trim()
        .parse()
        .map_err(|_| ArgsError::Invalid(format!("{flag}: '{v}' is not a valid number")))
}

fn required(flag: &str, v: Option<String>) -> Result<String, ArgsError> {
    v.filter(|s| !s.is_empty())
        .ok_or_else(|| ArgsError::Invalid(format!("{flag} needs a value")))
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs, ArgsError> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "benchtop".into());
    let mut out = CliArgs {
        op: Operation::Benchmark,
        target: None,
        repeat: 1,
        count: None,
        log_dir: None,
        ledger: None,
        no_ledger: false,
        json: false,
        history: None,
        command: Vec::new(),
    };

    while let Some(arg) = it.next() {
        // --flag=value is accepted for every flag that takes a value.
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |inline: Option<String>| inline.or_else(|| it.next());
        match flag.as_str() {
            "-h" | "--help" => return Err(ArgsError::Help(usage(&prog))),
            "-o" | "--op" => out.op = parse_op(&flag, value(inline))?,
            "-T" | "--target" => out.target = Some(required(&flag, value(inline))?),
            "-r" | "--repeat" => out.repeat = parse_num(&flag, value(inline))?,
            "-n" | "--count" => out.count = Some(parse_num(&flag, value(inline))?),
            "-l" | "--log-dir" => out.log_dir = Some(required(&flag, value(inline))?.into()),
            "-L" | "--ledger" => out.ledger = Some(required(&flag, value(inline))?.into()),
            "--history" => out.history = Some(parse_op(&flag, value(inline))?),
            "--no-ledger" => out.no_ledger = true,
            "--json" => out.json = true,
            "--" => {
                out.command.extend(it.by_ref());
                break;
            }
            _ if arg.starts_with('-') => {
                return Err(ArgsError::Invalid(format!(
                    "Unknown option '{arg}'. Run {prog} --help for usage."
                )));
            }
            _ => {
                // First bare word starts the command; the rest is passed through.
                out.command.push(arg);
                out.command.extend(it.by_ref());
                break;
            }
        }
    }

    if out.history.is_none() && out.command.is_empty() {
        return Err(ArgsError::Invalid(format!(
            "Missing command. Usage: {prog} [OPTIONS] -- COMMAND [ARGS...]"
        )));
    }
    if out.repeat == 0 {
        return Err(ArgsError::Invalid("--repeat must be at least 1".into()));
    }
    if out.repeat > 1 && out.op != Operation::Benchmark {
        return Err(ArgsError::Invalid(
            "--repeat is only supported with --op benchmark".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, ArgsError> {
        parse_args(
            std::iter::once("benchtop")
                .chain(args.iter().copied())
                .map(String::from),
        )
    }

    #[test]
    fn command_after_double_dash_is_verbatim() {
        let a = parse(&["-o", "ingest", "-n", "500", "--", "curl", "-X", "POST", "--json"]).unwrap();
        assert_eq!(a.op, Operation::Ingest);
        assert_eq!(a.count, Some(500));
        assert_eq!(a.command, vec!["curl", "-X", "POST", "--json"]);
        assert!(!a.json);
    }

    #[test]
    fn long_short_and_inline_forms() {
        let a = parse(&[
            "--target=qdrant",
            "-r",
            "3",
            "--log-dir",
            "/tmp/logs",
            "-L=ignored-because-short",
            "--no-ledger",
            "sleep",
            "1",
        ]);
        // Inline values are only split for long flags.
        assert!(matches!(a, Err(ArgsError::Invalid(_))));

        let a = parse(&[
            "--target=qdrant",
            "-r",
            "3",
            "--log-dir",
            "/tmp/logs",
            "--ledger=/tmp/m.json",
            "--no-ledger",
            "sleep",
            "1",
        ])
        .unwrap();
        assert_eq!(a.target.as_deref(), Some("qdrant"));
        assert_eq!(a.repeat, 3);
        assert_eq!(a.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(a.ledger, Some(PathBuf::from("/tmp/m.json")));
        assert!(a.no_ledger);
        assert_eq!(a.command, vec!["sleep", "1"]);
    }

    #[test]
    fn help_wins() {
        match parse(&["-T", "x", "--help"]) {
            Err(ArgsError::Help(text)) => {
                assert!(text.contains("--target") && text.contains("-T"));
                assert!(text.starts_with("Usage: benchtop"));
            }
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn usage_errors() {
        assert!(matches!(parse(&[]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse(&["--json"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse(&["-o", "compact", "--", "true"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse(&["-r", "0", "--", "true"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse(&["-r", "two", "--", "true"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(
            parse(&["-o", "delete", "-r", "2", "--", "true"]),
            Err(ArgsError::Invalid(_))
        ));
        assert!(matches!(parse(&["--target"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse(&["--bogus", "--", "true"]), Err(ArgsError::Invalid(_))));
    }

    #[test]
    fn history_needs_no_command() {
        let a = parse(&["--history", "query"]).unwrap();
        assert_eq!(a.history, Some(Operation::Benchmark));
        assert!(a.command.is_empty());
    }
}

//! External command as the timed operation.

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Spawns `command` with inherited stdio and waits for it. A non-zero exit is
/// an error so the harness treats the run as failed.
pub async fn run_command(command: &[String]) -> Result<()> {
    let (program, args) = command.split_first().context("empty command")?;
    debug!(%program, ?args, "spawning operation");
    let status = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("failed to run '{program}'"))?;
    if !status.success() {
        match status.code() {
            Some(code) => bail!("'{program}' exited with status {code}"),
            None => bail!("'{program}' was terminated by a signal"),
        }
    }
    Ok(())
}

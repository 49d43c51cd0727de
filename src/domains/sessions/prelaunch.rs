use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

/// Run a group's pre-launch hook with the given positional arguments
/// appended. The command string is split on whitespace; an empty command is
/// a successful no-op. Returns combined stdout+stderr; a non-zero exit turns
/// the output into the error so callers can show the user what the hook
/// printed.
pub async fn run_pre_launch_command(cmd: &str, args: &[&str]) -> Result<String> {
    let mut fields = cmd.split_whitespace();
    let Some(program) = fields.next() else {
        return Ok(String::new());
    };

    let output = Command::new(program)
        .args(fields)
        .args(args)
        .output()
        .await
        .with_context(|| format!("run pre-launch command {program}"))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(anyhow!(
            "pre-launch command exited with {}: {}",
            output.status,
            combined.trim()
        ));
    }
    Ok(combined)
}

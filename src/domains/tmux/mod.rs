pub mod status;

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;

pub const SESSION_PREFIX: &str = "agws_";

pub async fn is_available() -> bool {
    Command::new("tmux")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn inside_tmux() -> bool {
    std::env::var_os("TMUX").is_some()
}

/// `agws_<slug>-<hex-millis>`. The timestamp suffix keeps concurrent creates
/// collision-free without coordinating through the tmux server.
pub fn generate_session_name(title: &str) -> String {
    let mut slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug = slug.trim_matches('-').to_string();
    slug.truncate(20);
    let ts = chrono::Utc::now().timestamp_millis();
    format!("{SESSION_PREFIX}{slug}-{ts:x}")
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub name: String,
    pub command: String,
    pub cwd: String,
    pub env: HashMap<String, String>,
}

pub async fn create_session(opts: CreateOptions) -> Result<()> {
    let cwd = if opts.cwd.is_empty() {
        std::env::var("HOME").unwrap_or_else(|_| "/".to_string())
    } else {
        opts.cwd.clone()
    };

    let mut cmd = Command::new("tmux");
    cmd.args(["new-session", "-d", "-s", &opts.name, "-c", &cwd]);
    for (k, v) in &opts.env {
        cmd.arg("-e").arg(format!("{k}={v}"));
    }

    if !opts.command.is_empty() {
        let mut launch = opts.command.clone();
        // Command substitution needs a real shell; tmux would otherwise hand
        // the string to the default-shell unevaluated.
        if launch.contains("$(") {
            let escaped = launch.replace('\'', r#"'"'"'"#);
            launch = format!("bash -c '{escaped}'");
        }
        cmd.arg(launch);
    }

    let status = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("run tmux new-session")?;
    if !status.success() {
        return Err(anyhow!("create tmux session {}", opts.name));
    }
    Ok(())
}

async fn run_tmux(args: &[&str]) -> Result<()> {
    let status = Command::new("tmux")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .with_context(|| format!("run tmux {}", args.join(" ")))?;
    if !status.success() {
        return Err(anyhow!("tmux {} failed", args.join(" ")));
    }
    Ok(())
}

pub async fn kill_session(name: &str) -> Result<()> {
    run_tmux(&["kill-session", "-t", name]).await
}

/// Send keys followed by Enter (key-binding lookup applies).
pub async fn send_keys(name: &str, keys: &str) -> Result<()> {
    run_tmux(&["send-keys", "-t", name, keys, "Enter"]).await
}

/// Send literal text without Enter; `-l` bypasses key-binding lookup.
pub async fn send_text(name: &str, text: &str) -> Result<()> {
    run_tmux(&["send-keys", "-t", name, "-l", text]).await
}

/// Pipe pane output into a shell command. `-o` opens the pipe only when one
/// is not already open, so repeated calls are safe.
pub async fn pipe_pane(name: &str, command: &str) -> Result<()> {
    run_tmux(&["pipe-pane", "-o", "-t", name, command]).await
}

pub async fn stop_pipe_pane(name: &str) -> Result<()> {
    run_tmux(&["pipe-pane", "-t", name]).await
}

pub async fn resize_pane(name: &str, cols: u16, rows: u16) -> Result<()> {
    run_tmux(&[
        "resize-pane",
        "-t",
        name,
        "-x",
        &cols.to_string(),
        "-y",
        &rows.to_string(),
    ])
    .await
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Negative values address lines above the visible bottom of the pane.
    pub start_line: i64,
    pub end_line: i64,
    /// Reflow lines the terminal wrapped.
    pub join: bool,
    /// Preserve ANSI escape sequences in the captured text.
    pub escape_seq: bool,
}

pub async fn capture_pane(name: &str, opts: CaptureOptions) -> Result<String> {
    let start = opts.start_line.to_string();
    let end = opts.end_line.to_string();
    let mut args = vec!["capture-pane", "-t", name, "-p", "-S", &start];
    if opts.end_line != 0 {
        args.push("-E");
        args.push(&end);
    }
    if opts.join {
        args.push("-J");
    }
    if opts.escape_seq {
        args.push("-e");
    }
    let output = Command::new("tmux")
        .args(&args)
        .output()
        .await
        .context("run tmux capture-pane")?;
    if !output.status.success() {
        return Err(anyhow!(
            "capture pane {name}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    /// Unix seconds of the most recent activity in any of the session's
    /// windows.
    pub activity: i64,
}

/// Live tmux sessions. A stopped tmux server is not an error; it simply
/// means there are no sessions.
pub async fn list_sessions() -> Vec<SessionInfo> {
    let output = match Command::new("tmux")
        .args([
            "list-windows",
            "-a",
            "-F",
            "#{session_name}\t#{window_activity}",
        ])
        .output()
        .await
    {
        Ok(out) if out.status.success() => out,
        _ => return Vec::new(),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut seen: HashMap<String, i64> = HashMap::new();
    for line in stdout.lines() {
        let Some((name, activity)) = line.split_once('\t') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let ts: i64 = activity.trim().parse().unwrap_or(0);
        let entry = seen.entry(name.to_string()).or_insert(ts);
        if ts > *entry {
            *entry = ts;
        }
    }
    seen.into_iter()
        .map(|(name, activity)| SessionInfo { name, activity })
        .collect()
}

pub fn session_exists(name: &str, sessions: &[SessionInfo]) -> bool {
    sessions.iter().any(|s| s.name == name)
}

pub fn is_session_active(name: &str, sessions: &[SessionInfo], threshold_secs: i64) -> bool {
    sessions
        .iter()
        .find(|s| s.name == name)
        .map(|s| chrono::Utc::now().timestamp() - s.activity < threshold_secs)
        .unwrap_or(false)
}

/// Resolve the pane's controlling terminal device, e.g. `ttys003` or
/// `pts/1`. Used by the pane-blocked probe and the web terminal proxy.
pub async fn pane_tty(name: &str) -> Result<String> {
    let output = Command::new("tmux")
        .args(["display-message", "-p", "-t", name, "#{pane_tty}"])
        .output()
        .await
        .context("run tmux display-message")?;
    if !output.status.success() {
        return Err(anyhow!("resolve pane tty for {name}"));
    }
    let tty = String::from_utf8_lossy(&output.stdout)
        .trim()
        .trim_start_matches("/dev/")
        .to_string();
    if tty.is_empty() {
        return Err(anyhow!("empty pane tty for {name}"));
    }
    Ok(tty)
}

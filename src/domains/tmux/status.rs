use crate::domains::sessions::entity::Tool;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]|\x1b\][^\x07]*\x07").unwrap());

pub fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

/// What the pane text says about the tool running inside it. `is_waiting`
/// and `is_busy` are independent signals, not complements: an agent between
/// autonomous steps is neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolStatus {
    pub is_waiting: bool,
    pub is_busy: bool,
    pub has_error: bool,
}

const SPINNER_CHARS: [char; 14] = [
    '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏', '✳', '✽', '✶', '✢',
];

static CLAUDE_BUSY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)ctrl\+c to interrupt").unwrap(),
        Regex::new(r"….*tokens").unwrap(),
    ]
});

static CLAUDE_EXITED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)resume this session with:").unwrap(),
        Regex::new(r"(?i)claude --resume").unwrap(),
    ]
});

// The permission dialog must take priority over busy/spinner detection: a
// spinner from a concurrently running bash tool can be painted on screen at
// the same time as the dialog.
static CLAUDE_PERMISSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)do you want to proceed").unwrap(),
        Regex::new(r"(?i)tab to amend").unwrap(),
    ]
});

static GENERIC_WAITING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\? \(y/n\)").unwrap(),
        Regex::new(r"(?i)\[Y/n\]").unwrap(),
        Regex::new(r"(?i)press enter to continue").unwrap(),
        Regex::new(r"(?i)do you want to").unwrap(),
    ]
});

static ERROR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)error:").unwrap(),
        Regex::new(r"(?i)failed:").unwrap(),
        Regex::new(r"(?i)exception:").unwrap(),
        Regex::new(r"(?i)traceback").unwrap(),
        Regex::new(r"(?i)panic:").unwrap(),
    ]
});

fn has_spinner(text: &str) -> bool {
    text.chars().any(|c| SPINNER_CHARS.contains(&c))
}

fn match_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

fn last_lines(text: &str, n: usize) -> String {
    let stripped = strip_ansi(text);
    let mut lines: Vec<&str> = stripped.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.len() > n {
        lines.drain(..lines.len() - n);
    }
    lines.join("\n")
}

/// Classify captured pane text for the given tool. Pure text analysis; the
/// monitor combines the result with the pane-blocked and activity signals.
pub fn parse_tool_status(output: &str, tool: Tool) -> ToolStatus {
    let last30 = last_lines(output, 30);
    let last10 = last_lines(output, 10);

    let mut status = ToolStatus::default();
    if tool == Tool::Claude {
        if match_any(&CLAUDE_EXITED_PATTERNS, &last30) {
            return status;
        }
        if match_any(&CLAUDE_PERMISSION_PATTERNS, &last30) {
            status.is_waiting = true;
            return status;
        }
        status.is_busy = match_any(&CLAUDE_BUSY_PATTERNS, &last30) || has_spinner(&last10);
        // is_waiting is deliberately NOT !is_busy. In the gap between an
        // agent's tool call finishing and its next thinking phase, the pane
        // shows a bare prompt but the process is about to act on its own.
        // Text alone cannot tell that apart from waiting on the user; the
        // ttyin probe in is_pane_waiting_for_input carries that signal.
    } else {
        status.is_waiting = match_any(&GENERIC_WAITING_PATTERNS, &last30);
    }
    status.has_error = match_any(&ERROR_PATTERNS, &last30);
    status
}

/// OS-level "is the foreground process blocked reading its tty" probe.
/// A process whose stat flags mark it as the foreground process group (`+`)
/// and whose kernel wait channel is `ttyin` is waiting for keyboard input,
/// whatever the pane text looks like. Platforms that do not expose a ttyin
/// wait channel report false and the text patterns stand alone.
pub async fn is_pane_waiting_for_input(session_name: &str) -> bool {
    match pane_blocked_on_tty(session_name).await {
        Ok(blocked) => blocked,
        Err(e) => {
            log::debug!("pane-blocked probe failed for {session_name}: {e}");
            false
        }
    }
}

async fn pane_blocked_on_tty(session_name: &str) -> Result<bool> {
    let tty = super::pane_tty(session_name).await?;
    let output = Command::new("ps")
        .args(["-t", &tty, "-o", "stat=,wchan="])
        .stderr(Stdio::null())
        .output()
        .await
        .context("run ps")?;
    if !output.status.success() {
        return Ok(false);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        let mut fields = line.split_whitespace();
        let (Some(stat), Some(wchan)) = (fields.next(), fields.next()) else {
            continue;
        };
        if stat.contains('+') && wchan == "ttyin" {
            return Ok(true);
        }
    }
    Ok(false)
}

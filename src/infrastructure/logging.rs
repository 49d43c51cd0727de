use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "agent-workspace-";
const KEEP_DAYS: usize = 7;

/// Set up file logging under `log_dir`. Each process run appends to the
/// current day's `agent-workspace-YYYY-MM-DD.log`; files beyond the newest
/// seven are pruned at startup. `log` macro records from the library are
/// routed into the same subscriber. The returned guard must stay alive for
/// the life of the process or buffered lines are lost.
pub fn init(log_dir: &Path, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log directory {}", log_dir.display()))?;
    prune_old_logs(log_dir, KEEP_DAYS);

    let file_name = format!("{LOG_FILE_PREFIX}{}.log", Local::now().format("%Y-%m-%d"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(&file_name))
        .with_context(|| format!("open log file {file_name}"))?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))?;
    Ok(guard)
}

fn prune_old_logs(log_dir: &Path, keep: usize) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };
    let mut logs: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX) && n.ends_with(".log"))
        })
        .collect();
    if logs.len() <= keep {
        return;
    }
    // Date-stamped names sort chronologically.
    logs.sort();
    for old in &logs[..logs.len() - keep] {
        if let Err(e) = std::fs::remove_file(old) {
            log::warn!("prune log {}: {e}", old.display());
        }
    }
}

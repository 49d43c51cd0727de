use agent_workspace::config::{self, Config};
use agent_workspace::domains::monitor::Monitor;
use agent_workspace::domains::syncer::Syncer;
use agent_workspace::domains::tmux;
use agent_workspace::infrastructure::database::{initialize_schema, Database};
use agent_workspace::infrastructure::events::Broadcaster;
use agent_workspace::infrastructure::logging;
use agent_workspace::infrastructure::notify::Notifier;
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "agent-workspace",
    version,
    about = "Supervises coding-agent sessions running in tmux and git worktrees"
)]
struct Cli {
    /// Config file (default: ~/.agent-workspace/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// State database (default: ~/.agent-workspace/state.db)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::default_path);
    let cfg = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("agent-workspace: {e:#}");
            process::exit(1);
        }
    };

    let _log_guard = match logging::init(&cfg.log_dir, &cfg.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("agent-workspace: {e:#}");
            process::exit(1);
        }
    };

    if !tmux::is_available().await {
        eprintln!("agent-workspace: tmux is not installed or not on PATH");
        process::exit(1);
    }

    let db_path = cli.db.unwrap_or_else(config::db_path);
    let db = match open_store(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("agent-workspace: {e:#}");
            process::exit(1);
        }
    };

    let broadcaster = Broadcaster::new();
    let notifier = Notifier::new(cfg.notifications.clone());

    let monitor = Monitor::new(db.clone(), notifier, Some(broadcaster.clone())).start();
    let syncer = Syncer::new(db.clone(), cfg.repos_dir.clone()).start();
    log::info!("agent-workspace started (db: {})", db_path.display());

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("wait for shutdown signal: {e}");
    }

    // Stop order matters: the monitor writes status, the syncer only flags.
    // tmux sessions are deliberately left running; they are the user's work
    // and survive restarts of this process.
    log::info!("shutting down");
    monitor.stop().await;
    syncer.stop().await;
}

fn open_store(path: &std::path::Path) -> anyhow::Result<Database> {
    let db = Database::open(path)?;
    initialize_schema(&db)?;
    Ok(db)
}

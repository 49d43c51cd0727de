use crate::domains::git;
use crate::domains::sessions::db_groups::GroupMethods;
use crate::domains::sessions::db_sessions::SessionMethods;
use crate::infrastructure::database::{Database, MetadataMethods};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(120);

type FetchFn = Box<dyn Fn(&Path) -> Result<()> + Send + Sync>;

/// Background fetcher keeping each group's bare repository current, so new
/// worktrees start from a fresh upstream tip. Fetch failures are routine
/// (laptop offline, remote down); the next tick retries.
pub struct Syncer {
    db: Database,
    repos_dir: PathBuf,
    interval: Duration,
    fetch: FetchFn,
}

pub struct SyncerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SyncerHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.join.await;
    }
}

impl Syncer {
    pub fn new(db: Database, repos_dir: PathBuf) -> Self {
        Self {
            db,
            repos_dir,
            interval: DEFAULT_INTERVAL,
            fetch: Box::new(|repo_dir| git::fetch_bare(repo_dir)),
        }
    }

    /// Swap the fetch implementation. Used in tests.
    pub fn with_fetch(mut self, fetch: FetchFn) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn start(self) -> SyncerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let syncer = Arc::new(self);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(syncer.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first interval tick fires immediately; skip it so startup
            // is not dominated by fetches.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let syncer = Arc::clone(&syncer);
                        let _ = tokio::task::spawn_blocking(move || syncer.run_once()).await;
                    }
                }
            }
        });
        SyncerHandle { stop_tx, join }
    }

    /// One synchronous sync pass. Public for deterministic tests.
    pub fn run_once(&self) {
        let groups = match self.db.list_groups() {
            Ok(groups) => groups,
            Err(e) => {
                log::warn!("syncer: load groups: {e}");
                return;
            }
        };

        for group in groups {
            if group.repo_url.is_empty() {
                continue;
            }
            let location = match git::parse_repo_url(&group.repo_url) {
                Ok(location) => location,
                Err(e) => {
                    log::warn!("syncer: group {}: {e}", group.path);
                    continue;
                }
            };
            let bare = git::bare_repo_path(&self.repos_dir, &location);
            if !bare.exists() {
                continue;
            }
            if let Err(e) = (self.fetch)(&bare) {
                log::warn!("syncer: fetch {}: {e}", bare.display());
                continue;
            }
            self.refresh_dirty_flags(&group.path);
        }
    }

    // After a fetch the per-session dirty flags are what observers use to
    // spot worktrees that would block a clean branch switch.
    fn refresh_dirty_flags(&self, group_path: &str) {
        let sessions = match self.db.list_sessions_by_group(group_path) {
            Ok(sessions) => sessions,
            Err(e) => {
                log::warn!("syncer: load sessions for {group_path}: {e}");
                return;
            }
        };
        let mut changed = false;
        for session in sessions {
            let Some(wt) = &session.worktree else {
                continue;
            };
            if !wt.path.exists() {
                continue;
            }
            match git::is_worktree_dirty(&wt.path) {
                Ok(dirty) if dirty != session.has_uncommitted => {
                    if let Err(e) = self.db.set_session_dirty(&session.id, dirty) {
                        log::warn!("syncer: update dirty flag for {}: {e}", session.title);
                    } else {
                        changed = true;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("syncer: dirty check {}: {e}", wt.path.display());
                }
            }
        }
        if changed {
            let _ = self.db.touch();
        }
    }
}

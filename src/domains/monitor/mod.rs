use crate::domains::sessions::db_events::SessionEventMethods;
use crate::domains::sessions::db_sessions::SessionMethods;
use crate::domains::sessions::entity::{Session, SessionStatus};
use crate::domains::tmux;
use crate::domains::tmux::status::ToolStatus;
use crate::infrastructure::database::{Database, MetadataMethods};
use crate::infrastructure::events::{Broadcaster, Event};
use crate::infrastructure::notify::Notifier;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// A pane is "active" when tmux saw output within this many seconds.
const ACTIVITY_THRESHOLD_SECS: i64 = 2;

/// Lines captured per pane and fed to the classifier.
const CAPTURE_LINES: i64 = 100;

/// Periodic supervisor that reconciles each session's stored status with
/// what its tmux pane is actually doing. The monitor is the only status
/// writer, so per-session transitions are totally ordered.
pub struct Monitor {
    db: Database,
    notifier: Notifier,
    broadcaster: Option<Broadcaster>,
    interval: Duration,
    prev_status: HashMap<String, SessionStatus>,
    pending_status: HashMap<String, SessionStatus>,
}

pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.join.await;
    }
}

impl Monitor {
    pub fn new(db: Database, notifier: Notifier, broadcaster: Option<Broadcaster>) -> Self {
        Self {
            db,
            notifier,
            broadcaster,
            interval: DEFAULT_INTERVAL,
            prev_status: HashMap::new(),
            pending_status: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn start(mut self) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => self.run_once().await,
                }
            }
        });
        MonitorHandle { stop_tx, join }
    }

    /// One supervision tick. Public so tests can drive the monitor without
    /// timers.
    pub async fn run_once(&mut self) {
        let sessions = match self.db.list_sessions() {
            Ok(sessions) if !sessions.is_empty() => sessions,
            _ => return,
        };
        let live = tmux::list_sessions().await;

        let mut changed = false;
        for session in &sessions {
            // Creating/deleting sessions have no tmux session to inspect yet.
            if matches!(
                session.status,
                SessionStatus::Creating | SessionStatus::Deleting
            ) || session.tmux_session.is_empty()
            {
                continue;
            }

            if !tmux::session_exists(&session.tmux_session, &live) {
                if session.status != SessionStatus::Stopped {
                    if self.commit(session, SessionStatus::Stopped).await {
                        changed = true;
                    }
                }
                self.pending_status.remove(&session.id);
                continue;
            }

            let output = match tmux::capture_pane(
                &session.tmux_session,
                tmux::CaptureOptions {
                    start_line: -CAPTURE_LINES,
                    join: true,
                    ..Default::default()
                },
            )
            .await
            {
                Ok(output) => output,
                Err(e) => {
                    // One broken pane must not stall supervision of the rest.
                    log::debug!("capture failed for {}: {e}", session.tmux_session);
                    continue;
                }
            };

            let tool_status = tmux::status::parse_tool_status(&output, session.tool);
            let active =
                tmux::is_session_active(&session.tmux_session, &live, ACTIVITY_THRESHOLD_SECS);
            let blocked = tmux::status::is_pane_waiting_for_input(&session.tmux_session).await;
            let new_status = derive_status(tool_status, active, blocked);

            if self.observe(session, new_status).await {
                changed = true;
            }
        }

        if changed {
            let _ = self.db.touch();
        }
    }

    /// Hysteresis: a transition commits only when two consecutive ticks
    /// derive the same new status. Terminal text churns fast while an agent
    /// works; without the debounce the claude inter-step gap flickers
    /// between idle and running and every flicker would notify.
    async fn observe(&mut self, session: &Session, new_status: SessionStatus) -> bool {
        if new_status == session.status {
            self.pending_status.remove(&session.id);
            self.prev_status.insert(session.id.clone(), session.status);
            return false;
        }

        if self.pending_status.get(&session.id) == Some(&new_status) {
            self.pending_status.remove(&session.id);
            return self.commit(session, new_status).await;
        }

        self.pending_status.insert(session.id.clone(), new_status);
        false
    }

    async fn commit(&mut self, session: &Session, new_status: SessionStatus) -> bool {
        let prev = self
            .prev_status
            .get(&session.id)
            .copied()
            .unwrap_or(session.status);

        if let Err(e) = self.db.write_status(&session.id, new_status) {
            log::warn!("failed to persist status for {}: {e}", session.title);
            return false;
        }
        log::debug!(
            "status changed: session={} from={} to={}",
            session.title,
            session.status.as_str(),
            new_status.as_str()
        );

        let detail = serde_json::json!({
            "from": session.status.as_str(),
            "to": new_status.as_str(),
        });
        let _ = self
            .db
            .insert_session_event(&session.id, "status_changed", &detail.to_string());

        if let Some(b) = &self.broadcaster {
            b.broadcast(Event::status_changed(&session.id, new_status, &session.title));
        }

        if new_status == SessionStatus::Waiting && prev != SessionStatus::Waiting {
            let mut waiting = session.clone();
            waiting.status = new_status;
            self.notifier.notify(&waiting).await;
        }

        self.prev_status.insert(session.id.clone(), new_status);
        true
    }
}

/// Combine the text classifier with the two out-of-band signals. Waiting
/// wins over everything: a blocked tty read is definitive no matter what the
/// screen shows.
pub fn derive_status(tool_status: ToolStatus, active: bool, blocked: bool) -> SessionStatus {
    if tool_status.is_waiting || blocked {
        SessionStatus::Waiting
    } else if tool_status.is_busy || active {
        SessionStatus::Running
    } else if tool_status.has_error {
        SessionStatus::Error
    } else {
        SessionStatus::Idle
    }
}

use crate::domains::git;
use crate::domains::sessions::db_events::SessionEventMethods;
use crate::domains::sessions::db_groups::GroupMethods;
use crate::domains::sessions::db_sessions::{SessionField, SessionMethods};
use crate::domains::sessions::entity::{
    Group, Session, SessionStatus, Tool, Worktree, DEFAULT_GROUP,
};
use crate::domains::sessions::naming::generate_title;
use crate::domains::sessions::prelaunch::run_pre_launch_command;
use crate::domains::tmux;
use crate::infrastructure::database::{Database, MetadataMethods};
use crate::infrastructure::events::{Broadcaster, Event};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Decisions the lifecycle occasionally needs from whoever drives it. The
/// defaults decline everything, which is the right behavior for headless
/// operation: never reuse a directory or discard work without a human.
pub trait SessionPrompts: Send + Sync {
    fn confirm_reuse_worktree(&self, branch: &str) -> bool {
        let _ = branch;
        false
    }
    fn confirm_force_delete(&self, error: &str) -> bool {
        let _ = error;
        false
    }
    fn report_error(&self, message: &str) {
        log::error!("{message}");
    }
}

pub struct HeadlessPrompts;

impl SessionPrompts for HeadlessPrompts {}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub title: String,
    pub project_path: PathBuf,
    pub group_path: String,
    pub tool: Tool,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub title: String,
    pub tool: Tool,
    pub command: String,
    pub project_path: PathBuf,
    pub group_path: String,
}

/// Session lifecycle orchestrator: owns tmux sessions and worktree
/// directories, persists every transition through the store, and never
/// notifies the monitor directly (status flows store → monitor → observers).
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    repos_dir: PathBuf,
    worktrees_dir: PathBuf,
    default_base_branch: String,
    broadcaster: Option<Broadcaster>,
}

impl SessionManager {
    pub fn new(
        db: Database,
        repos_dir: PathBuf,
        worktrees_dir: PathBuf,
        default_base_branch: String,
        broadcaster: Option<Broadcaster>,
    ) -> Self {
        Self {
            db,
            repos_dir,
            worktrees_dir,
            default_base_branch,
            broadcaster,
        }
    }

    fn broadcast(&self, event: Event) {
        if let Some(b) = &self.broadcaster {
            b.broadcast(event);
        }
    }

    fn group(&self, path: &str) -> Result<Option<Group>> {
        Ok(self.db.list_groups()?.into_iter().find(|g| g.path == path))
    }

    /// Create a session. Groups bound to a repo URL get a worktree-backed
    /// session built off the caller's thread; everything else launches
    /// directly in the given project path. Returns the row as initially
    /// inserted (status `creating` on the worktree path).
    pub async fn create(
        &self,
        opts: CreateOptions,
        prompts: Arc<dyn SessionPrompts>,
    ) -> Result<Session> {
        let group_path = if opts.group_path.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            opts.group_path.clone()
        };
        let group = self.group(&group_path)?;
        match group {
            Some(ref g) if !g.repo_url.is_empty() => {
                self.create_in_worktree(opts, g.clone(), prompts).await
            }
            _ => self.create_raw(opts, group.as_ref()).await,
        }
    }

    async fn create_raw(&self, opts: CreateOptions, group: Option<&Group>) -> Result<Session> {
        let title = if opts.title.is_empty() {
            generate_title()
        } else {
            opts.title
        };
        let command = if opts.command.is_empty() {
            opts.tool.command("")
        } else {
            opts.command
        };
        let project_path = opts.project_path.to_string_lossy().into_owned();

        if let Some(group) = group {
            if !group.pre_launch_command.is_empty() {
                run_pre_launch_command(&group.pre_launch_command, &[&command, &project_path])
                    .await?;
            }
        }

        let tmux_name = tmux::generate_session_name(&title);
        tmux::create_session(tmux::CreateOptions {
            name: tmux_name.clone(),
            command: command.clone(),
            cwd: project_path,
            env: HashMap::new(),
        })
        .await
        .context("create tmux session")?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            title,
            project_path: opts.project_path,
            group_path: if opts.group_path.is_empty() {
                DEFAULT_GROUP.to_string()
            } else {
                opts.group_path
            },
            sort_order: self.db.list_sessions()?.len() as i64,
            command,
            tool: opts.tool,
            status: SessionStatus::Running,
            tmux_session: tmux_name.clone(),
            created_at: now,
            last_accessed: now,
            parent_session_id: String::new(),
            worktree: None,
            repo_url: String::new(),
            acknowledged: false,
            has_uncommitted: false,
            notes: String::new(),
        };

        if let Err(e) = self.db.save_session(&session) {
            // The tmux session exists but the row does not; kill it rather
            // than leaving an orphan the monitor can never associate.
            let _ = tmux::kill_session(&tmux_name).await;
            return Err(e);
        }
        let _ = self.db.insert_session_event(&session.id, "created", "");
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(session)
    }

    async fn create_in_worktree(
        &self,
        opts: CreateOptions,
        group: Group,
        prompts: Arc<dyn SessionPrompts>,
    ) -> Result<Session> {
        let location = git::parse_repo_url(&group.repo_url)
            .with_context(|| format!("invalid repo URL for group {}", group.path))?;

        // Resolve the title up front so the branch name matches it.
        let title = if opts.title.is_empty() {
            generate_title()
        } else {
            opts.title
        };
        let command = if opts.command.is_empty() {
            opts.tool.command("")
        } else {
            opts.command
        };
        let branch = git::sanitize_branch_name(&title);
        git::validate_branch_name(&branch)
            .with_context(|| format!("title {title:?} does not yield a usable branch name"))?;

        let bare_repo = git::bare_repo_path(&self.repos_dir, &location);
        let worktree = git::worktree_path(&self.worktrees_dir, &location, &branch);

        // Insert the pending row immediately so observers see the session
        // while the clone runs.
        let now = Utc::now();
        let pending = Session {
            id: Uuid::new_v4().to_string(),
            title: title.clone(),
            project_path: PathBuf::new(),
            group_path: group.path.clone(),
            sort_order: self.db.list_sessions()?.len() as i64,
            command: command.clone(),
            tool: opts.tool,
            status: SessionStatus::Creating,
            tmux_session: String::new(),
            created_at: now,
            last_accessed: now,
            parent_session_id: String::new(),
            worktree: None,
            repo_url: group.repo_url.clone(),
            acknowledged: false,
            has_uncommitted: false,
            notes: String::new(),
        };
        self.db.save_session(&pending)?;
        let _ = self.db.insert_session_event(&pending.id, "created", "");
        self.db.touch()?;
        self.broadcast(Event::refresh());

        let manager = self.clone();
        let session = pending.clone();
        let repo_url = group.repo_url.clone();
        let pre_launch = group.pre_launch_command.clone();
        let base_branch = self.default_base_branch.clone();
        tokio::spawn(async move {
            manager
                .finish_worktree_create(
                    session, repo_url, bare_repo, worktree, branch, base_branch, command,
                    pre_launch, prompts,
                )
                .await;
        });

        Ok(pending)
    }

    // The linear step list behind a worktree create. Every failure before
    // the final save runs the same compensation: drop the pending row and
    // tell the user what happened. Partial state (a cloned bare repo, an
    // existing worktree directory) is left for the next attempt to reuse.
    #[allow(clippy::too_many_arguments)]
    async fn finish_worktree_create(
        &self,
        mut session: Session,
        repo_url: String,
        bare_repo: PathBuf,
        worktree: PathBuf,
        branch: String,
        base_branch: String,
        command: String,
        pre_launch: String,
        prompts: Arc<dyn SessionPrompts>,
    ) {
        let cancel = |message: Option<String>| {
            let _ = self.db.delete_session(&session.id);
            let _ = self.db.touch();
            self.broadcast(Event::refresh());
            if let Some(message) = message {
                prompts.report_error(&message);
            }
        };

        let git_result = {
            let repo_url = repo_url.clone();
            let bare_repo = bare_repo.clone();
            let worktree = worktree.clone();
            let branch = branch.clone();
            tokio::task::spawn_blocking(move || -> Result<()> {
                if let Some(parent) = bare_repo.parent() {
                    std::fs::create_dir_all(parent).context("create repos directory")?;
                }
                if git::is_bare_repo(&bare_repo) {
                    git::fetch_bare(&bare_repo)?;
                } else {
                    git::clone_bare(&repo_url, &bare_repo)?;
                }
                if let Some(parent) = worktree.parent() {
                    std::fs::create_dir_all(parent).context("create worktrees directory")?;
                }
                git::create_worktree(&bare_repo, &branch, &worktree, &base_branch)
            })
            .await
        };

        match git_result {
            Err(join_err) => {
                cancel(Some(format!("Create failed: {join_err}")));
                return;
            }
            Ok(Err(e)) if e.downcast_ref::<git::WorktreeExistsError>().is_some() => {
                if !prompts.confirm_reuse_worktree(&branch) {
                    cancel(None);
                    return;
                }
                // Reuse whatever is already checked out at the target path.
            }
            Ok(Err(e)) => {
                cancel(Some(format!("Create worktree failed: {e:#}")));
                return;
            }
            Ok(Ok(())) => {}
        }

        if !pre_launch.is_empty() {
            let bare_str = bare_repo.to_string_lossy();
            let worktree_str = worktree.to_string_lossy();
            let args = [command.as_str(), bare_str.as_ref(), worktree_str.as_ref()];
            if let Err(e) = run_pre_launch_command(&pre_launch, &args).await {
                cancel(Some(format!("Pre-launch command failed: {e:#}")));
                return;
            }
        }

        let tmux_name = tmux::generate_session_name(&session.title);
        if let Err(e) = tmux::create_session(tmux::CreateOptions {
            name: tmux_name.clone(),
            command,
            cwd: worktree.to_string_lossy().into_owned(),
            env: HashMap::new(),
        })
        .await
        {
            cancel(Some(format!("Create failed: {e:#}")));
            return;
        }

        // A Delete may have raced the pipeline; committing Running for a row
        // that no longer exists would resurrect it as an orphan.
        match self.db.get_session(&session.id) {
            Ok(Some(_)) => {}
            _ => {
                log::info!(
                    "session {} deleted during create, discarding tmux session {tmux_name}",
                    session.id
                );
                let _ = tmux::kill_session(&tmux_name).await;
                return;
            }
        }

        session.tmux_session = tmux_name.clone();
        session.status = SessionStatus::Running;
        session.project_path = worktree.clone();
        session.worktree = Some(Worktree {
            path: worktree,
            repo: bare_repo,
            branch,
        });
        session.repo_url = repo_url;
        session.last_accessed = Utc::now();
        if let Err(e) = self.db.save_session(&session) {
            let _ = tmux::kill_session(&tmux_name).await;
            cancel(Some(format!("Save failed: {e:#}")));
            return;
        }
        let _ = self.db.touch();
        self.broadcast(Event::refresh());
    }

    pub async fn stop(&self, id: &str) -> Result<()> {
        let Some(session) = self.db.get_session(id)? else {
            return Ok(());
        };
        if !session.tmux_session.is_empty() {
            let _ = tmux::kill_session(&session.tmux_session).await;
        }
        self.db.write_status(id, SessionStatus::Stopped)?;
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(())
    }

    pub async fn restart(&self, id: &str) -> Result<()> {
        let mut session = self
            .db
            .get_session(id)?
            .ok_or_else(|| anyhow!("session not found: {id}"))?;
        if !session.tmux_session.is_empty() {
            let _ = tmux::kill_session(&session.tmux_session).await;
        }
        let tmux_name = tmux::generate_session_name(&session.title);
        tmux::create_session(tmux::CreateOptions {
            name: tmux_name.clone(),
            command: session.command.clone(),
            cwd: session.project_path.to_string_lossy().into_owned(),
            env: HashMap::new(),
        })
        .await?;
        session.tmux_session = tmux_name;
        session.status = SessionStatus::Running;
        session.last_accessed = Utc::now();
        self.db.save_session(&session)?;
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(())
    }

    /// Delete a session: tmux first (the agent may hold locks inside the
    /// worktree), then the worktree, then the row. Unknown ids are a no-op.
    pub async fn delete(&self, id: &str, prompts: Arc<dyn SessionPrompts>) -> Result<()> {
        let Some(session) = self.db.get_session(id)? else {
            return Ok(());
        };
        if !session.tmux_session.is_empty() {
            let _ = tmux::kill_session(&session.tmux_session).await;
        }

        if let Some(wt) = &session.worktree {
            let repo = wt.repo.clone();
            let path = wt.path.clone();
            let removed = tokio::task::spawn_blocking({
                let repo = repo.clone();
                let path = path.clone();
                move || git::remove_worktree(&repo, &path, false)
            })
            .await
            .context("join worktree removal")?;

            if let Err(e) = removed {
                if !prompts.confirm_force_delete(&format!("{e:#}")) {
                    return Err(e);
                }
                tokio::task::spawn_blocking(move || git::remove_worktree(&repo, &path, true))
                    .await
                    .context("join worktree removal")??;
            }
        }

        self.db.delete_session(id)?;
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(())
    }

    pub async fn update(&self, id: &str, opts: UpdateOptions) -> Result<()> {
        let mut session = self
            .db
            .get_session(id)?
            .ok_or_else(|| anyhow!("session not found: {id}"))?;
        session.title = opts.title;
        match opts.tool {
            // Staying on a custom tool keeps whatever the caller typed; a
            // blank command keeps what was already there.
            Tool::Custom if !opts.command.is_empty() => session.command = opts.command,
            Tool::Custom => {}
            tool => session.command = tool.command(""),
        }
        session.tool = opts.tool;
        session.project_path = opts.project_path;
        session.group_path = opts.group_path;
        self.db.save_session(&session)?;
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(())
    }

    pub fn rename(&self, id: &str, title: &str) -> Result<()> {
        self.db.update_session_field(id, SessionField::Title, &title)?;
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(())
    }

    pub fn move_to_group(&self, id: &str, group_path: &str) -> Result<()> {
        self.db
            .update_session_field(id, SessionField::GroupPath, &group_path)?;
        self.db.touch()?;
        self.broadcast(Event::refresh());
        Ok(())
    }

    pub fn acknowledge(&self, id: &str) -> Result<()> {
        self.db.set_acknowledged(id, true)?;
        self.db.touch()?;
        Ok(())
    }

    pub fn set_notes(&self, id: &str, notes: &str) -> Result<()> {
        self.db.set_session_notes(id, notes)?;
        self.db.touch()?;
        self.broadcast(Event::notes_updated(id));
        Ok(())
    }

    /// Re-read the worktree's dirty state, typically after the user detaches.
    pub fn refresh_dirty(&self, id: &str) -> Result<()> {
        let Some(session) = self.db.get_session(id)? else {
            return Ok(());
        };
        if let Some(wt) = &session.worktree {
            if let Ok(dirty) = git::is_worktree_dirty(&wt.path) {
                self.db.set_session_dirty(id, dirty)?;
                self.db.touch()?;
            }
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Session>> {
        self.db.list_sessions()
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        self.db.get_session(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::db_sessions::tests::{open_test_db, sample_session};
    use std::process::Command;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingPrompts {
        reuse: bool,
        errors: Mutex<Vec<String>>,
        reuse_asked: Mutex<Vec<String>>,
    }

    impl SessionPrompts for RecordingPrompts {
        fn confirm_reuse_worktree(&self, branch: &str) -> bool {
            self.reuse_asked.lock().unwrap().push(branch.to_string());
            self.reuse
        }
        fn report_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn manager(db: &Database, root: &std::path::Path) -> SessionManager {
        SessionManager::new(
            db.clone(),
            root.join("repos"),
            root.join("worktrees"),
            "main".to_string(),
            None,
        )
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn delete_unknown_id_is_a_no_op() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());
        mgr.delete("no-such-session", Arc::new(HeadlessPrompts))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_resets_command_for_builtin_tools() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());

        let mut session = sample_session("u1", "bold-wolf");
        session.tool = Tool::Custom;
        session.command = "old-tool --flag".to_string();
        db.save_session(&session).unwrap();

        mgr.update(
            "u1",
            UpdateOptions {
                title: "bold-wolf".into(),
                tool: Tool::Claude,
                command: String::new(),
                project_path: PathBuf::from("/tmp/proj"),
                group_path: DEFAULT_GROUP.into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(db.get_session("u1").unwrap().unwrap().command, "claude");
    }

    #[tokio::test]
    async fn update_preserves_custom_command() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());

        let mut session = sample_session("u2", "calm-owl");
        session.tool = Tool::Custom;
        session.command = "old-tool --flag".to_string();
        db.save_session(&session).unwrap();

        mgr.update(
            "u2",
            UpdateOptions {
                title: "calm-owl".into(),
                tool: Tool::Custom,
                command: "new-tool --other".into(),
                project_path: PathBuf::from("/tmp/proj"),
                group_path: DEFAULT_GROUP.into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            db.get_session("u2").unwrap().unwrap().command,
            "new-tool --other"
        );

        // Blank command on a still-custom tool keeps what was there.
        mgr.update(
            "u2",
            UpdateOptions {
                title: "calm-owl".into(),
                tool: Tool::Custom,
                command: String::new(),
                project_path: PathBuf::from("/tmp/proj"),
                group_path: DEFAULT_GROUP.into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            db.get_session("u2").unwrap().unwrap().command,
            "new-tool --other"
        );
    }

    #[tokio::test]
    async fn rename_and_notes_and_acknowledge() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());
        db.save_session(&sample_session("r1", "deep-hawk")).unwrap();

        mgr.rename("r1", "deep-hawk-2").unwrap();
        mgr.set_notes("r1", "waiting on review").unwrap();
        mgr.acknowledge("r1").unwrap();

        let got = db.get_session("r1").unwrap().unwrap();
        assert_eq!(got.title, "deep-hawk-2");
        assert_eq!(got.notes, "waiting on review");
        assert!(got.acknowledged);
    }

    fn git(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .expect("git available");
        assert!(status.success(), "git {args:?} failed");
    }

    /// A group whose bare repo is already cloned locally, so the pipeline
    /// takes the fetch path and never needs the network.
    fn seed_group_with_bare_repo(db: &Database, root: &std::path::Path) -> Group {
        let upstream = root.join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        git(&upstream, &["init", "-b", "main"]);
        git(&upstream, &["config", "user.email", "test@example.com"]);
        git(&upstream, &["config", "user.name", "test"]);
        std::fs::write(upstream.join("README.md"), "hi\n").unwrap();
        git(&upstream, &["add", "."]);
        git(&upstream, &["commit", "-m", "init"]);

        let location = git::parse_repo_url("https://localhost.invalid/owner/myrepo").unwrap();
        let bare = git::bare_repo_path(&root.join("repos"), &location);
        std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
        git::clone_bare(upstream.to_str().unwrap(), &bare).unwrap();
        // Point origin at the local upstream so fetches keep working.
        git(&bare, &["remote", "set-url", "origin", upstream.to_str().unwrap()]);

        let group = Group {
            path: "work".to_string(),
            name: "Work".to_string(),
            expanded: true,
            sort_order: 0,
            default_path: String::new(),
            repo_url: "https://localhost.invalid/owner/myrepo".to_string(),
            default_tool: None,
            pre_launch_command: String::new(),
        };
        db.replace_groups(std::slice::from_ref(&group)).unwrap();
        group
    }

    #[tokio::test]
    async fn worktree_exists_cancel_compensates_silently() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());
        seed_group_with_bare_repo(&db, tmp.path());

        // Occupy the target so the pipeline hits the sentinel.
        let location = git::parse_repo_url("https://localhost.invalid/owner/myrepo").unwrap();
        let wt = git::worktree_path(&tmp.path().join("worktrees"), &location, "bold-bear");
        std::fs::create_dir_all(&wt).unwrap();
        std::fs::write(wt.join("occupied"), "").unwrap();

        let prompts = Arc::new(RecordingPrompts::default());
        let pending = mgr
            .create(
                CreateOptions {
                    title: "bold-bear".into(),
                    group_path: "work".into(),
                    tool: Tool::Claude,
                    ..Default::default()
                },
                prompts.clone(),
            )
            .await
            .unwrap();
        assert_eq!(pending.status, SessionStatus::Creating);
        assert!(pending.tmux_session.is_empty());

        // Declined reuse deletes the pending row without reporting an error.
        let db2 = db.clone();
        let id = pending.id.clone();
        wait_for(move || db2.get_session(&id).unwrap().is_none()).await;
        assert_eq!(prompts.reuse_asked.lock().unwrap().as_slice(), ["bold-bear"]);
        assert!(prompts.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_clone_compensates_with_error() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());
        db.replace_groups(&[Group {
            path: "work".to_string(),
            name: "Work".to_string(),
            expanded: true,
            sort_order: 0,
            default_path: String::new(),
            repo_url: "https://localhost.invalid/owner/unreachable".to_string(),
            default_tool: None,
            pre_launch_command: String::new(),
        }])
        .unwrap();

        let prompts = Arc::new(RecordingPrompts::default());
        let pending = mgr
            .create(
                CreateOptions {
                    title: "swift-fox".into(),
                    group_path: "work".into(),
                    tool: Tool::Claude,
                    ..Default::default()
                },
                prompts.clone(),
            )
            .await
            .unwrap();

        let db2 = db.clone();
        let id = pending.id.clone();
        wait_for(move || db2.get_session(&id).unwrap().is_none()).await;
        let errors = prompts.errors.lock().unwrap();
        assert_eq!(errors.len(), 1, "expected one reported error: {errors:?}");
    }

    #[tokio::test]
    async fn invalid_group_repo_url_fails_before_inserting() {
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());
        db.replace_groups(&[Group {
            path: "broken".to_string(),
            name: "Broken".to_string(),
            expanded: true,
            sort_order: 0,
            default_path: String::new(),
            repo_url: "not-a-url".to_string(),
            default_tool: None,
            pre_launch_command: String::new(),
        }])
        .unwrap();

        let result = mgr
            .create(
                CreateOptions {
                    title: "any".into(),
                    group_path: "broken".into(),
                    tool: Tool::Claude,
                    ..Default::default()
                },
                Arc::new(HeadlessPrompts),
            )
            .await;
        assert!(result.is_err());
        assert!(db.list_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn worktree_create_happy_path() {
        if !tmux::is_available().await {
            eprintln!("tmux not available, skipping");
            return;
        }
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());
        seed_group_with_bare_repo(&db, tmp.path());

        let pending = mgr
            .create(
                CreateOptions {
                    title: "bold-bear".into(),
                    group_path: "work".into(),
                    tool: Tool::Shell,
                    ..Default::default()
                },
                Arc::new(HeadlessPrompts),
            )
            .await
            .unwrap();
        assert_eq!(pending.status, SessionStatus::Creating);

        let db2 = db.clone();
        let id = pending.id.clone();
        wait_for(move || {
            db2.get_session(&id)
                .unwrap()
                .is_some_and(|s| s.status == SessionStatus::Running)
        })
        .await;

        let done = db.get_session(&pending.id).unwrap().unwrap();
        let wt = done.worktree.expect("worktree fields populated");
        assert_eq!(wt.branch, "bold-bear");
        assert!(wt.path.ends_with("localhost.invalid/owner/myrepo/bold-bear"));
        assert_eq!(done.project_path, wt.path);
        assert!(wt.path.join("README.md").exists());
        assert!(!done.tmux_session.is_empty());

        let live = tmux::list_sessions().await;
        assert!(tmux::session_exists(&done.tmux_session, &live));
        let _ = tmux::kill_session(&done.tmux_session).await;
    }

    #[tokio::test]
    async fn raw_create_and_stop_round_trip() {
        if !tmux::is_available().await {
            eprintln!("tmux not available, skipping");
            return;
        }
        let db = open_test_db();
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&db, tmp.path());

        let session = mgr
            .create(
                CreateOptions {
                    title: "swift-fox".into(),
                    project_path: tmp.path().to_path_buf(),
                    tool: Tool::Shell,
                    ..Default::default()
                },
                Arc::new(HeadlessPrompts),
            )
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Running);
        let re = regex::Regex::new(r"^agws_swift-fox-[0-9a-f]+$").unwrap();
        assert!(re.is_match(&session.tmux_session), "{}", session.tmux_session);
        let live = tmux::list_sessions().await;
        assert!(tmux::session_exists(&session.tmux_session, &live));

        mgr.stop(&session.id).await.unwrap();
        let got = db.get_session(&session.id).unwrap().unwrap();
        assert_eq!(got.status, SessionStatus::Stopped);
        let live = tmux::list_sessions().await;
        assert!(!tmux::session_exists(&session.tmux_session, &live));
    }
}

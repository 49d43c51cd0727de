use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Creating,
    Running,
    Waiting,
    Idle,
    Error,
    Stopped,
    Deleting,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Creating => "creating",
            SessionStatus::Running => "running",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Idle => "idle",
            SessionStatus::Error => "error",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Deleting => "deleting",
        }
    }

    /// Rows written by older versions may carry unknown status strings;
    /// those are read back as `Idle` so the monitor can reclassify them.
    pub fn parse(s: &str) -> Self {
        match s {
            "creating" => SessionStatus::Creating,
            "running" => SessionStatus::Running,
            "waiting" => SessionStatus::Waiting,
            "error" => SessionStatus::Error,
            "stopped" => SessionStatus::Stopped,
            "deleting" => SessionStatus::Deleting,
            _ => SessionStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Claude,
    Opencode,
    Gemini,
    Codex,
    Custom,
    Shell,
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Shell
    }
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Claude => "claude",
            Tool::Opencode => "opencode",
            Tool::Gemini => "gemini",
            Tool::Codex => "codex",
            Tool::Custom => "custom",
            Tool::Shell => "shell",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "claude" => Tool::Claude,
            "opencode" => Tool::Opencode,
            "gemini" => Tool::Gemini,
            "codex" => Tool::Codex,
            "custom" => Tool::Custom,
            _ => Tool::Shell,
        }
    }

    /// The command launched inside the tmux session for this tool. Custom
    /// tools fall back to a plain shell when no command was supplied.
    pub fn command(&self, custom: &str) -> String {
        match self {
            Tool::Claude => "claude".to_string(),
            Tool::Opencode => "opencode".to_string(),
            Tool::Gemini => "gemini".to_string(),
            Tool::Codex => "codex".to_string(),
            Tool::Custom => {
                if custom.is_empty() {
                    "/bin/bash".to_string()
                } else {
                    custom.to_string()
                }
            }
            Tool::Shell => "/bin/bash".to_string(),
        }
    }
}

/// The git worktree backing a session. Either all three fields are known or
/// the session has no worktree at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub path: PathBuf,
    pub repo: PathBuf,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub project_path: PathBuf,
    pub group_path: String,
    pub sort_order: i64,
    pub command: String,
    pub tool: Tool,
    pub status: SessionStatus,
    /// Empty exactly while the session is being created or deleted.
    pub tmux_session: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub parent_session_id: String,
    pub worktree: Option<Worktree>,
    pub repo_url: String,
    pub acknowledged: bool,
    pub has_uncommitted: bool,
    pub notes: String,
}

pub const DEFAULT_GROUP: &str = "my-sessions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub path: String,
    pub name: String,
    pub expanded: bool,
    pub sort_order: i64,
    pub default_path: String,
    pub repo_url: String,
    pub default_tool: Option<Tool>,
    pub pre_launch_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: i64,
    pub session_id: String,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub detail: String,
}

use crate::domains::sessions::entity::{Tool, DEFAULT_GROUP};
use crate::infrastructure::notify::NotifyConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorktreeConfig {
    pub default_base_branch: String,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            default_base_branch: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_tool: Tool,
    pub default_group: String,
    pub worktree: WorktreeConfig,
    pub repos_dir: PathBuf,
    pub worktrees_dir: PathBuf,
    pub notifications: NotifyConfig,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = base_dir();
        Self {
            default_tool: Tool::Claude,
            default_group: DEFAULT_GROUP.to_string(),
            worktree: WorktreeConfig::default(),
            repos_dir: base.join("repos"),
            worktrees_dir: base.join("worktrees"),
            notifications: NotifyConfig::default(),
            log_level: "info".to_string(),
            log_dir: base.join("logs"),
        }
    }
}

pub fn base_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".agent-workspace")
}

pub fn default_path() -> PathBuf {
    base_dir().join("config.json")
}

pub fn db_path() -> PathBuf {
    base_dir().join("state.db")
}

impl Config {
    /// A missing file yields the defaults; a present but malformed file is
    /// an error, so a typo never silently reverts the user's settings.
    pub fn load(path: &Path) -> Result<Config> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("read config {}", path.display()));
            }
        };
        serde_json::from_str(&data).with_context(|| format!("parse config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(cfg.default_tool, Tool::Claude);
        assert_eq!(cfg.default_group, DEFAULT_GROUP);
        assert_eq!(cfg.worktree.default_base_branch, "main");
        assert!(!cfg.notifications.enabled);
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "defaultTool": "codex",
                "worktree": {"defaultBaseBranch": "develop"},
                "notifications": {"enabled": true, "ntfy": "https://ntfy.sh/mine"}
            }"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.default_tool, Tool::Codex);
        assert_eq!(cfg.worktree.default_base_branch, "develop");
        assert!(cfg.notifications.enabled);
        assert_eq!(cfg.notifications.ntfy, "https://ntfy.sh/mine");
        // Untouched fields keep their defaults.
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.default_group, DEFAULT_GROUP);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}

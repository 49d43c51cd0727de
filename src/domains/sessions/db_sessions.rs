use crate::domains::sessions::entity::{Session, SessionStatus, Tool, Worktree};
use crate::infrastructure::database::Database;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Row, ToSql};
use std::path::PathBuf;

const SESSION_COLUMNS: &str = "id, title, project_path, group_path, sort_order,
    command, tool, status, tmux_session,
    created_at, last_accessed,
    parent_session_id, worktree_path, worktree_repo, worktree_branch,
    acknowledged, repo_url, has_uncommitted, notes";

/// Columns that may be updated individually. The enum is the whitelist.
#[derive(Debug, Clone, Copy)]
pub enum SessionField {
    Title,
    ProjectPath,
    GroupPath,
    SortOrder,
    TmuxSession,
    LastAccessed,
    Acknowledged,
}

impl SessionField {
    fn column(&self) -> &'static str {
        match self {
            SessionField::Title => "title",
            SessionField::ProjectPath => "project_path",
            SessionField::GroupPath => "group_path",
            SessionField::SortOrder => "sort_order",
            SessionField::TmuxSession => "tmux_session",
            SessionField::LastAccessed => "last_accessed",
            SessionField::Acknowledged => "acknowledged",
        }
    }
}

pub trait SessionMethods {
    fn save_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, id: &str) -> Result<Option<Session>>;
    fn get_session_by_tmux_name(&self, tmux_session: &str) -> Result<Option<Session>>;
    fn list_sessions(&self) -> Result<Vec<Session>>;
    fn list_sessions_by_group(&self, group_path: &str) -> Result<Vec<Session>>;
    fn delete_session(&self, id: &str) -> Result<()>;
    fn update_session_field(&self, id: &str, field: SessionField, value: &dyn ToSql)
        -> Result<()>;
    fn write_status(&self, id: &str, status: SessionStatus) -> Result<()>;
    fn set_acknowledged(&self, id: &str, acknowledged: bool) -> Result<()>;
    fn set_session_dirty(&self, id: &str, dirty: bool) -> Result<()>;
    fn set_session_notes(&self, id: &str, notes: &str) -> Result<()>;
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let tool: String = row.get(6)?;
    let status: String = row.get(7)?;
    let created_at: i64 = row.get(9)?;
    let last_accessed: i64 = row.get(10)?;
    let worktree_path: String = row.get(12)?;
    let worktree_repo: String = row.get(13)?;
    let worktree_branch: String = row.get(14)?;
    let acknowledged: i64 = row.get(15)?;
    let has_uncommitted: i64 = row.get(17)?;

    let worktree = if worktree_path.is_empty() {
        None
    } else {
        Some(Worktree {
            path: PathBuf::from(worktree_path),
            repo: PathBuf::from(worktree_repo),
            branch: worktree_branch,
        })
    };

    Ok(Session {
        id: row.get(0)?,
        title: row.get(1)?,
        project_path: PathBuf::from(row.get::<_, String>(2)?),
        group_path: row.get(3)?,
        sort_order: row.get(4)?,
        command: row.get(5)?,
        tool: Tool::parse(&tool),
        status: SessionStatus::parse(&status),
        tmux_session: row.get(8)?,
        created_at: Utc.timestamp_millis_opt(created_at).single().unwrap_or_default(),
        last_accessed: Utc
            .timestamp_millis_opt(last_accessed)
            .single()
            .unwrap_or_default(),
        parent_session_id: row.get(11)?,
        worktree,
        repo_url: row.get(16)?,
        acknowledged: acknowledged != 0,
        has_uncommitted: has_uncommitted != 0,
        notes: row.get(18)?,
    })
}

impl SessionMethods for Database {
    fn save_session(&self, session: &Session) -> Result<()> {
        let conn = self.get_conn()?;
        let (wt_path, wt_repo, wt_branch) = match &session.worktree {
            Some(wt) => (
                wt.path.to_string_lossy().into_owned(),
                wt.repo.to_string_lossy().into_owned(),
                wt.branch.clone(),
            ),
            None => (String::new(), String::new(), String::new()),
        };
        conn.execute(
            "INSERT OR REPLACE INTO sessions (
                id, title, project_path, group_path, sort_order,
                command, tool, status, tmux_session,
                created_at, last_accessed,
                parent_session_id, worktree_path, worktree_repo, worktree_branch,
                acknowledged, repo_url, has_uncommitted, notes
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                session.id,
                session.title,
                session.project_path.to_string_lossy(),
                session.group_path,
                session.sort_order,
                session.command,
                session.tool.as_str(),
                session.status.as_str(),
                session.tmux_session,
                session.created_at.timestamp_millis(),
                session.last_accessed.timestamp_millis(),
                session.parent_session_id,
                wt_path,
                wt_repo,
                wt_branch,
                session.acknowledged as i64,
                session.repo_url,
                session.has_uncommitted as i64,
                session.notes,
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
            params![id],
            session_from_row,
        );
        match result {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_session_by_tmux_name(&self, tmux_session: &str) -> Result<Option<Session>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE tmux_session = ?1"),
            params![tmux_session],
            session_from_row,
        );
        match result {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY sort_order"))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn list_sessions_by_group(&self, group_path: &str) -> Result<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE group_path = ?1 ORDER BY sort_order"
        ))?;
        let sessions = stmt
            .query_map(params![group_path], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn update_session_field(
        &self,
        id: &str,
        field: SessionField,
        value: &dyn ToSql,
    ) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!("UPDATE sessions SET {} = ?1 WHERE id = ?2", field.column()),
            params![value, id],
        )?;
        Ok(())
    }

    fn write_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    fn set_acknowledged(&self, id: &str, acknowledged: bool) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET acknowledged = ?1 WHERE id = ?2",
            params![acknowledged as i64, id],
        )?;
        Ok(())
    }

    fn set_session_dirty(&self, id: &str, dirty: bool) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET has_uncommitted = ?1 WHERE id = ?2",
            params![dirty as i64, id],
        )?;
        Ok(())
    }

    fn set_session_notes(&self, id: &str, notes: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET notes = ?1 WHERE id = ?2",
            params![notes, id],
        )?;
        Ok(())
    }
}

use crate::domains::sessions::entity::{Group, Tool};
use crate::infrastructure::database::Database;
use anyhow::Result;
use rusqlite::params;

pub trait GroupMethods {
    /// The group list is small and edited as a whole; replace it in one
    /// transaction so a failed write never leaves a partial set.
    fn replace_groups(&self, groups: &[Group]) -> Result<()>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn delete_group(&self, path: &str) -> Result<()>;
}

impl GroupMethods for Database {
    fn replace_groups(&self, groups: &[Group]) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM groups", [])?;
        for g in groups {
            tx.execute(
                "INSERT INTO groups (
                    path, name, expanded, sort_order, default_path,
                    repo_url, default_tool, pre_launch_command
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    g.path,
                    g.name,
                    g.expanded as i64,
                    g.sort_order,
                    g.default_path,
                    g.repo_url,
                    g.default_tool.map(|t| t.as_str()).unwrap_or(""),
                    g.pre_launch_command,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, name, expanded, sort_order, default_path,
                    repo_url, default_tool, pre_launch_command
             FROM groups ORDER BY sort_order",
        )?;
        let groups = stmt
            .query_map([], |row| {
                let expanded: i64 = row.get(2)?;
                let default_tool: String = row.get(6)?;
                Ok(Group {
                    path: row.get(0)?,
                    name: row.get(1)?,
                    expanded: expanded != 0,
                    sort_order: row.get(3)?,
                    default_path: row.get(4)?,
                    repo_url: row.get(5)?,
                    default_tool: if default_tool.is_empty() {
                        None
                    } else {
                        Some(Tool::parse(&default_tool))
                    },
                    pre_launch_command: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn delete_group(&self, path: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM groups WHERE path = ?1", params![path])?;
        Ok(())
    }
}

use crate::domains::sessions::entity::SessionEvent;
use crate::infrastructure::database::Database;
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::params;

pub trait SessionEventMethods {
    /// Append to the audit log. The timestamp is the server wall clock at
    /// second resolution, assigned by SQLite.
    fn insert_session_event(&self, session_id: &str, event_type: &str, detail: &str)
        -> Result<()>;
    fn list_session_events(&self, session_id: &str, limit: i64) -> Result<Vec<SessionEvent>>;
}

impl SessionEventMethods for Database {
    fn insert_session_event(
        &self,
        session_id: &str,
        event_type: &str,
        detail: &str,
    ) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO session_events (session_id, event_type, detail) VALUES (?1, ?2, ?3)",
            params![session_id, event_type, detail],
        )?;
        Ok(())
    }

    fn list_session_events(&self, session_id: &str, limit: i64) -> Result<Vec<SessionEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, ts, event_type, detail
             FROM session_events
             WHERE session_id = ?1
             ORDER BY ts DESC, id DESC
             LIMIT ?2",
        )?;
        let events = stmt
            .query_map(params![session_id, limit], |row| {
                let ts: String = row.get(2)?;
                Ok(SessionEvent {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    ts: NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S")
                        .map(|naive| naive.and_utc())
                        .unwrap_or_default(),
                    event_type: row.get(3)?,
                    detail: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::db_sessions::tests::{open_test_db, sample_session};
    use crate::domains::sessions::db_sessions::SessionMethods;

    #[test]
    fn newest_first_with_limit() {
        let db = open_test_db();
        db.save_session(&sample_session("s1", "swift-fox")).unwrap();

        db.insert_session_event("s1", "created", "").unwrap();
        db.insert_session_event("s1", "status_changed", r#"{"from":"running","to":"idle"}"#)
            .unwrap();
        db.insert_session_event("s1", "status_changed", r#"{"from":"idle","to":"waiting"}"#)
            .unwrap();

        let events = db.list_session_events("s1", 2).unwrap();
        assert_eq!(events.len(), 2);
        // Same-second inserts fall back to id ordering, newest first.
        assert_eq!(events[0].detail, r#"{"from":"idle","to":"waiting"}"#);
        assert_eq!(events[1].detail, r#"{"from":"running","to":"idle"}"#);
    }

    #[test]
    fn cascade_deletes_with_session() {
        let db = open_test_db();
        db.save_session(&sample_session("s2", "bold-bear")).unwrap();
        db.insert_session_event("s2", "created", "").unwrap();

        db.delete_session("s2").unwrap();
        assert!(db.list_session_events("s2", 10).unwrap().is_empty());
    }
}

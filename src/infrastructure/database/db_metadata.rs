use super::connection::Database;
use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

pub const LAST_MODIFIED_KEY: &str = "last_modified";

pub trait MetadataMethods {
    fn get_meta(&self, key: &str) -> Result<Option<String>>;
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;
    /// Bump `last_modified` to the current wall clock in milliseconds.
    /// Called after every mutation so coarse pollers see a changed value.
    fn touch(&self) -> Result<()>;
    fn last_modified(&self) -> i64;
}

impl MetadataMethods for Database {
    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        let result: rusqlite::Result<String> = conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn touch(&self) -> Result<()> {
        self.set_meta(LAST_MODIFIED_KEY, &Utc::now().timestamp_millis().to_string())
    }

    fn last_modified(&self) -> i64 {
        self.get_meta(LAST_MODIFIED_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

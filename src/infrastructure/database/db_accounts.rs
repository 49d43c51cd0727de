use super::connection::Database;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub account_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
    pub id: i64,
    pub ts_ms: i64,
    pub five_hour_util: f64,
    pub five_hour_resets_at: i64,
    pub seven_day_util: f64,
    pub seven_day_resets_at: i64,
    pub extra_enabled: bool,
    pub extra_monthly_limit: f64,
    pub extra_used_credits: f64,
    pub extra_utilization: f64,
}

fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Rows consumed by the web/auth layer and the usage poller. The supervision
/// core only stores and retrieves them.
pub trait AccountMethods {
    fn save_account(&self, account: &Account) -> Result<()>;
    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;
    fn save_refresh_token(&self, token: &RefreshToken) -> Result<()>;
    fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;
    fn delete_refresh_token(&self, token: &str) -> Result<()>;
    fn purge_expired_refresh_tokens(&self) -> Result<usize>;
    fn insert_usage_snapshot(&self, snap: &UsageSnapshot) -> Result<()>;
    fn latest_usage_snapshot(&self) -> Result<Option<UsageSnapshot>>;
}

impl AccountMethods for Database {
    fn save_account(&self, account: &Account) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO accounts (id, username, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account.id,
                account.username,
                account.password_hash,
                account.created_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT id, username, password_hash, created_at FROM accounts WHERE username = ?1",
            params![username],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: millis_to_utc(row.get(3)?),
                })
            },
        );
        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO refresh_tokens (token, account_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token.token,
                token.account_id,
                token.expires_at.timestamp_millis(),
                token.created_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT token, account_id, expires_at, created_at
             FROM refresh_tokens WHERE token = ?1",
            params![token],
            |row| {
                Ok(RefreshToken {
                    token: row.get(0)?,
                    account_id: row.get(1)?,
                    expires_at: millis_to_utc(row.get(2)?),
                    created_at: millis_to_utc(row.get(3)?),
                })
            },
        );
        match result {
            Ok(token) => Ok(Some(token)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_refresh_token(&self, token: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM refresh_tokens WHERE token = ?1", params![token])?;
        Ok(())
    }

    fn purge_expired_refresh_tokens(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM refresh_tokens WHERE expires_at < ?1",
            params![Utc::now().timestamp_millis()],
        )?;
        Ok(removed)
    }

    fn insert_usage_snapshot(&self, snap: &UsageSnapshot) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO usage_snapshots (
                ts_ms, five_hour_util, five_hour_resets_at,
                seven_day_util, seven_day_resets_at,
                extra_enabled, extra_monthly_limit, extra_used_credits, extra_utilization
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                snap.ts_ms,
                snap.five_hour_util,
                snap.five_hour_resets_at,
                snap.seven_day_util,
                snap.seven_day_resets_at,
                snap.extra_enabled as i64,
                snap.extra_monthly_limit,
                snap.extra_used_credits,
                snap.extra_utilization
            ],
        )?;
        Ok(())
    }

    fn latest_usage_snapshot(&self) -> Result<Option<UsageSnapshot>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT id, ts_ms, five_hour_util, five_hour_resets_at,
                    seven_day_util, seven_day_resets_at,
                    extra_enabled, extra_monthly_limit, extra_used_credits, extra_utilization
             FROM usage_snapshots ORDER BY ts_ms DESC, id DESC LIMIT 1",
            [],
            |row| {
                Ok(UsageSnapshot {
                    id: row.get(0)?,
                    ts_ms: row.get(1)?,
                    five_hour_util: row.get(2)?,
                    five_hour_resets_at: row.get(3)?,
                    seven_day_util: row.get(4)?,
                    seven_day_resets_at: row.get(5)?,
                    extra_enabled: row.get::<_, i64>(6)? != 0,
                    extra_monthly_limit: row.get(7)?,
                    extra_used_credits: row.get(8)?,
                    extra_utilization: row.get(9)?,
                })
            },
        );
        match result {
            Ok(snap) => Ok(Some(snap)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

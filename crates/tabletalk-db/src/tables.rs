use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::Connection;
use tracing::info;

use tabletalk_types::models::Table;

use crate::presence::inactive_cutoff;
use crate::{Database, GameError, OptionalExt, Result, fmt_ts, parse_ts};

const MAX_TABLE_ID_LEN: usize = 10;
const JOIN_CODE_LEN: usize = 6;
// No 0/O or 1/I so codes survive being read aloud.
const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_ATTEMPTS: usize = 32;

/// Table ids are case-insensitive; the canonical form is uppercase.
pub fn normalize_table_id(raw: &str) -> Result<String> {
    let id = raw.trim().to_ascii_uppercase();
    if id.is_empty() || id.len() > MAX_TABLE_ID_LEN {
        return Err(GameError::validation(format!(
            "table id must be 1-{} characters",
            MAX_TABLE_ID_LEN
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GameError::validation("table id must be alphanumeric"));
    }
    Ok(id)
}

fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.random_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

impl Database {
    /// Create a table with a fresh join code. `reserved_codes` are the dashboard codes,
    /// which table codes must never collide with.
    pub fn create_table(&self, raw_id: &str, reserved_codes: &[&str], now: DateTime<Utc>) -> Result<Table> {
        let id = normalize_table_id(raw_id)?;

        let table = self.with_tx(|tx| {
            if table_exists(tx, &id)? {
                return Err(GameError::conflict(format!("table {} already exists", id)));
            }

            let mut join_code = None;
            for _ in 0..JOIN_CODE_ATTEMPTS {
                let candidate = generate_join_code();
                if reserved_codes.iter().any(|c| c.eq_ignore_ascii_case(&candidate)) {
                    continue;
                }
                let taken: Option<i64> = tx
                    .query_row("SELECT 1 FROM tables WHERE join_code = ?1", [&candidate], |r| r.get(0))
                    .optional()?;
                if taken.is_none() {
                    join_code = Some(candidate);
                    break;
                }
            }
            let join_code =
                join_code.ok_or_else(|| GameError::Internal("could not allocate a join code".into()))?;

            tx.execute(
                "INSERT INTO tables (id, join_code, created_at) VALUES (?1, ?2, ?3)",
                (&id, &join_code, fmt_ts(now)),
            )?;

            Ok(Table {
                id: id.clone(),
                join_code,
                created_at: now,
                active_users: 0,
            })
        })?;

        info!("Created table {}", table.id);
        Ok(table)
    }

    /// All tables with the number of users seen within the inactivity window.
    pub fn list_tables(&self, now: DateTime<Utc>) -> Result<Vec<Table>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.join_code, t.created_at,
                        (SELECT COUNT(*) FROM users u WHERE u.table_id = t.id AND u.last_active >= ?1)
                 FROM tables t
                 ORDER BY t.id",
            )?;
            let rows = stmt
                .query_map([fmt_ts(inactive_cutoff(now))], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, join_code, created_at, active_users)| {
                    Ok(Table {
                        id,
                        join_code,
                        created_at: parse_ts(&created_at)?,
                        active_users,
                    })
                })
                .collect()
        })
    }

    /// Delete a table and its users. Messages and badges are kept.
    pub fn delete_table(&self, raw_id: &str) -> Result<()> {
        let id = normalize_table_id(raw_id)?;
        let deleted = self.with_tx(|tx| {
            tx.execute("DELETE FROM users WHERE table_id = ?1", [&id])?;
            Ok(tx.execute("DELETE FROM tables WHERE id = ?1", [&id])?)
        })?;

        if deleted == 0 {
            return Err(GameError::not_found(format!("table {}", id)));
        }
        info!("Deleted table {}", id);
        Ok(())
    }

    pub fn table_exists(&self, raw_id: &str) -> Result<bool> {
        let id = normalize_table_id(raw_id)?;
        self.with_conn(|conn| table_exists(conn, &id))
    }
}

pub(crate) fn table_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM tables WHERE id = ?1", [id], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn join_code_for(conn: &Connection, id: &str) -> Result<Option<String>> {
    conn.query_row("SELECT join_code FROM tables WHERE id = ?1", [id], |r| r.get(0))
        .optional()
}

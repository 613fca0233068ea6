use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};
use uuid::Uuid;

use tabletalk_types::models::PresenceUser;

use crate::models::parse_uuid;
use crate::tables::{join_code_for, normalize_table_id};
use crate::{Database, GameError, OptionalExt, Result, fmt_ts, parse_ts};

/// Users idle longer than this are dropped on the next join or sweep.
pub const INACTIVITY_TIMEOUT_MINS: i64 = 10;
const MAX_NAME_LEN: usize = 50;

pub(crate) fn inactive_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(INACTIVITY_TIMEOUT_MINS)
}

fn clean_name(raw: &str, field: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::validation(format!(
            "{} must be 1-{} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

impl Database {
    /// Join a table (or rejoin under the same name). Reaps stale users first.
    pub fn join_table(
        &self,
        raw_table_id: &str,
        join_code: &str,
        first_name: &str,
        last_name: &str,
        now: DateTime<Utc>,
    ) -> Result<PresenceUser> {
        let table_id = normalize_table_id(raw_table_id)?;
        let first_name = clean_name(first_name, "first name")?;
        let last_name = clean_name(last_name, "last name")?;

        // The reap commits even when the join below is rejected.
        self.with_conn(|conn| reap_inactive(conn, now))?;

        self.with_tx(|tx| {
            let expected = join_code_for(tx, &table_id)?
                .ok_or_else(|| GameError::not_found(format!("table {}", table_id)))?;
            if !expected.eq_ignore_ascii_case(join_code.trim()) {
                return Err(GameError::unauthorized("invalid join code"));
            }

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, joined_at FROM users
                     WHERE table_id = ?1 AND first_name = ?2 COLLATE NOCASE AND last_name = ?3 COLLATE NOCASE",
                    params![table_id, first_name, last_name],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;

            let (id, joined_at) = match existing {
                Some((id, joined_at)) => {
                    tx.execute(
                        "UPDATE users SET last_active = ?1 WHERE id = ?2",
                        params![fmt_ts(now), id],
                    )?;
                    debug!("{} {} rejoined table {}", first_name, last_name, table_id);
                    (parse_uuid(&id)?, parse_ts(&joined_at)?)
                }
                None => {
                    let id = Uuid::new_v4();
                    tx.execute(
                        "INSERT INTO users (id, table_id, first_name, last_name, joined_at, last_active)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        params![id.to_string(), table_id, first_name, last_name, fmt_ts(now)],
                    )?;
                    info!("{} {} joined table {}", first_name, last_name, table_id);
                    (id, now)
                }
            };

            Ok(PresenceUser {
                id,
                table_id: table_id.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                joined_at,
                last_active: now,
            })
        })
    }

    pub fn heartbeat(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let updated = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users SET last_active = ?1 WHERE id = ?2",
                params![fmt_ts(now), user_id.to_string()],
            )?)
        })?;
        if updated == 0 {
            return Err(GameError::not_found(format!("user {}", user_id)));
        }
        Ok(())
    }

    pub fn leave(&self, user_id: Uuid) -> Result<()> {
        let deleted = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM users WHERE id = ?1", [user_id.to_string()])?)
        })?;
        if deleted == 0 {
            return Err(GameError::not_found(format!("user {}", user_id)));
        }
        Ok(())
    }

    /// Users at a table who have been active within the inactivity window.
    pub fn list_presence(&self, raw_table_id: &str, now: DateTime<Utc>) -> Result<Vec<PresenceUser>> {
        let table_id = normalize_table_id(raw_table_id)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, first_name, last_name, joined_at, last_active FROM users
                 WHERE table_id = ?1 AND last_active >= ?2
                 ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map(params![table_id, fmt_ts(inactive_cutoff(now))], |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, first_name, last_name, joined_at, last_active)| {
                    Ok(PresenceUser {
                        id: parse_uuid(&id)?,
                        table_id: table_id.clone(),
                        first_name,
                        last_name,
                        joined_at: parse_ts(&joined_at)?,
                        last_active: parse_ts(&last_active)?,
                    })
                })
                .collect()
        })
    }

    /// Drop every user whose last activity is older than the inactivity window.
    pub fn reap_inactive(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| reap_inactive(conn, now))
    }
}

fn reap_inactive(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let reaped = conn.execute(
        "DELETE FROM users WHERE last_active < ?1",
        [fmt_ts(inactive_cutoff(now))],
    )?;
    if reaped > 0 {
        info!("Reaped {} inactive users", reaped);
    }
    Ok(reaped)
}

/// Tables with at least one user active within the inactivity window.
pub(crate) fn present_tables(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT table_id FROM users WHERE last_active >= ?1")?;
    let ids = stmt
        .query_map([fmt_ts(inactive_cutoff(now))], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{at, db};

    #[test]
    fn join_upserts_by_name() {
        let db = db();
        let table = db.create_table("A1", &[], at(0)).unwrap();

        let first = db.join_table("a1", &table.join_code, "Ada", "Lovelace", at(10)).unwrap();
        let again = db
            .join_table("A1", &table.join_code.to_lowercase(), "ada", "LOVELACE", at(20))
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.joined_at, at(10));
        assert_eq!(db.list_presence("A1", at(30)).unwrap().len(), 1);
    }

    #[test]
    fn join_rejects_bad_code_and_unknown_table() {
        let db = db();
        db.create_table("A1", &[], at(0)).unwrap();
        assert!(matches!(
            db.join_table("A1", "WRONG", "Ada", "L", at(1)),
            Err(GameError::Unauthorized(_))
        ));
        assert!(matches!(
            db.join_table("Z9", "WRONG", "Ada", "L", at(1)),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn join_reaps_idle_users_everywhere() {
        let db = db();
        let a1 = db.create_table("A1", &[], at(0)).unwrap();
        let b2 = db.create_table("B2", &[], at(0)).unwrap();

        let idle = db.join_table("A1", &a1.join_code, "Idle", "User", at(0)).unwrap();
        let busy = db.join_table("A1", &a1.join_code, "Busy", "User", at(0)).unwrap();
        db.heartbeat(busy.id, at(9 * 60)).unwrap();

        db.join_table("B2", &b2.join_code, "New", "User", at(11 * 60)).unwrap();

        assert!(matches!(db.heartbeat(idle.id, at(11 * 60)), Err(GameError::NotFound(_))));
        let names: Vec<String> = db
            .list_presence("A1", at(11 * 60))
            .unwrap()
            .into_iter()
            .map(|u| u.first_name)
            .collect();
        assert_eq!(names, vec!["Busy"]);
    }

    #[test]
    fn rejected_join_still_reaps() {
        let db = db();
        let a1 = db.create_table("A1", &[], at(0)).unwrap();
        db.join_table("A1", &a1.join_code, "Idle", "User", at(0)).unwrap();

        assert!(matches!(
            db.join_table("A1", "WRONG", "Late", "User", at(11 * 60)),
            Err(GameError::Unauthorized(_))
        ));
        let remaining: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn leave_removes_user() {
        let db = db();
        let t = db.create_table("A1", &[], at(0)).unwrap();
        let user = db.join_table("A1", &t.join_code, "Ada", "L", at(0)).unwrap();
        db.leave(user.id).unwrap();
        assert!(db.list_presence("A1", at(1)).unwrap().is_empty());
        assert!(matches!(db.leave(user.id), Err(GameError::NotFound(_))));
    }
}

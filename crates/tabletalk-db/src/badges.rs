use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use tabletalk_types::models::{BadgeAward, Challenge};

use crate::models::parse_uuid;
use crate::tables::normalize_table_id;
use crate::{Database, Result, fmt_ts, parse_ts};

/// Append a badge for the winner of `challenge`. Badges are never updated or removed.
pub(crate) fn award_badge(
    conn: &Connection,
    challenge: &Challenge,
    table_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO badges (table_id, challenge_id, badge_name, badge_emoji, challenge_title, awarded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            table_id,
            challenge.id.to_string(),
            challenge.badge_name,
            challenge.badge_emoji,
            challenge.title,
            fmt_ts(now),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Badges won by a table, oldest first.
    pub fn table_badges(&self, raw_table_id: &str) -> Result<Vec<BadgeAward>> {
        let table_id = normalize_table_id(raw_table_id)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT challenge_id, badge_name, badge_emoji, challenge_title, awarded_at
                 FROM badges WHERE table_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([&table_id], |r| {
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
                .map(|(challenge_id, badge_name, badge_emoji, challenge_title, awarded_at)| {
                    Ok(BadgeAward {
                        challenge_id: parse_uuid(&challenge_id)?,
                        table_id: table_id.clone(),
                        badge_name,
                        badge_emoji,
                        challenge_title,
                        awarded_at: parse_ts(&awarded_at)?,
                    })
                })
                .collect()
        })
    }
}

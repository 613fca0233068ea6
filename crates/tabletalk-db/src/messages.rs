use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;
use uuid::Uuid;

use tabletalk_types::models::{GameStatus, Message};

use crate::models::{MessageRow, ScoredMessage, ScoredMessageRow};
use crate::session::load_session;
use crate::tables::{normalize_table_id, table_exists};
use crate::{Database, GameError, Result, fmt_ts};

pub const MAX_CONTENT_CHARS: usize = 500;
const MAX_PAGE: u32 = 200;

/// A table-to-table message as submitted by an attendee.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub from_table: String,
    pub to_table: String,
    pub sender_name: String,
    pub is_anonymous: bool,
}

/// Trim, strip control characters (newlines and tabs survive), enforce length.
pub fn sanitize_content(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    if cleaned.is_empty() {
        return Err(GameError::validation("message is empty"));
    }
    if cleaned.chars().count() > MAX_CONTENT_CHARS {
        return Err(GameError::validation(format!(
            "message exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(cleaned)
}

impl Database {
    /// Store a table-to-table message. Only accepted while the game is active.
    pub fn send_message(&self, msg: NewMessage, now: DateTime<Utc>) -> Result<Uuid> {
        let content = sanitize_content(&msg.content)?;
        let from_table = normalize_table_id(&msg.from_table)?;
        let to_table = normalize_table_id(&msg.to_table)?;
        if from_table == to_table {
            return Err(GameError::validation("cannot message your own table"));
        }

        let id = Uuid::new_v4();
        self.with_tx(|tx| {
            let session = load_session(tx)?;
            if session.status != GameStatus::Active {
                return Err(GameError::conflict(format!(
                    "game is {}, messages are closed",
                    session.status.as_str()
                )));
            }
            if !table_exists(tx, &from_table)? {
                return Err(GameError::not_found(format!("table {}", from_table)));
            }
            if !table_exists(tx, &to_table)? {
                return Err(GameError::not_found(format!("table {}", to_table)));
            }

            let public_name = (!msg.is_anonymous).then(|| msg.sender_name.clone());
            tx.execute(
                "INSERT INTO messages
                    (id, content, from_table, to_table, sender_name, public_name, is_anonymous, is_broadcast, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                params![
                    id.to_string(),
                    content,
                    from_table,
                    to_table,
                    msg.sender_name,
                    public_name,
                    msg.is_anonymous,
                    fmt_ts(now),
                ],
            )?;
            Ok(())
        })?;

        debug!("Message {} from {} to {}", id, from_table, to_table);
        Ok(id)
    }

    /// Administrative message to every table. Accepted in any game state.
    pub fn send_broadcast(&self, content: &str, sender_name: &str, now: DateTime<Utc>) -> Result<Uuid> {
        let content = sanitize_content(content)?;
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, content, from_table, to_table, sender_name, public_name, is_anonymous, is_broadcast, created_at)
                 VALUES (?1, ?2, NULL, NULL, ?3, ?3, 0, 1, ?4)",
                params![id.to_string(), content, sender_name, fmt_ts(now)],
            )?;
            Ok(())
        })?;
        debug!("Broadcast {} from {}", id, sender_name);
        Ok(id)
    }

    /// Messages addressed to a table plus broadcasts, newest first, carrying the
    /// table's own reaction on each.
    pub fn table_inbox(&self, raw_table_id: &str, limit: u32) -> Result<Vec<Message>> {
        let table_id = normalize_table_id(raw_table_id)?;
        let sql = format!(
            "SELECT {}, r.kind FROM messages m
             LEFT JOIN reaction_markers r ON r.message_id = m.id AND r.table_id = ?1
             WHERE m.to_table = ?1 OR m.is_broadcast = 1
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?2",
            MessageRow::COLUMNS
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![table_id, limit.min(MAX_PAGE)], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(|r| r.into_message(false)).collect()
        })
    }

    /// Every message with the real sender name, newest first.
    pub fn audit_messages(&self, limit: u32) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {}, NULL FROM messages m ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?1",
            MessageRow::COLUMNS
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit.min(MAX_PAGE)], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(|r| r.into_message(true)).collect()
        })
    }
}

/// All table-originated messages, optionally restricted to a closed time window.
pub(crate) fn scored_messages(
    conn: &rusqlite::Connection,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<Vec<ScoredMessage>> {
    let base = format!(
        "SELECT {} FROM messages WHERE is_broadcast = 0 AND from_table IS NOT NULL",
        ScoredMessageRow::COLUMNS
    );
    let rows = match window {
        Some((from, to)) => {
            let mut stmt = conn.prepare(&format!(
                "{} AND created_at >= ?1 AND created_at <= ?2 ORDER BY created_at, rowid",
                base
            ))?;
            stmt.query_map(params![fmt_ts(from), fmt_ts(to)], ScoredMessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY created_at, rowid", base))?;
            stmt.query_map([], ScoredMessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    rows.into_iter().map(ScoredMessageRow::into_scored).collect()
}

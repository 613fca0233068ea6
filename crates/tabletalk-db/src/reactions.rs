use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use tabletalk_types::models::{ReactionKind, ReactionState, ReactionTally};

use crate::tables::normalize_table_id;
use crate::{Database, GameError, OptionalExt, Result};

impl Database {
    /// Toggle `kind` for `table_id` on a message.
    ///
    /// A table holds at most one reaction per message: clicking the same kind again
    /// removes it, clicking a different kind moves the reaction. The table id is not
    /// checked against the tables list.
    pub fn toggle_reaction(&self, message_id: Uuid, table_id: &str, kind: ReactionKind) -> Result<ReactionState> {
        let table_id = normalize_table_id(table_id)?;
        let mid = message_id.to_string();

        let state = self.with_tx(|tx| {
            let mut tally = load_tally(tx, &mid)?
                .ok_or_else(|| GameError::not_found(format!("message {}", message_id)))?;

            let previous: Option<String> = tx
                .query_row(
                    "SELECT kind FROM reaction_markers WHERE message_id = ?1 AND table_id = ?2",
                    params![mid, table_id],
                    |r| r.get(0),
                )
                .optional()?;
            let previous = previous
                .map(|k| k.parse::<ReactionKind>())
                .transpose()
                .map_err(|e| GameError::Internal(e.to_string()))?;

            let active = match previous {
                Some(prev) => {
                    tally.decrement(prev);
                    tx.execute(
                        "DELETE FROM reaction_markers WHERE message_id = ?1 AND table_id = ?2",
                        params![mid, table_id],
                    )?;
                    (prev != kind).then_some(kind)
                }
                None => Some(kind),
            };

            if let Some(kind) = active {
                tally.increment(kind);
                tx.execute(
                    "INSERT INTO reaction_markers (message_id, table_id, kind) VALUES (?1, ?2, ?3)",
                    params![mid, table_id, kind.as_str()],
                )?;
            }

            store_tally(tx, &mid, &tally)?;
            Ok(ReactionState { tally, active })
        })?;

        debug!(
            "Table {} reaction on {} is now {:?}",
            table_id,
            message_id,
            state.active.map(ReactionKind::as_str)
        );
        Ok(state)
    }

    /// Current tally on a message and the reaction `table_id` holds on it.
    pub fn reaction_state(&self, message_id: Uuid, table_id: &str) -> Result<ReactionState> {
        let table_id = normalize_table_id(table_id)?;
        let mid = message_id.to_string();
        self.with_conn(|conn| {
            let tally = load_tally(conn, &mid)?
                .ok_or_else(|| GameError::not_found(format!("message {}", message_id)))?;
            let active: Option<String> = conn
                .query_row(
                    "SELECT kind FROM reaction_markers WHERE message_id = ?1 AND table_id = ?2",
                    params![mid, table_id],
                    |r| r.get(0),
                )
                .optional()?;
            let active = active
                .map(|k| k.parse::<ReactionKind>())
                .transpose()
                .map_err(|e| GameError::Internal(e.to_string()))?;
            Ok(ReactionState { tally, active })
        })
    }
}

fn load_tally(conn: &Connection, message_id: &str) -> Result<Option<ReactionTally>> {
    conn.query_row(
        "SELECT heart, thumbsup, fire, laugh FROM messages WHERE id = ?1",
        [message_id],
        |r| {
            let count = |i: usize| -> rusqlite::Result<u32> { Ok(r.get::<_, i64>(i)?.max(0) as u32) };
            Ok(ReactionTally {
                heart: count(0)?,
                thumbsup: count(1)?,
                fire: count(2)?,
                laugh: count(3)?,
            })
        },
    )
    .optional()
}

fn store_tally(conn: &Connection, message_id: &str, tally: &ReactionTally) -> Result<()> {
    conn.execute(
        "UPDATE messages SET heart = ?1, thumbsup = ?2, fire = ?3, laugh = ?4 WHERE id = ?5",
        params![tally.heart, tally.thumbsup, tally.fire, tally.laugh, message_id],
    )?;
    Ok(())
}

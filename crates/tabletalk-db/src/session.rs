use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::info;

use tabletalk_types::models::{GameAction, GameSession, GameStatus};

use crate::{Database, GameError, Result, fmt_ts, parse_opt_ts};

pub(crate) fn load_session(conn: &Connection) -> Result<GameSession> {
    let (status, started_at, paused_at, ended_at): (String, Option<String>, Option<String>, Option<String>) =
        conn.query_row(
            "SELECT status, started_at, paused_at, ended_at FROM game_session WHERE id = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?;

    Ok(GameSession {
        status: status
            .parse::<GameStatus>()
            .map_err(|e| GameError::Internal(e.to_string()))?,
        started_at: parse_opt_ts(started_at)?,
        paused_at: parse_opt_ts(paused_at)?,
        ended_at: parse_opt_ts(ended_at)?,
    })
}

impl Database {
    pub fn game_session(&self) -> Result<GameSession> {
        self.with_conn(load_session)
    }

    /// Apply an admin game-control action, rejecting transitions that make no sense
    /// from the current status.
    pub fn apply_game_action(&self, action: GameAction, now: DateTime<Utc>) -> Result<GameSession> {
        let session = self.with_tx(|tx| {
            let mut session = load_session(tx)?;
            let next = action.apply(session.status).ok_or_else(|| {
                GameError::conflict(format!(
                    "cannot {:?} a game that is {}",
                    action,
                    session.status.as_str()
                ))
            })?;

            match action {
                GameAction::Start => {
                    session.started_at = Some(now);
                    session.paused_at = None;
                    session.ended_at = None;
                }
                GameAction::Pause => session.paused_at = Some(now),
                GameAction::Resume => session.paused_at = None,
                GameAction::End => session.ended_at = Some(now),
            }
            session.status = next;

            tx.execute(
                "UPDATE game_session SET status = ?1, started_at = ?2, paused_at = ?3, ended_at = ?4
                 WHERE id = 1",
                params![
                    session.status.as_str(),
                    session.started_at.map(fmt_ts),
                    session.paused_at.map(fmt_ts),
                    session.ended_at.map(fmt_ts),
                ],
            )?;
            Ok(session)
        })?;

        info!("Game is now {}", session.status.as_str());
        Ok(session)
    }

    /// Wipe the round: messages, reaction markers and challenges go, the session
    /// returns to `not_started`. Badges and tables stay.
    pub fn reset_game(&self) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute_batch(
                "DELETE FROM reaction_markers;
                 DELETE FROM messages;
                 DELETE FROM challenges;
                 UPDATE game_session
                    SET status = 'not_started', started_at = NULL, paused_at = NULL, ended_at = NULL
                  WHERE id = 1;",
            )?;
            Ok(())
        })?;
        info!("Game reset");
        Ok(())
    }
}

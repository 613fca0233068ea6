//! Database row types. These map directly to SQLite rows and are converted into
//! `tabletalk_types` models once timestamps and enums have been validated.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use tabletalk_types::models::{
    Challenge, ChallengeResults, Message, ReactionKind, ReactionTally, ScoringType,
};

use crate::{GameError, Result, parse_opt_ts, parse_ts};

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse()
        .map_err(|e| GameError::Internal(format!("corrupt id '{}': {}", s, e)))
}

fn tally_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<ReactionTally> {
    let count = |idx: usize| -> rusqlite::Result<u32> {
        let n: i64 = row.get(idx)?;
        Ok(n.clamp(0, i64::from(u32::MAX)) as u32)
    };
    Ok(ReactionTally {
        heart: count(first)?,
        thumbsup: count(first + 1)?,
        fire: count(first + 2)?,
        laugh: count(first + 3)?,
    })
}

/// The subset of a message that scoring and challenge resolution read.
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub from_table: String,
    pub tally: ReactionTally,
    pub created_at: DateTime<Utc>,
}

pub(crate) struct ScoredMessageRow {
    pub from_table: String,
    pub tally: ReactionTally,
    pub created_at: String,
}

impl ScoredMessageRow {
    pub const COLUMNS: &'static str = "from_table, heart, thumbsup, fire, laugh, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            from_table: row.get(0)?,
            tally: tally_from_row(row, 1)?,
            created_at: row.get(5)?,
        })
    }

    pub fn into_scored(self) -> Result<ScoredMessage> {
        Ok(ScoredMessage {
            from_table: self.from_table,
            tally: self.tally,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub(crate) struct MessageRow {
    pub id: String,
    pub content: String,
    pub from_table: Option<String>,
    pub to_table: Option<String>,
    pub sender_name: String,
    pub public_name: Option<String>,
    pub is_anonymous: bool,
    pub is_broadcast: bool,
    pub tally: ReactionTally,
    pub created_at: String,
    pub my_reaction: Option<String>,
}

impl MessageRow {
    /// Column list for `SELECT`s on `messages m`; a trailing marker column is appended by callers.
    pub const COLUMNS: &'static str = "m.id, m.content, m.from_table, m.to_table, m.sender_name, \
         m.public_name, m.is_anonymous, m.is_broadcast, m.heart, m.thumbsup, m.fire, m.laugh, \
         m.created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            from_table: row.get(2)?,
            to_table: row.get(3)?,
            sender_name: row.get(4)?,
            public_name: row.get(5)?,
            is_anonymous: row.get(6)?,
            is_broadcast: row.get(7)?,
            tally: tally_from_row(row, 8)?,
            created_at: row.get(12)?,
            my_reaction: row.get(13)?,
        })
    }

    pub fn into_message(self, include_sender: bool) -> Result<Message> {
        let my_reaction = self
            .my_reaction
            .as_deref()
            .map(|k| k.parse::<ReactionKind>())
            .transpose()
            .map_err(|e| GameError::Internal(e.to_string()))?;

        Ok(Message {
            id: parse_uuid(&self.id)?,
            content: self.content,
            from_table: self.from_table,
            to_table: self.to_table,
            sender_name: include_sender.then_some(self.sender_name),
            public_name: self.public_name,
            is_anonymous: self.is_anonymous,
            is_broadcast: self.is_broadcast,
            reactions: self.tally,
            my_reaction,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub(crate) struct ChallengeRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub scoring_type: String,
    pub started_at: String,
    pub ends_at: String,
    pub active: bool,
    pub badge_name: String,
    pub badge_emoji: String,
    pub winner: Option<String>,
    pub results: Option<String>,
    pub participants: Option<String>,
    pub resolved_at: Option<String>,
}

impl ChallengeRow {
    pub const COLUMNS: &'static str = "id, title, description, scoring_type, started_at, ends_at, \
         active, badge_name, badge_emoji, winner, results, participants, resolved_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            scoring_type: row.get(3)?,
            started_at: row.get(4)?,
            ends_at: row.get(5)?,
            active: row.get(6)?,
            badge_name: row.get(7)?,
            badge_emoji: row.get(8)?,
            winner: row.get(9)?,
            results: row.get(10)?,
            participants: row.get(11)?,
            resolved_at: row.get(12)?,
        })
    }

    pub fn into_challenge(self) -> Result<Challenge> {
        let scoring_type = self
            .scoring_type
            .parse::<ScoringType>()
            .map_err(|e| GameError::Internal(e.to_string()))?;
        let results = self
            .results
            .as_deref()
            .map(serde_json::from_str::<ChallengeResults>)
            .transpose()?;
        let participants = self
            .participants
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()?
            .unwrap_or_default();

        Ok(Challenge {
            id: parse_uuid(&self.id)?,
            title: self.title,
            description: self.description,
            scoring_type,
            started_at: parse_ts(&self.started_at)?,
            ends_at: parse_ts(&self.ends_at)?,
            active: self.active,
            badge_name: self.badge_name,
            badge_emoji: self.badge_emoji,
            winner: self.winner,
            results,
            participants,
            resolved_at: parse_opt_ts(self.resolved_at)?,
        })
    }
}

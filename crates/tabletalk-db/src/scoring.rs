use std::collections::BTreeMap;

use tabletalk_types::models::LeaderboardEntry;

use crate::messages::scored_messages;
use crate::models::ScoredMessage;
use crate::{Database, Result};

/// Flat points for every message a table sends.
pub const POINTS_PER_MESSAGE: f64 = 0.5;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;
pub const TV_LEADERBOARD_SIZE: usize = 5;

/// Round half-up to one decimal place. Scores are never negative.
pub fn round_points(points: f64) -> f64 {
    (points * 10.0).round() / 10.0
}

/// Rank tables by points from the live reaction tallies on their messages.
/// Equal scores are ordered by table id.
pub fn rank_tables(messages: &[ScoredMessage], limit: usize) -> Vec<LeaderboardEntry> {
    let mut totals: BTreeMap<&str, LeaderboardEntry> = BTreeMap::new();
    for msg in messages {
        let entry = totals
            .entry(msg.from_table.as_str())
            .or_insert_with(|| LeaderboardEntry {
                table_id: msg.from_table.clone(),
                points: 0.0,
                messages: 0,
                reactions: 0,
            });
        entry.points += POINTS_PER_MESSAGE + msg.tally.points();
        entry.messages += 1;
        entry.reactions += msg.tally.total();
    }

    let mut ranked: Vec<LeaderboardEntry> = totals
        .into_values()
        .map(|mut e| {
            e.points = round_points(e.points);
            e
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.points
            .total_cmp(&a.points)
            .then_with(|| a.table_id.cmp(&b.table_id))
    });
    ranked.truncate(limit);
    ranked
}

impl Database {
    /// Recomputed over every message on each call.
    pub fn compute_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let messages = self.with_conn(|conn| scored_messages(conn, None))?;
        Ok(rank_tables(&messages, limit))
    }
}

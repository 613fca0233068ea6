//! Time-boxed challenges.
//!
//! A challenge is active from creation until it is resolved, either by an admin
//! ending it early or by the first read after `ends_at`. There is no timer: every
//! read path sweeps expired challenges before returning anything, so the stored
//! `active` flag is only trusted after that sweep.
//!
//! Resolution claims the row with a conditional `UPDATE ... WHERE active = 1` inside
//! the same transaction that scores the window and awards the badge. Whoever loses
//! the claim does nothing, so a challenge is scored and awarded exactly once.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use tracing::{info, warn};
use uuid::Uuid;

use tabletalk_types::models::{Challenge, ChallengeOutcome, ChallengeResults, ScoringType};

use crate::badges::award_badge;
use crate::messages::scored_messages;
use crate::models::{ChallengeRow, ScoredMessage};
use crate::presence::present_tables;
use crate::{Database, GameError, OptionalExt, Result, fmt_ts, truncate_ms};

pub const MIN_DURATION_MINS: i64 = 1;
pub const MAX_DURATION_MINS: i64 = 60;
/// Messages a table must send to finish a speed challenge.
pub const SPEED_TARGET: usize = 5;

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_BADGE_NAME_CHARS: usize = 50;
const MAX_BADGE_EMOJI_CHARS: usize = 16;

#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub title: String,
    pub description: Option<String>,
    pub scoring_type: ScoringType,
    pub duration_minutes: i64,
    pub badge_name: String,
    pub badge_emoji: String,
}

fn required_text(raw: &str, field: &str, max: usize) -> Result<String> {
    let s = raw.trim();
    if s.is_empty() || s.chars().count() > max {
        return Err(GameError::validation(format!("{} must be 1-{} characters", field, max)));
    }
    Ok(s.to_string())
}

/// Per-table scores for the messages inside a challenge window.
///
/// Count types score every table that sent something. Speed scores only tables
/// that reached `SPEED_TARGET` messages, as seconds from `started_at` to the
/// message that got them there.
pub fn challenge_scores(
    scoring_type: ScoringType,
    messages: &[ScoredMessage],
    started_at: DateTime<Utc>,
) -> ChallengeResults {
    let mut results = ChallengeResults::new();
    match scoring_type {
        ScoringType::MostMessages => {
            for m in messages {
                *results.entry(m.from_table.clone()).or_insert(0.0) += 1.0;
            }
        }
        ScoringType::MostReactions => {
            for m in messages {
                *results.entry(m.from_table.clone()).or_insert(0.0) += f64::from(m.tally.total());
            }
        }
        ScoringType::Speed => {
            let mut ordered: Vec<&ScoredMessage> = messages.iter().collect();
            ordered.sort_by_key(|m| m.created_at);

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for m in ordered {
                let count = counts.entry(m.from_table.as_str()).or_insert(0);
                *count += 1;
                if *count == SPEED_TARGET {
                    let elapsed = (m.created_at - started_at).num_milliseconds() as f64 / 1000.0;
                    results.insert(m.from_table.clone(), elapsed);
                }
            }
        }
    }
    results
}

/// Highest count wins; for speed, the lowest time. A count of zero never wins.
/// Equal scores go to the lowest table id.
pub fn pick_winner(scoring_type: ScoringType, results: &ChallengeResults) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for (table, &score) in results {
        let better = match (scoring_type, best) {
            (ScoringType::Speed, None) => true,
            (_, None) => score > 0.0,
            (ScoringType::Speed, Some((_, top))) => score < top,
            (_, Some((_, top))) => score > top,
        };
        if better {
            best = Some((table, score));
        }
    }
    best.map(|(table, _)| table.clone())
}

fn load_challenge(conn: &Connection, id: &str) -> Result<Option<Challenge>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM challenges WHERE id = ?1", ChallengeRow::COLUMNS),
            [id],
            ChallengeRow::from_row,
        )
        .optional()?;
    row.map(ChallengeRow::into_challenge).transpose()
}

/// Claim and score one challenge. Returns `None` if someone else already resolved it.
fn resolve_in_tx(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<Option<ChallengeOutcome>> {
    let claimed = conn.execute(
        "UPDATE challenges SET active = 0, resolved_at = ?1 WHERE id = ?2 AND active = 1",
        params![fmt_ts(now), id],
    )?;
    if claimed == 0 {
        return Ok(None);
    }

    let challenge = load_challenge(conn, id)?
        .ok_or_else(|| GameError::Internal(format!("challenge {} vanished during resolution", id)))?;

    let window_end = now.min(challenge.ends_at);
    let messages = scored_messages(conn, Some((challenge.started_at, window_end)))?;
    let results = challenge_scores(challenge.scoring_type, &messages, challenge.started_at);
    let winner = pick_winner(challenge.scoring_type, &results);

    let mut participants: BTreeSet<String> = messages.iter().map(|m| m.from_table.clone()).collect();
    participants.extend(present_tables(conn, now)?);
    let participants: Vec<String> = participants.into_iter().collect();

    if let Some(table) = &winner {
        award_badge(conn, &challenge, table, now)?;
    }

    conn.execute(
        "UPDATE challenges SET winner = ?1, results = ?2, participants = ?3 WHERE id = ?4",
        params![
            winner,
            serde_json::to_string(&results)?,
            serde_json::to_string(&participants)?,
            id,
        ],
    )?;

    match &winner {
        Some(table) => info!("Challenge '{}' resolved, winner {}", challenge.title, table),
        None => info!("Challenge '{}' resolved with no winner", challenge.title),
    }

    Ok(Some(ChallengeOutcome {
        challenge_id: challenge.id,
        winner,
        results,
    }))
}

impl Database {
    pub fn create_challenge(&self, new: NewChallenge, now: DateTime<Utc>) -> Result<Challenge> {
        let now = truncate_ms(now);
        if !(MIN_DURATION_MINS..=MAX_DURATION_MINS).contains(&new.duration_minutes) {
            return Err(GameError::validation(format!(
                "duration must be {}-{} minutes",
                MIN_DURATION_MINS, MAX_DURATION_MINS
            )));
        }
        let title = required_text(&new.title, "title", MAX_TITLE_CHARS)?;
        let description = match new.description.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(d) if d.chars().count() > MAX_DESCRIPTION_CHARS => {
                return Err(GameError::validation(format!(
                    "description exceeds {} characters",
                    MAX_DESCRIPTION_CHARS
                )));
            }
            Some(d) => Some(d.to_string()),
        };
        let badge_name = required_text(&new.badge_name, "badge name", MAX_BADGE_NAME_CHARS)?;
        let badge_emoji = required_text(&new.badge_emoji, "badge emoji", MAX_BADGE_EMOJI_CHARS)?;

        let challenge = Challenge {
            id: Uuid::new_v4(),
            title,
            description,
            scoring_type: new.scoring_type,
            started_at: now,
            ends_at: now + Duration::minutes(new.duration_minutes),
            active: true,
            badge_name,
            badge_emoji,
            winner: None,
            results: None,
            participants: Vec::new(),
            resolved_at: None,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO challenges
                    (id, title, description, scoring_type, started_at, ends_at, active, badge_name, badge_emoji)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
                params![
                    challenge.id.to_string(),
                    challenge.title,
                    challenge.description,
                    challenge.scoring_type.as_str(),
                    fmt_ts(challenge.started_at),
                    fmt_ts(challenge.ends_at),
                    challenge.badge_name,
                    challenge.badge_emoji,
                ],
            )?;
            Ok(())
        })?;

        info!(
            "Challenge '{}' ({}) created, ends at {}",
            challenge.title,
            challenge.scoring_type.as_str(),
            challenge.ends_at
        );
        Ok(challenge)
    }

    /// Resolve every active challenge whose end time has passed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ChallengeOutcome>> {
        let now = truncate_ms(now);
        let expired: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM challenges WHERE active = 1 AND ends_at < ?1")?;
            let ids = stmt
                .query_map([fmt_ts(now)], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })?;

        let mut outcomes = Vec::new();
        for id in &expired {
            match self.with_tx(|tx| resolve_in_tx(tx, id, now)) {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to resolve expired challenge {}: {}", id, e);
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Challenges still running after expired ones have been resolved, soonest end first.
    pub fn list_active_challenges(&self, now: DateTime<Utc>) -> Result<Vec<Challenge>> {
        self.sweep_expired(now)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM challenges WHERE active = 1 ORDER BY ends_at, id",
                ChallengeRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([], ChallengeRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChallengeRow::into_challenge).collect()
        })
    }

    /// Every challenge, newest first.
    pub fn list_challenges(&self, limit: u32, now: DateTime<Utc>) -> Result<Vec<Challenge>> {
        self.sweep_expired(now)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM challenges ORDER BY started_at DESC, id LIMIT ?1",
                ChallengeRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([limit], ChallengeRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChallengeRow::into_challenge).collect()
        })
    }

    pub fn get_challenge(&self, id: Uuid, now: DateTime<Utc>) -> Result<Challenge> {
        let now = truncate_ms(now);
        let id = id.to_string();
        self.with_tx(|tx| {
            let challenge = load_challenge(tx, &id)?
                .ok_or_else(|| GameError::not_found(format!("challenge {}", id)))?;
            if challenge.is_expired(now) {
                resolve_in_tx(tx, &id, now)?;
                return load_challenge(tx, &id)?
                    .ok_or_else(|| GameError::not_found(format!("challenge {}", id)));
            }
            Ok(challenge)
        })
    }

    /// End a challenge now and award its badge. Other expired challenges are swept too.
    pub fn end_challenge_now(&self, id: Uuid, now: DateTime<Utc>) -> Result<ChallengeOutcome> {
        let now = truncate_ms(now);
        let sid = id.to_string();
        let outcome = self.with_tx(|tx| {
            if load_challenge(tx, &sid)?.is_none() {
                return Err(GameError::not_found(format!("challenge {}", id)));
            }
            resolve_in_tx(tx, &sid, now)?
                .ok_or_else(|| GameError::conflict("challenge has already ended"))
        })?;

        self.sweep_expired(now)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::NewMessage;
    use crate::test_util::{at, db};
    use tabletalk_types::models::{GameAction, ReactionKind, ReactionTally};

    fn new_challenge(scoring_type: ScoringType, minutes: i64) -> NewChallenge {
        NewChallenge {
            title: "Quick fire".into(),
            description: Some("  ".into()),
            scoring_type,
            duration_minutes: minutes,
            badge_name: "Chatterbox".into(),
            badge_emoji: "🗣️".into(),
        }
    }

    fn game() -> Database {
        let db = db();
        for t in ["A1", "B2", "C3"] {
            db.create_table(t, &[], at(0)).unwrap();
        }
        db.apply_game_action(GameAction::Start, at(0)).unwrap();
        db
    }

    fn send(db: &Database, from: &str, to: &str, secs: i64) -> Uuid {
        db.send_message(
            NewMessage {
                content: format!("from {}", from),
                from_table: from.into(),
                to_table: to.into(),
                sender_name: "Someone".into(),
                is_anonymous: false,
            },
            at(secs),
        )
        .unwrap()
    }

    fn scored(table: &str, secs: i64, reactions: u32) -> ScoredMessage {
        ScoredMessage {
            from_table: table.into(),
            tally: ReactionTally { heart: reactions, ..Default::default() },
            created_at: at(secs),
        }
    }

    #[test]
    fn creation_validates_input() {
        let db = db();
        assert!(matches!(
            db.create_challenge(new_challenge(ScoringType::Speed, 0), at(0)),
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            db.create_challenge(new_challenge(ScoringType::Speed, 61), at(0)),
            Err(GameError::Validation(_))
        ));
        let mut untitled = new_challenge(ScoringType::Speed, 5);
        untitled.title = " ".into();
        assert!(matches!(db.create_challenge(untitled, at(0)), Err(GameError::Validation(_))));

        let c = db.create_challenge(new_challenge(ScoringType::Speed, 60), at(0)).unwrap();
        assert_eq!(c.ends_at, at(3600));
        assert_eq!(c.description, None);
        assert!(c.active);
    }

    #[test]
    fn speed_first_to_five_wins() {
        let mut messages: Vec<ScoredMessage> = (0..6).map(|t| scored("Y", t, 0)).collect();
        messages.extend((0..5).map(|t| scored("X", t, 0)));
        messages.push(scored("Z", 1, 0));

        let results = challenge_scores(ScoringType::Speed, &messages, at(0));
        assert_eq!(results.get("X"), Some(&4.0));
        assert_eq!(results.get("Y"), Some(&4.0));
        assert_eq!(results.get("Z"), None);
        // Same instant: lowest table id wins.
        assert_eq!(pick_winner(ScoringType::Speed, &results).as_deref(), Some("X"));

        let mut faster_y: Vec<ScoredMessage> = (0..5).map(|t| scored("Y", t, 0)).collect();
        faster_y.extend((1..6).map(|t| scored("X", t, 0)));
        let results = challenge_scores(ScoringType::Speed, &faster_y, at(0));
        assert_eq!(pick_winner(ScoringType::Speed, &results).as_deref(), Some("Y"));
    }

    #[test]
    fn speed_without_finishers_has_no_winner() {
        let messages: Vec<ScoredMessage> = (0..4).map(|t| scored("A1", t, 0)).collect();
        let results = challenge_scores(ScoringType::Speed, &messages, at(0));
        assert!(results.is_empty());
        assert_eq!(pick_winner(ScoringType::Speed, &results), None);
    }

    #[test]
    fn reaction_scores_and_ties() {
        let messages = vec![scored("B2", 0, 2), scored("A1", 1, 1), scored("A1", 2, 1)];
        let results = challenge_scores(ScoringType::MostReactions, &messages, at(0));
        assert_eq!(results.get("A1"), Some(&2.0));
        assert_eq!(results.get("B2"), Some(&2.0));
        assert_eq!(pick_winner(ScoringType::MostReactions, &results).as_deref(), Some("A1"));

        let none = challenge_scores(ScoringType::MostReactions, &[scored("A1", 0, 0)], at(0));
        assert_eq!(pick_winner(ScoringType::MostReactions, &none), None);
    }

    #[test]
    fn expiry_is_applied_on_read() {
        let db = game();
        let c = db.create_challenge(new_challenge(ScoringType::MostMessages, 1), at(0)).unwrap();
        send(&db, "A1", "B2", 10);

        assert_eq!(db.list_active_challenges(at(60)).unwrap().len(), 1);

        let fetched = db.get_challenge(c.id, at(61)).unwrap();
        assert!(!fetched.active);
        assert_eq!(fetched.winner.as_deref(), Some("A1"));
        assert_eq!(fetched.resolved_at, Some(at(61)));
        assert!(db.list_active_challenges(at(62)).unwrap().is_empty());
        assert_eq!(db.table_badges("A1").unwrap().len(), 1);
    }

    #[test]
    fn manual_end_and_double_end() {
        let db = game();
        let c = db.create_challenge(new_challenge(ScoringType::MostMessages, 10), at(0)).unwrap();
        send(&db, "A1", "B2", 5);
        send(&db, "B2", "A1", 6);
        send(&db, "B2", "C3", 7);

        let outcome = db.end_challenge_now(c.id, at(30)).unwrap();
        assert_eq!(outcome.winner.as_deref(), Some("B2"));
        assert_eq!(outcome.results.get("A1"), Some(&1.0));
        assert_eq!(outcome.results.get("B2"), Some(&2.0));

        assert!(matches!(db.end_challenge_now(c.id, at(31)), Err(GameError::StateConflict(_))));
        assert!(matches!(
            db.end_challenge_now(Uuid::new_v4(), at(31)),
            Err(GameError::NotFound(_))
        ));

        // Messages after the manual end do not change the stored result.
        send(&db, "A1", "B2", 40);
        send(&db, "A1", "B2", 41);
        let stored = db.get_challenge(c.id, at(50)).unwrap();
        assert_eq!(stored.winner.as_deref(), Some("B2"));
        assert_eq!(stored.results, Some(outcome.results));
        assert_eq!(db.table_badges("B2").unwrap().len(), 1);
    }

    #[test]
    fn messages_outside_window_are_ignored() {
        let db = game();
        send(&db, "C3", "A1", 1);
        let c = db.create_challenge(new_challenge(ScoringType::MostMessages, 1), at(2)).unwrap();
        send(&db, "A1", "C3", 30);
        send(&db, "C3", "A1", 63);
        send(&db, "C3", "A1", 64);

        let resolved = db.get_challenge(c.id, at(120)).unwrap();
        assert_eq!(resolved.winner.as_deref(), Some("A1"));
        let results = resolved.results.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn reactions_after_send_count_toward_reaction_challenges() {
        let db = game();
        let c = db.create_challenge(new_challenge(ScoringType::MostReactions, 5), at(0)).unwrap();
        let a = send(&db, "A1", "B2", 10);
        let b = send(&db, "B2", "A1", 11);
        db.toggle_reaction(a, "B2", ReactionKind::Fire).unwrap();
        db.toggle_reaction(a, "C3", ReactionKind::Heart).unwrap();
        db.toggle_reaction(b, "A1", ReactionKind::Laugh).unwrap();

        let outcome = db.end_challenge_now(c.id, at(100)).unwrap();
        assert_eq!(outcome.winner.as_deref(), Some("A1"));
        assert_eq!(outcome.results.get("A1"), Some(&2.0));
        assert_eq!(outcome.results.get("B2"), Some(&1.0));
    }

    #[test]
    fn participants_include_present_tables() {
        let db = db();
        let tables: Vec<_> = ["A1", "B2", "C3"]
            .iter()
            .map(|t| db.create_table(t, &[], at(0)).unwrap())
            .collect();
        db.apply_game_action(GameAction::Start, at(0)).unwrap();
        db.join_table("C3", &tables[2].join_code, "Grace", "Hopper", at(0)).unwrap();

        let c = db.create_challenge(new_challenge(ScoringType::MostMessages, 5), at(0)).unwrap();
        send(&db, "A1", "B2", 10);
        db.end_challenge_now(c.id, at(20)).unwrap();

        let stored = db.get_challenge(c.id, at(21)).unwrap();
        assert_eq!(stored.participants, vec!["A1".to_string(), "C3".to_string()]);
    }

    #[test]
    fn list_challenges_includes_history() {
        let db = game();
        let first = db.create_challenge(new_challenge(ScoringType::Speed, 1), at(0)).unwrap();
        let second = db.create_challenge(new_challenge(ScoringType::MostMessages, 30), at(10)).unwrap();

        let all = db.list_challenges(10, at(100)).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert!(all[0].active);
        assert_eq!(all[1].id, first.id);
        assert!(!all[1].active);
        assert_eq!(all[1].winner, None);
    }

    #[test]
    fn expiry_agrees_across_read_paths_below_a_millisecond() {
        let db = game();
        let created = at(0) + Duration::microseconds(400);
        let c = db.create_challenge(new_challenge(ScoringType::MostMessages, 1), created).unwrap();
        assert_eq!(c.ends_at, at(60));

        let stored = db.get_challenge(c.id, at(0)).unwrap();
        assert_eq!(stored.ends_at, c.ends_at);

        let just_after = at(60) + Duration::microseconds(900);
        assert_eq!(db.list_active_challenges(just_after).unwrap().len(), 1);
        assert!(db.get_challenge(c.id, just_after).unwrap().active);

        let later = at(60) + Duration::milliseconds(1);
        assert!(db.list_active_challenges(later).unwrap().is_empty());
        assert!(!db.get_challenge(c.id, later).unwrap().active);
    }
}

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use tabletalk_db::Database;
use tabletalk_db::challenges::NewChallenge;
use tabletalk_db::messages::NewMessage;
use tabletalk_types::models::{GameAction, ReactionKind, ReactionTally, ScoringType};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap() + Duration::seconds(secs)
}

fn game(tables: &[&str]) -> Database {
    let db = Database::open_in_memory().unwrap();
    for t in tables {
        db.create_table(t, &[], at(0)).unwrap();
    }
    db.apply_game_action(GameAction::Start, at(0)).unwrap();
    db
}

fn send(db: &Database, from: &str, to: &str, secs: i64) -> Uuid {
    db.send_message(
        NewMessage {
            content: "hi".into(),
            from_table: from.into(),
            to_table: to.into(),
            sender_name: "Guest".into(),
            is_anonymous: false,
        },
        at(secs),
    )
    .unwrap()
}

fn challenge(scoring_type: ScoringType, minutes: i64) -> NewChallenge {
    NewChallenge {
        title: "Round one".into(),
        description: None,
        scoring_type,
        duration_minutes: minutes,
        badge_name: "Loudest Table".into(),
        badge_emoji: "📣".into(),
    }
}

#[test]
fn most_messages_challenge_resolves_after_expiry() {
    let db = game(&["A1", "B2"]);
    let c = db.create_challenge(challenge(ScoringType::MostMessages, 1), at(0)).unwrap();

    for s in 1..=3 {
        send(&db, "A1", "B2", s);
    }
    for s in 10..15 {
        send(&db, "B2", "A1", s);
    }

    let active = db.list_active_challenges(at(90)).unwrap();
    assert!(active.is_empty());

    let resolved = db.get_challenge(c.id, at(91)).unwrap();
    assert_eq!(resolved.winner.as_deref(), Some("B2"));
    let results = resolved.results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results["A1"], 3.0);
    assert_eq!(results["B2"], 5.0);

    let badges = db.table_badges("B2").unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].challenge_id, c.id);
    assert_eq!(badges[0].challenge_title, "Round one");
    assert_eq!(badges[0].badge_emoji, "📣");
    assert!(db.table_badges("A1").unwrap().is_empty());
}

#[test]
fn speed_challenge_goes_to_first_table_to_five() {
    let db = game(&["X", "Y", "Z"]);
    let c = db.create_challenge(challenge(ScoringType::Speed, 5), at(0)).unwrap();

    for s in 0..=5 {
        send(&db, "Y", "Z", 1 + s);
    }
    for s in 0..=4 {
        send(&db, "X", "Z", s);
    }

    let outcome = db.end_challenge_now(c.id, at(60)).unwrap();
    assert_eq!(outcome.winner.as_deref(), Some("X"));
    assert_eq!(outcome.results["X"], 4.0);
    assert_eq!(outcome.results["Y"], 5.0);
}

#[test]
fn reaction_toggle_walkthrough() {
    let db = game(&["A1", "B2"]);
    let m = send(&db, "A1", "B2", 1);

    let s = db.toggle_reaction(m, "C3", ReactionKind::Heart).unwrap();
    assert_eq!(s.tally, ReactionTally { heart: 1, ..Default::default() });
    let s = db.toggle_reaction(m, "C3", ReactionKind::Fire).unwrap();
    assert_eq!(s.tally, ReactionTally { fire: 1, ..Default::default() });
    let s = db.toggle_reaction(m, "C3", ReactionKind::Fire).unwrap();
    assert_eq!(s.tally, ReactionTally::default());
    assert_eq!(s.active, None);
}

#[test]
fn tallies_match_markers_after_random_toggles() {
    let tables = ["A1", "B2", "C3", "D4", "E5"];
    let db = game(&tables);
    let messages: Vec<Uuid> = (0..3).map(|i| send(&db, "A1", "B2", i)).collect();

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..400 {
        let m = messages[rng.random_range(0..messages.len())];
        let t = tables[rng.random_range(0..tables.len())];
        let k = ReactionKind::ALL[rng.random_range(0..4)];
        db.toggle_reaction(m, t, k).unwrap();
    }

    for m in &messages {
        let mut expected = ReactionTally::default();
        let mut tally = None;
        for t in &tables {
            let state = db.reaction_state(*m, t).unwrap();
            if let Some(kind) = state.active {
                expected.increment(kind);
            }
            tally = Some(state.tally);
        }
        assert_eq!(tally, Some(expected));
    }
}

#[test]
fn double_toggle_restores_tally() {
    let db = game(&["A1", "B2"]);
    let m = send(&db, "A1", "B2", 1);
    db.toggle_reaction(m, "B2", ReactionKind::Laugh).unwrap();
    let before = db.reaction_state(m, "C3").unwrap().tally;

    for kind in ReactionKind::ALL {
        db.toggle_reaction(m, "C3", kind).unwrap();
        let after = db.toggle_reaction(m, "C3", kind).unwrap();
        assert_eq!(after.tally, before);
    }
}

#[test]
fn scores_never_decrease_on_sends_or_reactions() {
    let db = game(&["A1", "B2"]);
    let points = |db: &Database| -> f64 {
        db.compute_leaderboard(10)
            .unwrap()
            .into_iter()
            .find(|e| e.table_id == "A1")
            .map(|e| e.points)
            .unwrap_or(0.0)
    };

    let mut last = points(&db);
    let mut ids = Vec::new();
    for s in 0..4 {
        ids.push(send(&db, "A1", "B2", s));
        let now = points(&db);
        assert!(now > last);
        last = now;
    }
    for (i, kind) in ReactionKind::ALL.iter().enumerate() {
        db.toggle_reaction(ids[i], "B2", *kind).unwrap();
        let now = points(&db);
        assert!(now > last);
        last = now;
    }
    // 4 * 0.5 + 2.0 + 1.0 + 1.5 + 0.5
    assert_eq!(last, 7.0);
}

#[test]
fn broadcasts_do_not_score() {
    let db = game(&["A1", "B2"]);
    let b = db.send_broadcast("Welcome!", "Host", at(1)).unwrap();
    db.toggle_reaction(b, "A1", ReactionKind::Heart).unwrap();
    assert!(db.compute_leaderboard(10).unwrap().is_empty());
}

#[test]
fn concurrent_toggles_from_different_tables_all_count() {
    let tables: Vec<String> = (0..8).map(|i| format!("T{}", i)).collect();
    let names: Vec<&str> = tables.iter().map(String::as_str).collect();
    let db = Arc::new(game(&names));
    let m = send(&db, "T0", "T1", 1);

    let handles: Vec<_> = tables
        .iter()
        .cloned()
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || db.toggle_reaction(m, &t, ReactionKind::Heart).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(db.reaction_state(m, "T0").unwrap().tally.heart, 8);
}

#[test]
fn concurrent_toggles_from_one_table_stay_exclusive() {
    let db = Arc::new(game(&["A1", "B2"]));
    let m = send(&db, "A1", "B2", 1);

    let handles: Vec<_> = (0..9)
        .map(|i| {
            let db = db.clone();
            let kind = ReactionKind::ALL[i % 4];
            thread::spawn(move || db.toggle_reaction(m, "C3", kind).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let state = db.reaction_state(m, "C3").unwrap();
    assert!(state.tally.total() <= 1);
    assert_eq!(state.tally.total(), u32::from(state.active.is_some()));
}

#[test]
fn concurrent_expiry_awards_one_badge() {
    let db = Arc::new(game(&["A1", "B2"]));
    let c = db.create_challenge(challenge(ScoringType::MostMessages, 1), at(0)).unwrap();
    send(&db, "A1", "B2", 5);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            thread::spawn(move || {
                if i % 2 == 0 {
                    db.list_active_challenges(at(120)).unwrap();
                } else {
                    db.get_challenge(c.id, at(120)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(db.table_badges("A1").unwrap().len(), 1);
    let first = db.get_challenge(c.id, at(200)).unwrap();
    assert!(db.sweep_expired(at(300)).unwrap().is_empty());
    let second = db.get_challenge(c.id, at(300)).unwrap();
    assert_eq!(first.results, second.results);
    assert_eq!(first.winner, second.winner);
    assert_eq!(second.resolved_at, Some(at(120)));
}

#[test]
fn reset_keeps_badges() {
    let db = game(&["A1", "B2"]);
    let c = db.create_challenge(challenge(ScoringType::MostMessages, 1), at(0)).unwrap();
    send(&db, "A1", "B2", 5);
    db.end_challenge_now(c.id, at(10)).unwrap();

    db.reset_game().unwrap();
    assert!(db.compute_leaderboard(10).unwrap().is_empty());
    assert!(db.list_challenges(10, at(20)).unwrap().is_empty());
    assert_eq!(db.table_badges("A1").unwrap().len(), 1);
}

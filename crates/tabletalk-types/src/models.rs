use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

// -- Reactions --

/// The four emoji reactions a table can put on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Heart,
    Thumbsup,
    Fire,
    Laugh,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 4] = [Self::Heart, Self::Thumbsup, Self::Fire, Self::Laugh];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Thumbsup => "thumbsup",
            Self::Fire => "fire",
            Self::Laugh => "laugh",
        }
    }

    /// Leaderboard points the receiving table earns per reaction of this kind.
    pub fn points(self) -> f64 {
        match self {
            Self::Heart => 2.0,
            Self::Fire => 1.5,
            Self::Thumbsup => 1.0,
            Self::Laugh => 0.5,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart" => Ok(Self::Heart),
            "thumbsup" => Ok(Self::Thumbsup),
            "fire" => Ok(Self::Fire),
            "laugh" => Ok(Self::Laugh),
            other => Err(ParseEnumError::new("reaction", other)),
        }
    }
}

/// Per-message reaction counters shown to every viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    pub heart: u32,
    pub thumbsup: u32,
    pub fire: u32,
    pub laugh: u32,
}

impl ReactionTally {
    pub fn get(&self, kind: ReactionKind) -> u32 {
        match kind {
            ReactionKind::Heart => self.heart,
            ReactionKind::Thumbsup => self.thumbsup,
            ReactionKind::Fire => self.fire,
            ReactionKind::Laugh => self.laugh,
        }
    }

    fn slot(&mut self, kind: ReactionKind) -> &mut u32 {
        match kind {
            ReactionKind::Heart => &mut self.heart,
            ReactionKind::Thumbsup => &mut self.thumbsup,
            ReactionKind::Fire => &mut self.fire,
            ReactionKind::Laugh => &mut self.laugh,
        }
    }

    pub fn increment(&mut self, kind: ReactionKind) {
        let slot = self.slot(kind);
        *slot = slot.saturating_add(1);
    }

    /// Counters never go below zero, even if the stored state is inconsistent.
    pub fn decrement(&mut self, kind: ReactionKind) {
        let slot = self.slot(kind);
        *slot = slot.saturating_sub(1);
    }

    pub fn total(&self) -> u32 {
        self.heart + self.thumbsup + self.fire + self.laugh
    }

    pub fn points(&self) -> f64 {
        ReactionKind::ALL
            .iter()
            .map(|k| f64::from(self.get(*k)) * k.points())
            .sum()
    }
}

/// Result of a reaction toggle: the new tally and the table's remaining reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionState {
    pub tally: ReactionTally,
    pub active: Option<ReactionKind>,
}

// -- Game session --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    NotStarted,
    Active,
    Paused,
    Ended,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

impl FromStr for GameStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "ended" => Ok(Self::Ended),
            other => Err(ParseEnumError::new("game status", other)),
        }
    }
}

/// Admin actions that move the game session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameAction {
    Start,
    Pause,
    Resume,
    End,
}

impl GameAction {
    /// The status this action leads to from `from`, or `None` if not allowed.
    pub fn apply(self, from: GameStatus) -> Option<GameStatus> {
        use GameStatus::*;
        match (self, from) {
            (Self::Start, NotStarted | Ended) => Some(Active),
            (Self::Pause, Active) => Some(Paused),
            (Self::Resume, Paused) => Some(Active),
            (Self::End, Active | Paused) => Some(Ended),
            _ => None,
        }
    }
}

impl FromStr for GameAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "end" => Ok(Self::End),
            other => Err(ParseEnumError::new("game action", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub status: GameStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

// -- Roles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ControlGame,
    ManageTables,
    ManageChallenges,
    SendBroadcast,
    ViewAudit,
}

pub fn has_capability(role: Role, capability: Capability) -> bool {
    use Capability::*;
    match role {
        Role::Admin => true,
        Role::Staff => matches!(capability, ManageChallenges | SendBroadcast | ViewAudit),
        Role::Table => false,
    }
}

// -- Tables & presence --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
    pub active_users: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUser {
    pub id: Uuid,
    pub table_id: String,
    pub first_name: String,
    pub last_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub from_table: Option<String>,
    pub to_table: Option<String>,
    /// Real sender name; only exposed through the audit view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Name shown to other tables; `None` when sent anonymously.
    pub public_name: Option<String>,
    pub is_anonymous: bool,
    pub is_broadcast: bool,
    pub reactions: ReactionTally,
    /// The viewing table's current reaction, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_reaction: Option<ReactionKind>,
    pub created_at: DateTime<Utc>,
}

// -- Scoring --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub table_id: String,
    pub points: f64,
    pub messages: u32,
    pub reactions: u32,
}

// -- Challenges --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringType {
    MostMessages,
    MostReactions,
    Speed,
}

impl ScoringType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MostMessages => "most_messages",
            Self::MostReactions => "most_reactions",
            Self::Speed => "speed",
        }
    }
}

impl FromStr for ScoringType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "most_messages" => Ok(Self::MostMessages),
            "most_reactions" => Ok(Self::MostReactions),
            "speed" => Ok(Self::Speed),
            other => Err(ParseEnumError::new("scoring type", other)),
        }
    }
}

/// Per-table challenge scores, keyed by table id.
pub type ChallengeResults = BTreeMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub scoring_type: ScoringType,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
    pub badge_name: String,
    pub badge_emoji: String,
    pub winner: Option<String>,
    pub results: Option<ChallengeResults>,
    pub participants: Vec<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Challenge {
    /// `active` is only a hint until checked against the clock.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.active && now > self.ends_at
    }
}

/// Outcome of resolving a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeOutcome {
    pub challenge_id: Uuid,
    pub winner: Option<String>,
    pub results: ChallengeResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeAward {
    pub challenge_id: Uuid,
    pub table_id: String,
    pub badge_name: String,
    pub badge_emoji: String,
    pub challenge_title: String,
    pub awarded_at: DateTime<Utc>,
}

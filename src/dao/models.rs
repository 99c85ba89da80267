//! Entities making up the shared session document.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Opaque player identifier, generated by the joining client (or on its behalf).
pub type PlayerId = String;

/// Formatting difficulty applied to every snippet of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    /// Multi-line, indented snippet.
    Easy,
    /// Multi-line plain text without highlighting.
    Medium,
    /// Single line, minimal separators only.
    Hard,
    /// Single line, no whitespace, some identifiers blanked out.
    Hardcore,
}

/// Lifecycle status of a session. Transitions are monotonic:
/// waiting -> playing -> finished, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Lobby is open, players can still join.
    Waiting,
    /// Rounds are being played.
    Playing,
    /// All rounds are closed; the session is read-only.
    Finished,
}

/// Immutable settings fixed when the session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Total number of rounds to play (at least 1).
    pub round_count: u32,
    /// Difficulty applied to every generated snippet.
    pub difficulty: Difficulty,
    /// Candidate languages the generator may pick from.
    pub languages: Vec<String>,
}

/// A participant of the session and their running score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntity {
    /// Opaque identifier persisted by the client.
    pub id: PlayerId,
    /// Display name chosen when joining.
    pub name: String,
    /// Cumulative score, never negative.
    pub score: i32,
    /// Exactly one player per session carries this flag, fixed at first join.
    pub is_host: bool,
}

/// Generated round content, immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetEntity {
    /// Difficulty the snippet was formatted for.
    pub difficulty: Difficulty,
    /// Language the snippet is written in.
    pub language: String,
    /// The code shown to players.
    pub snippet: String,
    /// Expected answer; matches `language`.
    pub solution: String,
}

/// A single guess recorded for a player within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessEntity {
    /// Language the player guessed.
    pub language: String,
    /// Seconds between round start and the guess.
    pub elapsed_seconds: u64,
    /// Whether the guess matched the solution (case-insensitive).
    pub correct: bool,
}

/// Score outcome for one player of a closed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResultEntity {
    /// Points gained or lost this round.
    pub score_change: i32,
    /// Cumulative score after applying the change, clamped at zero.
    pub new_score: i32,
}

/// One play cycle: content reveal, guess collection, scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEntity {
    /// 1-based round number, matches the key in [`SessionEntity::rounds`].
    pub round_number: u32,
    /// Generated snippet, immutable for the lifetime of the round.
    pub content: SnippetEntity,
    /// Timestamp set once when the content was written.
    pub started_at: SystemTime,
    /// Guesses keyed by player id; at most one entry per player.
    pub guesses: IndexMap<PlayerId, GuessEntity>,
    /// Present once the round is closed. This is the sole terminal marker:
    /// scoring is computed in the same commit that writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<IndexMap<PlayerId, RoundResultEntity>>,
}

impl RoundEntity {
    /// Whether scoring has been committed for this round.
    pub fn is_closed(&self) -> bool {
        self.results.is_some()
    }
}

/// Aggregate session document persisted by the storage layer.
///
/// This is the only shared mutable resource between players; every
/// cross-player mutation goes through the store's transact primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntity {
    /// Primary key, assigned by the store on creation.
    pub id: Uuid,
    /// Settings fixed at creation time.
    pub settings: SessionSettings,
    /// Ordered roster; append-only via the store's set-union primitive.
    pub players: Vec<PlayerEntity>,
    /// Monotonic lifecycle status.
    pub status: SessionStatus,
    /// 0 while waiting, then the active round number, capped at `round_count`.
    pub current_round: u32,
    /// Rounds keyed by 1-based number; keys are created lazily, never removed.
    pub rounds: IndexMap<u32, RoundEntity>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the document was committed.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// The player carrying the host flag, if anyone has joined yet.
    pub fn host(&self) -> Option<&PlayerEntity> {
        self.players.iter().find(|player| player.is_host)
    }

    /// Look up a roster entry by player id.
    pub fn player(&self, id: &str) -> Option<&PlayerEntity> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Round entry for the given 1-based number, if content has been written.
    pub fn round(&self, number: u32) -> Option<&RoundEntity> {
        self.rounds.get(&number)
    }

    /// Round entry for the currently active round.
    pub fn current_round_entry(&self) -> Option<&RoundEntity> {
        self.rounds.get(&self.current_round)
    }
}

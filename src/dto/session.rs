//! Session request payloads and redacted response views.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{Difficulty, RoundEntity, SessionEntity, SessionStatus},
    dto::format_system_time,
};

/// Payload used to create a brand-new session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Number of rounds to play.
    #[validate(range(min = 1, max = 20))]
    pub round_count: u32,
    /// Snippet formatting difficulty for the whole session.
    pub difficulty: Difficulty,
    /// Candidate languages; empty means the server's default roster.
    #[serde(default)]
    #[validate(custom(function = crate::dto::validation::validate_languages))]
    pub languages: Vec<String>,
}

/// Payload used to join the lobby of a waiting session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    /// Display name shown to other players.
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    /// Identifier persisted by the client from a previous visit; a fresh one
    /// is generated when absent.
    #[serde(default)]
    pub player_id: Option<String>,
}

/// Payload used by the host to start the game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    /// Identifier of the calling player; must be the host.
    #[validate(length(min = 1))]
    pub player_id: String,
}

/// Payload carrying one player's guess for the active round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitGuessRequest {
    /// Identifier of the guessing player.
    #[validate(length(min = 1))]
    pub player_id: String,
    /// Round the guess addresses; must be the active round.
    #[validate(range(min = 1))]
    pub round_number: u32,
    /// The guessed language.
    #[validate(length(min = 1))]
    pub language: String,
}

/// Public projection of a session document.
///
/// The solution of the active round, and which language each player guessed,
/// are withheld until the round closes.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    /// Session identifier.
    pub id: Uuid,
    /// Immutable settings.
    pub settings: SettingsView,
    /// Roster in join order.
    pub players: Vec<PlayerView>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Active round number (0 while waiting).
    pub current_round: u32,
    /// All rounds written so far, oldest first.
    pub rounds: Vec<RoundView>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last commit timestamp (RFC 3339).
    pub updated_at: String,
}

/// Settings projection.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsView {
    /// Number of rounds to play.
    pub round_count: u32,
    /// Session-wide difficulty.
    pub difficulty: Difficulty,
    /// Candidate languages.
    pub languages: Vec<String>,
}

/// Roster entry projection.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    /// Opaque player identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: i32,
    /// Whether this player is the host.
    pub is_host: bool,
}

/// One round as exposed to players.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundView {
    /// 1-based round number.
    pub round_number: u32,
    /// Formatting difficulty of the snippet.
    pub difficulty: Difficulty,
    /// The code to identify.
    pub snippet: String,
    /// Round start timestamp (RFC 3339).
    pub started_at: String,
    /// Guesses recorded so far; redacted while the round is open.
    pub guesses: Vec<GuessView>,
    /// The answer, present only once the round is closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Per-player score outcomes, present only once the round is closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<PlayerResultView>>,
}

/// One recorded guess. While the round is open only the guesser's identity
/// is revealed, so players cannot copy each other.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessView {
    /// Who guessed.
    pub player_id: String,
    /// Seconds into the round the guess arrived.
    pub elapsed_seconds: u64,
    /// What was guessed; withheld until the round closes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Whether it was right; withheld until the round closes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

/// Score outcome of a closed round for one player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerResultView {
    /// Player the result belongs to.
    pub player_id: String,
    /// Points gained or lost.
    pub score_change: i32,
    /// Cumulative score after the round.
    pub new_score: i32,
}

/// Response returned when a player joins a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    /// Identifier the client must persist and reuse for all later calls.
    pub player_id: String,
    /// The session after the join.
    pub session: SessionView,
}

impl From<&SessionEntity> for SessionView {
    fn from(entity: &SessionEntity) -> Self {
        Self {
            id: entity.id,
            settings: SettingsView {
                round_count: entity.settings.round_count,
                difficulty: entity.settings.difficulty,
                languages: entity.settings.languages.clone(),
            },
            players: entity
                .players
                .iter()
                .map(|player| PlayerView {
                    id: player.id.clone(),
                    name: player.name.clone(),
                    score: player.score,
                    is_host: player.is_host,
                })
                .collect(),
            status: entity.status,
            current_round: entity.current_round,
            rounds: entity.rounds.values().map(RoundView::from).collect(),
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}

impl From<&RoundEntity> for RoundView {
    fn from(round: &RoundEntity) -> Self {
        let closed = round.is_closed();
        Self {
            round_number: round.round_number,
            difficulty: round.content.difficulty,
            snippet: round.content.snippet.clone(),
            started_at: format_system_time(round.started_at),
            guesses: round
                .guesses
                .iter()
                .map(|(player_id, guess)| GuessView {
                    player_id: player_id.clone(),
                    elapsed_seconds: guess.elapsed_seconds,
                    language: closed.then(|| guess.language.clone()),
                    correct: closed.then_some(guess.correct),
                })
                .collect(),
            solution: closed.then(|| round.content.solution.clone()),
            results: round.results.as_ref().map(|results| {
                results
                    .iter()
                    .map(|(player_id, result)| PlayerResultView {
                        player_id: player_id.clone(),
                        score_change: result.score_change,
                        new_score: result.new_score,
                    })
                    .collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use indexmap::IndexMap;

    use super::*;
    use crate::dao::models::{GuessEntity, RoundResultEntity, SnippetEntity};

    fn round(closed: bool) -> RoundEntity {
        let mut guesses = IndexMap::new();
        guesses.insert(
            "p1".to_string(),
            GuessEntity {
                language: "Python".into(),
                elapsed_seconds: 7,
                correct: true,
            },
        );
        RoundEntity {
            round_number: 1,
            content: SnippetEntity {
                difficulty: Difficulty::Medium,
                language: "Python".into(),
                snippet: "print('hi')".into(),
                solution: "Python".into(),
            },
            started_at: SystemTime::now(),
            guesses,
            results: closed.then(|| {
                let mut results = IndexMap::new();
                results.insert(
                    "p1".to_string(),
                    RoundResultEntity {
                        score_change: 165,
                        new_score: 165,
                    },
                );
                results
            }),
        }
    }

    #[test]
    fn open_rounds_hide_solution_and_guess_content() {
        let view = RoundView::from(&round(false));
        assert!(view.solution.is_none());
        assert!(view.results.is_none());
        assert!(view.guesses[0].language.is_none());
        assert!(view.guesses[0].correct.is_none());
        assert_eq!(view.guesses[0].player_id, "p1");
    }

    #[test]
    fn closed_rounds_reveal_everything() {
        let view = RoundView::from(&round(true));
        assert_eq!(view.solution.as_deref(), Some("Python"));
        assert_eq!(view.guesses[0].language.as_deref(), Some("Python"));
        assert_eq!(view.guesses[0].correct, Some(true));
        let results = view.results.unwrap();
        assert_eq!(results[0].new_score, 165);
    }
}

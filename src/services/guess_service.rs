//! Guess submission.

use std::{sync::Arc, time::SystemTime};

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::{
        models::{GuessEntity, SessionEntity, SessionStatus},
        session_store::{Mutation, MutationDecision, TransactOutcome},
    },
    error::ServiceError,
    services::session_service,
    state::{SharedState, lifecycle},
};

/// Record one player's guess for the active round.
///
/// At most one guess per player per round is ever counted. The precondition
/// checks below give callers precise errors, but they race against the host
/// closing the round and against the player's own retries, so the mutation
/// re-validates everything against the snapshot it actually commits on and
/// skips when the guess no longer fits.
pub async fn submit_guess(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    round_number: u32,
    language: &str,
) -> Result<SessionEntity, ServiceError> {
    let snapshot = session_service::get_session(state, session_id).await?;
    if snapshot.status != SessionStatus::Playing {
        return Err(ServiceError::InvalidState(
            "session is not currently playing".into(),
        ));
    }
    if snapshot.player(player_id).is_none() {
        return Err(ServiceError::Unauthorized(
            "player is not part of this session".into(),
        ));
    }
    if round_number != snapshot.current_round {
        return Err(ServiceError::InvalidState(format!(
            "round {round_number} is not the active round"
        )));
    }
    match lifecycle::round_phase(&snapshot, round_number) {
        lifecycle::RoundPhase::Pending => {
            return Err(ServiceError::InvalidState(
                "round content has not been revealed yet".into(),
            ));
        }
        lifecycle::RoundPhase::Closed => {
            return Err(ServiceError::InvalidState(
                "round is already closed".into(),
            ));
        }
        lifecycle::RoundPhase::Active => {}
    }
    if let Some(round) = snapshot.round(round_number)
        && round.guesses.contains_key(player_id)
    {
        return Err(ServiceError::AlreadyGuessed);
    }

    let now = SystemTime::now();
    let guesser = player_id.to_string();
    let guessed = language.trim().to_string();
    let mutation: Mutation = Arc::new(move |mut doc: SessionEntity| {
        if doc.status != SessionStatus::Playing || doc.current_round != round_number {
            return MutationDecision::Skip;
        }
        let Some(round) = doc.rounds.get_mut(&round_number) else {
            return MutationDecision::Skip;
        };
        if round.is_closed() || round.guesses.contains_key(&guesser) {
            return MutationDecision::Skip;
        }

        let correct = guessed.eq_ignore_ascii_case(&round.content.solution);
        let elapsed_seconds = lifecycle::elapsed_seconds(round, now);
        round.guesses.insert(
            guesser.clone(),
            GuessEntity {
                language: guessed.clone(),
                elapsed_seconds,
                correct,
            },
        );
        MutationDecision::Commit(doc)
    });

    match state.store().transact(session_id, mutation).await? {
        TransactOutcome::Committed(session) => {
            debug!(session = %session_id, player = %player_id, round = round_number, "guess recorded");
            Ok(session)
        }
        TransactOutcome::Skipped(latest) => {
            let already = latest
                .round(round_number)
                .is_some_and(|round| round.guesses.contains_key(player_id));
            if already {
                Err(ServiceError::AlreadyGuessed)
            } else {
                Err(ServiceError::InvalidState(
                    "round no longer accepts guesses".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indexmap::IndexMap;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{Difficulty, RoundEntity, SnippetEntity},
            session_store::{SessionStore, memory::MemorySessionStore},
        },
        generator::canned::CannedGenerator,
        services::session_service::{create_session, join_session},
        state::AppState,
    };

    fn test_state() -> SharedState {
        AppState::new(
            AppConfig::for_tests(Duration::from_secs(30), Duration::from_millis(20)),
            Arc::new(MemorySessionStore::new()),
            Arc::new(CannedGenerator::new()),
        )
    }

    /// Create a playing session with an active first round, bypassing the
    /// host controller so the round content is deterministic.
    async fn playing_session(state: &SharedState, players: &[&str]) -> Uuid {
        let session = create_session(state, 2, Difficulty::Medium, vec!["Python".into()])
            .await
            .unwrap();
        for player in players {
            join_session(state, session.id, (*player).into(), Some((*player).into()))
                .await
                .unwrap();
        }

        let mutation: Mutation = Arc::new(|mut doc: SessionEntity| {
            doc.status = SessionStatus::Playing;
            doc.current_round = 1;
            doc.rounds.insert(
                1,
                RoundEntity {
                    round_number: 1,
                    content: SnippetEntity {
                        difficulty: Difficulty::Medium,
                        language: "Python".into(),
                        snippet: "print('hi')".into(),
                        solution: "Python".into(),
                    },
                    started_at: SystemTime::now(),
                    guesses: IndexMap::new(),
                    results: None,
                },
            );
            MutationDecision::Commit(doc)
        });
        state.store().transact(session.id, mutation).await.unwrap();
        session.id
    }

    #[tokio::test]
    async fn guess_is_matched_case_insensitively() {
        let state = test_state();
        let id = playing_session(&state, &["a"]).await;

        let doc = submit_guess(&state, id, "a", 1, "python").await.unwrap();
        let guess = &doc.rounds[&1].guesses["a"];
        assert!(guess.correct);
        assert_eq!(guess.language, "python");
    }

    #[tokio::test]
    async fn second_guess_from_the_same_player_is_rejected() {
        let state = test_state();
        let id = playing_session(&state, &["a"]).await;

        submit_guess(&state, id, "a", 1, "Ruby").await.unwrap();
        let err = submit_guess(&state, id, "a", 1, "Python").await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyGuessed));

        let doc = state.store().read(id).await.unwrap().unwrap();
        assert_eq!(doc.rounds[&1].guesses.len(), 1);
        assert_eq!(doc.rounds[&1].guesses["a"].language, "Ruby");
    }

    #[tokio::test]
    async fn outsiders_cannot_guess() {
        let state = test_state();
        let id = playing_session(&state, &["a"]).await;

        let err = submit_guess(&state, id, "stranger", 1, "Python")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn guessing_a_stale_round_is_rejected() {
        let state = test_state();
        let id = playing_session(&state, &["a"]).await;

        let err = submit_guess(&state, id, "a", 2, "Python").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn guessing_a_closed_round_is_rejected() {
        let state = test_state();
        let id = playing_session(&state, &["a"]).await;

        let close: Mutation = Arc::new(|mut doc: SessionEntity| {
            if let Some(round) = doc.rounds.get_mut(&1) {
                round.results = Some(IndexMap::new());
            }
            MutationDecision::Commit(doc)
        });
        state.store().transact(id, close).await.unwrap();

        let err = submit_guess(&state, id, "a", 1, "Python").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}

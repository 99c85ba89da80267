//! Host controller: one background task per playing session.
//!
//! The controller is the only writer of round content and round results. It
//! never assumes it is alone: every write goes through a guarded transaction
//! whose mutation checks a completion marker (the round key for opens, the
//! results map for closes) and skips when the marker is already there. Running
//! two controllers against the same session is therefore wasteful but safe.

use std::{sync::Arc, time::SystemTime};

use indexmap::IndexMap;
use tokio::{
    sync::broadcast::error::RecvError,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{RoundEntity, SessionEntity, SessionStatus},
        session_store::{Mutation, MutationDecision, TransactOutcome},
    },
    dto::sse::{NoticeEvent, ServerEvent},
    error::ServiceError,
    generator::SnippetRequest,
    state::{
        SharedState,
        lifecycle::{self, CloseReason, RoundPhase},
    },
};

/// Spawn the controller task for a session unless one is already registered.
pub fn spawn_host(state: &SharedState, session_id: Uuid) {
    if state.host_running(session_id) {
        return;
    }
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        if let Err(err) = run_host(&task_state, session_id).await {
            warn!(session = %session_id, error = %err, "host controller stopped on error");
        }
        task_state.forget_host(session_id);
    });
    state.register_host(session_id, handle);
}

/// Drive the session from its first round to the finished state.
///
/// Wakes on every committed snapshot and on a periodic tick (the tick covers
/// the case where nothing commits, which is exactly when a timeout close is
/// due), then re-reads the document and acts on what it sees. All decisions
/// are functions of the latest snapshot, so a missed wakeup only delays
/// progress until the next tick.
async fn run_host(state: &SharedState, session_id: Uuid) -> Result<(), ServiceError> {
    let store = state.store();
    let mut feed = store.subscribe(session_id).await?;
    let mut tick = time::interval(state.config().host_tick());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(session = %session_id, "host controller started");

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            update = feed.recv() => match update {
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(session = %session_id, skipped, "host controller lagged behind the feed");
                }
                Err(RecvError::Closed) => break,
            },
        }

        let Some(snapshot) = store.read(session_id).await? else {
            break;
        };
        match snapshot.status {
            SessionStatus::Waiting => continue,
            SessionStatus::Finished => break,
            SessionStatus::Playing => {}
        }

        let round_number = snapshot.current_round;
        match lifecycle::round_phase(&snapshot, round_number) {
            RoundPhase::Pending => {
                if let Err(err) = open_round(state, &snapshot, round_number).await {
                    warn!(
                        session = %session_id,
                        round = round_number,
                        error = %err,
                        "failed to open round, retrying on next tick"
                    );
                    notify(state, session_id, "snippet generation failed, retrying");
                }
            }
            RoundPhase::Active => {
                if let Some(round) = snapshot.round(round_number)
                    && let Some(reason) = lifecycle::termination_reason(
                        &snapshot,
                        round,
                        SystemTime::now(),
                        state.config().round_time_limit(),
                    )
                {
                    settle_round(state, session_id, round_number, reason).await?;
                }
            }
            // The snapshot already moved past this round; the next wakeup
            // sees the new current round.
            RoundPhase::Closed => {}
        }
    }

    info!(session = %session_id, "host controller finished");
    Ok(())
}

/// Generate content for the round and commit it under the "round key absent"
/// guard. A concurrent open wins the race cleanly: our transaction skips and
/// the generated snippet is dropped.
async fn open_round(
    state: &SharedState,
    snapshot: &SessionEntity,
    round_number: u32,
) -> Result<(), ServiceError> {
    let request = SnippetRequest::new(
        snapshot.settings.difficulty,
        snapshot.settings.languages.clone(),
    );
    let generated = state.generator().generate(request).await?;

    let round = RoundEntity {
        round_number,
        content: generated.into(),
        started_at: SystemTime::now(),
        guesses: IndexMap::new(),
        results: None,
    };
    let mutation: Mutation = Arc::new(move |doc: SessionEntity| {
        if lifecycle::round_phase(&doc, round_number) != RoundPhase::Pending {
            return MutationDecision::Skip;
        }
        match lifecycle::start_round(doc, round.clone()) {
            Ok(updated) => MutationDecision::Commit(updated),
            Err(_) => MutationDecision::Skip,
        }
    });

    match state.store().transact(snapshot.id, mutation).await? {
        TransactOutcome::Committed(_) => {
            info!(session = %snapshot.id, round = round_number, "opened round");
        }
        TransactOutcome::Skipped(_) => {
            debug!(session = %snapshot.id, round = round_number, "round already open");
        }
    }
    Ok(())
}

/// Close the round under the "results absent" guard: scoring, score
/// application, and the advance (or finish) land in one commit, and a round
/// that is already closed is left exactly as it is.
async fn settle_round(
    state: &SharedState,
    session_id: Uuid,
    round_number: u32,
    reason: CloseReason,
) -> Result<(), ServiceError> {
    let time_limit_secs = state.config().round_time_limit().as_secs();
    let mutation: Mutation = Arc::new(move |doc: SessionEntity| {
        if lifecycle::round_phase(&doc, round_number) == RoundPhase::Closed {
            return MutationDecision::Skip;
        }
        match lifecycle::close_round(doc, round_number, time_limit_secs) {
            Ok(updated) => MutationDecision::Commit(updated),
            Err(_) => MutationDecision::Skip,
        }
    });

    match state.store().transact(session_id, mutation).await? {
        TransactOutcome::Committed(doc) => {
            info!(
                session = %session_id,
                round = round_number,
                reason = ?reason,
                status = ?doc.status,
                "closed round"
            );
        }
        TransactOutcome::Skipped(_) => {
            debug!(session = %session_id, round = round_number, "round already closed");
        }
    }
    Ok(())
}

/// Broadcast a non-fatal notice to the session's SSE subscribers.
fn notify(state: &SharedState, session_id: Uuid, message: &str) {
    let notice = NoticeEvent {
        message: message.to_string(),
    };
    if let Ok(event) = ServerEvent::json("notice".to_string(), &notice) {
        state.session_hub(session_id).broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{Difficulty, GuessEntity, SnippetEntity},
            session_store::{SessionStore, memory::MemorySessionStore},
        },
        generator::{GeneratedSnippet, GeneratorError, SnippetGenerator},
        services::{
            guess_service::submit_guess,
            session_service::{create_session, join_session, start_session},
        },
        state::AppState,
    };

    /// Always produces the same Python snippet, so tests know the solution.
    struct ScriptedGenerator;

    impl SnippetGenerator for ScriptedGenerator {
        fn generate(
            &self,
            request: SnippetRequest,
        ) -> BoxFuture<'static, Result<GeneratedSnippet, GeneratorError>> {
            Box::pin(async move {
                Ok(GeneratedSnippet {
                    difficulty: request.difficulty,
                    language: "Python".into(),
                    snippet: "print('hi')".into(),
                    solution: "Python".into(),
                })
            })
        }
    }

    /// Fails the first `failures` calls, then behaves like [`ScriptedGenerator`].
    struct FlakyGenerator {
        failures: AtomicUsize,
    }

    impl SnippetGenerator for FlakyGenerator {
        fn generate(
            &self,
            request: SnippetRequest,
        ) -> BoxFuture<'static, Result<GeneratedSnippet, GeneratorError>> {
            let fail = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                    left.checked_sub(1)
                })
                .is_ok();
            Box::pin(async move {
                if fail {
                    return Err(GeneratorError::Rejected("scripted failure".into()));
                }
                ScriptedGenerator.generate(request).await
            })
        }
    }

    fn test_state(generator: Arc<dyn SnippetGenerator>) -> SharedState {
        AppState::new(
            AppConfig::for_tests(Duration::from_secs(30), Duration::from_millis(10)),
            Arc::new(MemorySessionStore::new()),
            generator,
        )
    }

    async fn wait_for(
        state: &SharedState,
        session_id: Uuid,
        predicate: impl Fn(&SessionEntity) -> bool,
    ) -> SessionEntity {
        time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(doc) = state.store().read(session_id).await.unwrap()
                    && predicate(&doc)
                {
                    return doc;
                }
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session never reached the expected state")
    }

    /// Install an active round with the given guesses, skipping generation.
    async fn install_active_round(
        state: &SharedState,
        session_id: Uuid,
        guesses: &[(&str, &str, u64)],
    ) {
        let guesses: IndexMap<_, _> = guesses
            .iter()
            .map(|(player, language, elapsed)| {
                (
                    player.to_string(),
                    GuessEntity {
                        language: language.to_string(),
                        elapsed_seconds: *elapsed,
                        correct: language.eq_ignore_ascii_case("Python"),
                    },
                )
            })
            .collect();
        let mutation: Mutation = Arc::new(move |mut doc: SessionEntity| {
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
                    guesses: guesses.clone(),
                    results: None,
                },
            );
            MutationDecision::Commit(doc)
        });
        state.store().transact(session_id, mutation).await.unwrap();
    }

    #[tokio::test]
    async fn settling_twice_scores_once() {
        let state = test_state(Arc::new(ScriptedGenerator));
        let session = create_session(&state, 2, Difficulty::Medium, vec!["Python".into()])
            .await
            .unwrap();
        join_session(&state, session.id, "Alice".into(), Some("a".into()))
            .await
            .unwrap();
        install_active_round(&state, session.id, &[("a", "Python", 10)]).await;

        settle_round(&state, session.id, 1, CloseReason::AllGuessed)
            .await
            .unwrap();
        let first = state.store().read(session.id).await.unwrap().unwrap();

        settle_round(&state, session.id, 1, CloseReason::TimeLimit)
            .await
            .unwrap();
        let second = state.store().read(session.id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.player("a").unwrap().score, 50 + 20 * 5);
        assert_eq!(first.current_round, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_close_attempts_commit_once() {
        let state = test_state(Arc::new(ScriptedGenerator));
        let session = create_session(&state, 1, Difficulty::Medium, vec!["Python".into()])
            .await
            .unwrap();
        join_session(&state, session.id, "Alice".into(), Some("a".into()))
            .await
            .unwrap();
        install_active_round(&state, session.id, &[("a", "Python", 4)]).await;

        let commits = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = state.store();
            let commits = commits.clone();
            let id = session.id;
            tasks.push(tokio::spawn(async move {
                let mutation: Mutation = Arc::new(|doc: SessionEntity| {
                    if lifecycle::round_phase(&doc, 1) == RoundPhase::Closed {
                        return MutationDecision::Skip;
                    }
                    match lifecycle::close_round(doc, 1, 30) {
                        Ok(updated) => MutationDecision::Commit(updated),
                        Err(_) => MutationDecision::Skip,
                    }
                });
                if let TransactOutcome::Committed(_) = store.transact(id, mutation).await.unwrap() {
                    commits.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(commits.load(Ordering::SeqCst), 1);
        let doc = state.store().read(session.id).await.unwrap().unwrap();
        assert_eq!(doc.player("a").unwrap().score, 50 + 26 * 5);
        assert_eq!(doc.status, SessionStatus::Finished);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn two_player_session_plays_to_finish() {
        let state = test_state(Arc::new(ScriptedGenerator));
        let session = create_session(&state, 2, Difficulty::Medium, vec!["Python".into()])
            .await
            .unwrap();
        let (alice, _) = join_session(&state, session.id, "Alice".into(), Some("a".into()))
            .await
            .unwrap();
        let (bob, _) = join_session(&state, session.id, "Bob".into(), Some("b".into()))
            .await
            .unwrap();

        let mut feed = state.store().subscribe(session.id).await.unwrap();
        start_session(&state, session.id, &alice).await.unwrap();

        // Round 1: Alice right, Bob wrong. Closes once both have guessed.
        wait_for(&state, session.id, |doc| doc.round(1).is_some()).await;
        submit_guess(&state, session.id, &alice, 1, "Python")
            .await
            .unwrap();
        submit_guess(&state, session.id, &bob, 1, "Ruby")
            .await
            .unwrap();
        let doc = wait_for(&state, session.id, |doc| {
            doc.round(1).is_some_and(RoundEntity::is_closed)
        })
        .await;

        let results = doc.rounds[&1].results.as_ref().unwrap();
        let elapsed = doc.rounds[&1].guesses["a"].elapsed_seconds as i32;
        assert_eq!(results["a"].score_change, 50 + (30 - elapsed) * 5);
        assert_eq!(results["b"].score_change, -25);
        assert_eq!(results["b"].new_score, 0);
        assert_eq!(doc.player("b").unwrap().score, 0);
        assert_eq!(doc.current_round, 2);

        // Round 2: both right.
        wait_for(&state, session.id, |doc| doc.round(2).is_some()).await;
        submit_guess(&state, session.id, &alice, 2, "Python")
            .await
            .unwrap();
        submit_guess(&state, session.id, &bob, 2, "python")
            .await
            .unwrap();
        let finished = wait_for(&state, session.id, |doc| {
            doc.status == SessionStatus::Finished
        })
        .await;

        assert_eq!(finished.current_round, 2);
        assert!(finished.player("a").unwrap().score > finished.player("b").unwrap().score);
        assert!(finished.player("b").unwrap().score >= 50);

        // Every observed snapshot advances the round only after the
        // previous round carries its results.
        let mut last_round = 0;
        while let Ok(snapshot) = feed.try_recv() {
            assert!(snapshot.current_round >= last_round);
            if snapshot.current_round > 1 {
                assert!(snapshot.rounds[&1].is_closed());
            }
            last_round = snapshot.current_round;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generation_failures_are_retried() {
        let state = test_state(Arc::new(FlakyGenerator {
            failures: AtomicUsize::new(2),
        }));
        let session = create_session(&state, 1, Difficulty::Medium, vec!["Python".into()])
            .await
            .unwrap();
        let (alice, _) = join_session(&state, session.id, "Alice".into(), Some("a".into()))
            .await
            .unwrap();

        let mut notices = state.session_hub(session.id).subscribe();
        start_session(&state, session.id, &alice).await.unwrap();

        let doc = wait_for(&state, session.id, |doc| doc.round(1).is_some()).await;
        assert_eq!(doc.rounds[&1].content.solution, "Python");

        // The hub also carries session snapshots; skip those.
        time::timeout(Duration::from_secs(1), async {
            loop {
                let event = notices.recv().await.unwrap();
                if event.event.as_deref() == Some("notice") {
                    return;
                }
            }
        })
        .await
        .expect("no notice before the deadline");
    }
}

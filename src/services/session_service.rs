//! Session lifecycle operations: create, join, start, read.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{Difficulty, PlayerEntity, SessionEntity, SessionSettings, SessionStatus},
        session_store::{Mutation, MutationDecision, TransactOutcome},
    },
    error::ServiceError,
    services::{host_service, sse_service},
    state::SharedState,
};

/// Create a fresh session in the waiting state and start bridging its change
/// feed onto the SSE hub.
pub async fn create_session(
    state: &SharedState,
    round_count: u32,
    difficulty: Difficulty,
    languages: Vec<String>,
) -> Result<SessionEntity, ServiceError> {
    let languages = if languages.is_empty() {
        state.config().languages().to_vec()
    } else {
        languages
            .into_iter()
            .map(|language| language.trim().to_string())
            .collect()
    };

    let settings = SessionSettings {
        round_count,
        difficulty,
        languages,
    };
    let session = state.store().create_session(settings).await?;

    sse_service::spawn_session_feed(state.clone(), session.id);
    info!(
        session = %session.id,
        rounds = session.settings.round_count,
        "created session"
    );
    Ok(session)
}

/// Read the latest snapshot of a session.
pub async fn get_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionEntity, ServiceError> {
    state
        .store()
        .read(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
}

/// Add a player to the lobby of a waiting session.
///
/// Joining is an atomic set-union append: replaying the same player id is a
/// no-op, and whoever lands first in the roster becomes host. Returns the
/// effective player id (generated here when the client did not supply one)
/// along with the session as committed.
pub async fn join_session(
    state: &SharedState,
    session_id: Uuid,
    name: String,
    player_id: Option<String>,
) -> Result<(String, SessionEntity), ServiceError> {
    let snapshot = get_session(state, session_id).await?;
    if snapshot.status != SessionStatus::Waiting {
        return Err(ServiceError::InvalidState(
            "session is no longer accepting players".into(),
        ));
    }

    let player_id = player_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let player = PlayerEntity {
        id: player_id.clone(),
        name: name.trim().to_string(),
        score: 0,
        is_host: false,
    };
    let session = state.store().append_player(session_id, player).await?;

    info!(session = %session_id, player = %player_id, "player joined");
    Ok((player_id, session))
}

/// Start the game. Only the host may call this, and only once: a concurrent
/// or repeated start skips inside the transaction and is reported as a
/// conflict.
pub async fn start_session(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
) -> Result<SessionEntity, ServiceError> {
    let snapshot = get_session(state, session_id).await?;
    let Some(host) = snapshot.host() else {
        return Err(ServiceError::InvalidState(
            "nobody has joined this session yet".into(),
        ));
    };
    if host.id != player_id {
        return Err(ServiceError::Unauthorized(
            "only the host can start the session".into(),
        ));
    }

    let mutation: Mutation = Arc::new(|mut doc: SessionEntity| {
        if doc.status != SessionStatus::Waiting {
            return MutationDecision::Skip;
        }
        doc.status = SessionStatus::Playing;
        doc.current_round = 1;
        MutationDecision::Commit(doc)
    });

    match state.store().transact(session_id, mutation).await? {
        TransactOutcome::Committed(session) => {
            info!(session = %session_id, "session started");
            host_service::spawn_host(state, session_id);
            Ok(session)
        }
        TransactOutcome::Skipped(_) => Err(ServiceError::InvalidState(
            "session has already been started".into(),
        )),
    }
}

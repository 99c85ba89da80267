//! Live session updates over SSE.

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

/// SSE routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/sessions/{id}/events", get(session_events))
}

/// Stream session snapshots and notices for one session.
///
/// Opens with a `session` event carrying the current state, then pushes a new
/// `session` event after every commit, plus occasional `notice` events.
#[utoipa::path(
    get,
    path = "/sessions/{id}/events",
    tag = "events",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "SSE stream of session events", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn session_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    Ok(sse_service::session_stream(&state, id).await?)
}

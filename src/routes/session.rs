//! Session lifecycle and guessing endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::session::{
        CreateSessionRequest, JoinSessionRequest, JoinSessionResponse, SessionView,
        StartSessionRequest, SubmitGuessRequest,
    },
    error::AppError,
    services::{guess_service, session_service},
    state::SharedState,
};

/// Session routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/players", post(join_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/guesses", post(submit_guess))
}

/// Create a new session in the waiting state.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 400, description = "Invalid settings"),
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = session_service::create_session(
        &state,
        request.round_count,
        request.difficulty,
        request.languages,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(SessionView::from(&session))))
}

/// Fetch the current state of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Current session state", body = SessionView),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_service::get_session(&state, id).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Join the lobby of a waiting session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/players",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Joined the session", body = JoinSessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already started"),
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<JoinSessionRequest>>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    let (player_id, session) =
        session_service::join_session(&state, id, request.name, request.player_id).await?;
    Ok(Json(JoinSessionResponse {
        player_id,
        session: SessionView::from(&session),
    }))
}

/// Start the game. Host only.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = SessionView),
        (status = 401, description = "Caller is not the host"),
        (status = 409, description = "Session already started"),
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<StartSessionRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_service::start_session(&state, id, &request.player_id).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Submit a guess for the active round.
#[utoipa::path(
    post,
    path = "/sessions/{id}/guesses",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = SubmitGuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = SessionView),
        (status = 409, description = "Already guessed or round closed"),
        (status = 401, description = "Player is not in the session"),
    )
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<SubmitGuessRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let session = guess_service::submit_guess(
        &state,
        id,
        &request.player_id,
        request.round_number,
        &request.language,
    )
    .await?;
    Ok(Json(SessionView::from(&session)))
}

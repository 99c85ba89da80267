//! OpenAPI description of the HTTP surface.

use utoipa::OpenApi;

use crate::{
    dao::models::{Difficulty, SessionStatus},
    dto::{
        health::HealthResponse,
        session::{
            CreateSessionRequest, GuessView, JoinSessionRequest, JoinSessionResponse,
            PlayerResultView, PlayerView, RoundView, SessionView, SettingsView,
            StartSessionRequest, SubmitGuessRequest,
        },
        sse::NoticeEvent,
    },
};

/// Aggregated OpenAPI document served through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "codeguess-back",
        description = "Backend for a multiplayer guess-the-language game: \
            sessions, lobby, round synchronization, and live updates over SSE."
    ),
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::join_session,
        crate::routes::session::start_session,
        crate::routes::session::submit_guess,
        crate::routes::sse::session_events,
    ),
    components(schemas(
        CreateSessionRequest,
        JoinSessionRequest,
        StartSessionRequest,
        SubmitGuessRequest,
        JoinSessionResponse,
        SessionView,
        SettingsView,
        PlayerView,
        RoundView,
        GuessView,
        PlayerResultView,
        HealthResponse,
        NoticeEvent,
        Difficulty,
        SessionStatus,
    )),
    tags(
        (name = "sessions", description = "Session lifecycle and guessing"),
        (name = "events", description = "Live session updates over SSE"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

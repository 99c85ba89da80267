//! codeguess-back binary entrypoint wiring REST, SSE, storage, and generation layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codeguess_back::{
    config::AppConfig,
    dao::session_store::{SessionStore, memory::MemorySessionStore},
    generator::{SnippetGenerator, canned::CannedGenerator},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let generator = build_generator();
    let app_state = AppState::new(config, store, generator);

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the snippet generation backend from the environment: an external
/// service when `GENERATOR_URL` is set, the embedded corpus otherwise.
fn build_generator() -> Arc<dyn SnippetGenerator> {
    #[cfg(feature = "http-generator")]
    if let Ok(endpoint) = env::var("GENERATOR_URL")
        && !endpoint.is_empty()
    {
        info!(%endpoint, "using external snippet generation service");
        return Arc::new(codeguess_back::generator::http::HttpSnippetGenerator::new(
            endpoint,
        ));
    }

    info!("using embedded snippet corpus");
    Arc::new(CannedGenerator::new())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: codeguess_back::state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

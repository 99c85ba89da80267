//! Health probing.

use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the store and report the backend's health.
pub async fn check(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "store health probe failed");
            HealthResponse::degraded()
        }
    }
}

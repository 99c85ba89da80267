//! Health endpoint payloads.

use serde::Serialize;
use utoipa::ToSchema;

/// Health status reported by the backend.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when the store answered the probe, `degraded` otherwise.
    pub status: String,
}

impl HealthResponse {
    /// Healthy payload.
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }

    /// Payload reported when the store probe failed.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".into(),
        }
    }
}

use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: &'static str,
    /// Configured storage backend.
    pub storage: &'static str,
}

impl HealthResponse {
    pub fn ok(storage: &'static str) -> Self {
        Self {
            status: "ok",
            storage,
        }
    }

    /// The storage backend is missing or failing its health check.
    pub fn degraded(storage: &'static str) -> Self {
        Self {
            status: "degraded",
            storage,
        }
    }
}

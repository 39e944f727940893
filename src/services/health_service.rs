use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the backend can currently serve store-backed requests.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let backend = state.config().storage.backend.as_str();

    match state.require_room_store().await {
        Ok(store) => match state.store_call("health_check", store.health_check()).await {
            Ok(()) => HealthResponse::ok(backend),
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                HealthResponse::degraded(backend)
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            HealthResponse::degraded(backend)
        }
    }
}

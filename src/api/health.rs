use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn livez() -> StatusCode {
    StatusCode::OK
}

/// Ready only while the identity provider answers; without it no one can sign in.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    match state.health_service.check_provider().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::from_provider(true))),
        Err(e) => {
            tracing::warn!(error = %e, component = "identity_provider", "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::from_provider(false)))
        }
    }
}

use crate::api::rate_limit::log_rate_limit_events;
use crate::config::Config;
use crate::services::health_service::HealthService;
use crate::services::identity::IdentityGateway;
use crate::services::rate_limit_service::RateLimitService;
use axum::http::{HeaderName, StatusCode};
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod cookies;
pub mod gate;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub gateway: IdentityGateway,
    pub rate_limit_service: RateLimitService,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub gateway: IdentityGateway,
    pub rate_limit_service: RateLimitService,
}

/// Assembles the public router: the `/auth/*` API, the page gate for everything else,
/// and request-id and tracing around both.
///
/// # Panics
/// Panics if a rate limit burst is configured as zero.
pub fn app_router(config: Config, services: ServiceContainer) -> Router {
    let extractor = services.rate_limit_service.extractor.clone();
    let governor = |per_second: u32, burst: u32| {
        let period_ns = 1_000_000_000 / per_second.max(1);
        Arc::new(
            GovernorConfigBuilder::default()
                .per_nanosecond(u64::from(period_ns))
                .burst_size(burst)
                .key_extractor(extractor.clone())
                .finish()
                .expect("rate limit burst must be non-zero"),
        )
    };

    let limits = &config.rate_limit;
    // Login and registration forward credentials upstream; they get the tighter tier.
    let credential_tier = governor(limits.auth_per_second, limits.auth_burst);
    let token_tier = governor(limits.per_second, limits.burst);

    let state = AppState { config, gateway: services.gateway, rate_limit_service: services.rate_limit_service };

    let credential_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .layer(GovernorLayer::new(credential_tier));

    let token_routes = Router::new()
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/validate", get(auth::validate))
        .route("/auth/logout", post(auth::logout))
        .layer(GovernorLayer::new(token_tier));

    Router::new()
        .merge(credential_routes)
        .merge(token_routes)
        .fallback(page_not_found)
        .layer(from_fn(gate::require_session))
        .layer(from_fn_with_state(state.clone(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(middleware::REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::make_request_span)
                .on_response(middleware::record_response)
                .on_failure(middleware::record_failure),
        )
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(middleware::REQUEST_ID_HEADER),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}

/// Dashboard pages are rendered elsewhere; requests that pass the gate but match no route end here.
async fn page_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

use crate::api::AppState;
use crate::api::cookies::{auth_cookie, clear_auth_cookie};
use crate::api::middleware::{BearerToken, bearer_from_headers};
use crate::api::schemas::auth::{Login, LogoutResponse, Refresh, Registration, SessionResponse, ValidateResponse};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<Login>,
) -> Result<impl IntoResponse> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }

    let session = state.gateway.login(&payload.email, &payload.password).await?;
    let jar = jar.add(auth_cookie(&session.token, state.config.session.max_age()));
    Ok((jar, Json(SessionResponse::from(session))))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse> {
    let session = state.gateway.register(&payload.email, &payload.password, &payload.name).await?;
    let jar = jar.add(auth_cookie(&session.token, state.config.session.max_age()));
    Ok((StatusCode::CREATED, jar, Json(SessionResponse::from(session))))
}

/// The bearer header is optional; when present it is the access token revalidated
/// if the provider cannot refresh.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<Refresh>,
) -> Result<impl IntoResponse> {
    if payload.refresh_token.is_empty() {
        return Err(AppError::BadRequest("Refresh token is required".to_string()));
    }

    let session = state.gateway.refresh(&payload.refresh_token, bearer_from_headers(&headers)).await?;
    let jar = jar.add(auth_cookie(&session.token, state.config.session.max_age()));
    Ok((jar, Json(SessionResponse::from(session))))
}

pub async fn validate(State(state): State<AppState>, BearerToken(token): BearerToken) -> Result<impl IntoResponse> {
    let user = state.gateway.validate(&token).await?;
    Ok(Json(ValidateResponse { success: true, user }))
}

pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    jar: CookieJar,
) -> impl IntoResponse {
    state.gateway.logout(&token);
    (jar.add(clear_auth_cookie()), Json(LogoutResponse { success: true }))
}

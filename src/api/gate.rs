use crate::api::cookies::AUTH_COOKIE;
use crate::api::middleware::bearer_from_headers;
use crate::domain::access::{is_public, login_redirect};
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

/// Redirects requests for non-public pages to the login page unless they carry a token.
///
/// Only token presence is checked here; validity and subscription are enforced by
/// the session controller and the auth endpoints.
pub async fn require_session(req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if is_public(path) || has_token(&req) {
        return next.run(req).await;
    }

    tracing::debug!(path = %path, "Unauthenticated page request, redirecting to login");
    Redirect::temporary(&login_redirect(path)).into_response()
}

fn has_token(req: &Request) -> bool {
    if bearer_from_headers(req.headers()).is_some() {
        return true;
    }
    CookieJar::from_headers(req.headers()).get(AUTH_COOKIE).is_some_and(|c| !c.value().is_empty())
}

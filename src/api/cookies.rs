//! The `authToken` cookie lets the page gate recognise browser navigations.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const AUTH_COOKIE: &str = "authToken";

#[must_use]
pub fn auth_cookie(token: &str, max_age: Duration) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

#[must_use]
pub fn clear_auth_cookie() -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, String::new()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

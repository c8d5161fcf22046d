//! Route gating shared by the page-gate middleware and the client session controller.

/// Pages reachable without a session.
pub const PUBLIC_ROUTES: [&str; 5] = ["/", "/login", "/register", "/subscribe", "/forgot-password"];

/// Prefix of the auth API itself, which must stay reachable to obtain a session.
pub const AUTH_API_PREFIX: &str = "/auth/";

pub const LOGIN_ROUTE: &str = "/login";
pub const SUBSCRIBE_ROUTE: &str = "/subscribe";

/// What the gate knows about the caller when a navigation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Session restoration is still in flight.
    Pending,
    Anonymous,
    Subscriber { has_access: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    /// No decision can be made until restoration settles.
    Pending,
    Redirect(String),
}

#[must_use]
pub fn is_public(path: &str) -> bool {
    PUBLIC_ROUTES.contains(&path) || path.starts_with(AUTH_API_PREFIX)
}

/// Login URL carrying the originally requested path in the `redirect` parameter.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    format!("{LOGIN_ROUTE}?redirect={encoded}")
}

#[must_use]
pub fn gate(path: &str, viewer: Viewer) -> Navigation {
    match viewer {
        Viewer::Pending => Navigation::Pending,
        Viewer::Anonymous if is_public(path) => Navigation::Proceed,
        Viewer::Anonymous => Navigation::Redirect(login_redirect(path)),
        Viewer::Subscriber { has_access: false } if path != SUBSCRIBE_ROUTE => {
            Navigation::Redirect(SUBSCRIBE_ROUTE.to_string())
        }
        Viewer::Subscriber { .. } => Navigation::Proceed,
    }
}

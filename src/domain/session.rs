use crate::domain::user::User;
use time::{Duration, OffsetDateTime};

/// Credentials issued by the identity gateway for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    /// Absent when the provider does not issue refresh tokens.
    pub refresh_token: Option<String>,
    pub user: User,
}

/// A client's established session. Token and user always travel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub login_timestamp: OffsetDateTime,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn established(auth: AuthSession, login_timestamp: OffsetDateTime) -> Self {
        Self { access_token: auth.token, refresh_token: auth.refresh_token, login_timestamp, user: auth.user }
    }

    /// Applies a refresh result. The login timestamp is kept so the age ceiling
    /// still counts from the original sign-in; an unrotated refresh token is retained.
    pub fn apply_refresh(&mut self, auth: AuthSession) {
        self.access_token = auth.token;
        if auth.refresh_token.is_some() {
            self.refresh_token = auth.refresh_token;
        }
        self.user = auth.user;
    }

    #[must_use]
    pub fn is_older_than(&self, max_age: Duration, now: OffsetDateTime) -> bool {
        now - self.login_timestamp > max_age
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Restoring,
    Authenticated(Session),
    Expired,
}

impl SessionState {
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

//! Client-side session lifecycle.
//!
//! The controller owns the only copy of the in-memory [`SessionState`] and mirrors
//! the active session's credentials into a [`TokenStore`] so it survives restarts.
//! A session is capped at a fixed age counted from the original sign-in; refreshes
//! rotate tokens but never extend that ceiling.

use crate::client::backend::AuthBackend;
use crate::client::clock::{Clock, SystemClock};
use crate::client::store::{
    ACCESS_TOKEN_KEY, LOGIN_TIME_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, TokenStore, decode_login_time,
    encode_login_time,
};
use crate::config::SessionConfig;
use crate::domain::access::{Navigation, Viewer, gate};
use crate::domain::session::{AuthSession, Session, SessionState};
use crate::domain::subscription::user_has_access;
use crate::domain::user::User;
use crate::error::AuthError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub max_age: Duration,
    pub refresh_interval: std::time::Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_age: config.max_age(),
            refresh_interval: std::time::Duration::from_secs(config.refresh_interval_secs),
        }
    }
}

#[derive(Debug)]
pub struct SessionController {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    state: RwLock<SessionState>,
    /// Bumped whenever a session is established or torn down. Only changed while
    /// `state` is write-locked.
    generation: AtomicU64,
}

impl SessionController {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>, policy: SessionPolicy) -> Self {
        Self::with_clock(backend, store, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            store,
            clock,
            policy,
            state: RwLock::new(SessionState::Unauthenticated),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.session().map(|s| s.user.clone())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.session().map(|s| s.access_token.clone())
    }

    pub async fn has_access(&self) -> bool {
        let now = self.clock.now();
        self.state.read().await.session().is_some_and(|s| user_has_access(&s.user, now))
    }

    /// Rebuilds the session from persisted credentials at startup.
    ///
    /// Anything short of a confirmed session (missing or unreadable login time, an
    /// expired ceiling, a rejected token with no working refresh, an unreachable
    /// server) clears the persisted credentials and ends unauthenticated.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> SessionState {
        let Some(access_token) = self.read(ACCESS_TOKEN_KEY).await else {
            *self.state.write().await = SessionState::Unauthenticated;
            return SessionState::Unauthenticated;
        };
        *self.state.write().await = SessionState::Restoring;

        let Some(login_timestamp) = self.read(LOGIN_TIME_KEY).await.as_deref().and_then(decode_login_time) else {
            tracing::warn!("Stored session has no usable login time");
            return self.teardown().await;
        };

        if self.clock.now() - login_timestamp > self.policy.max_age {
            tracing::info!("Stored session is past its maximum age");
            return self.teardown().await;
        }

        let refresh_token = self.read(REFRESH_TOKEN_KEY).await;

        let (session, rotated) = match self.backend.validate(&access_token).await {
            Ok(user) => (Session { access_token, refresh_token, login_timestamp, user }, false),
            Err(e) => {
                tracing::debug!(error = %e, "Stored access token rejected");
                let Some(refresh_token) = refresh_token else {
                    return self.teardown().await;
                };
                match self.backend.refresh(&refresh_token, Some(&access_token)).await {
                    Ok(auth) => {
                        let mut session = Session {
                            access_token,
                            refresh_token: Some(refresh_token),
                            login_timestamp,
                            user: auth.user.clone(),
                        };
                        session.apply_refresh(auth);
                        (session, true)
                    }
                    Err(e) => {
                        tracing::info!(error = %e, "Stored session could not be refreshed");
                        return self.teardown().await;
                    }
                }
            }
        };

        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::Relaxed);
        if rotated {
            self.persist_tokens(&session).await;
        }
        tracing::info!(user_id = %session.user.id, "Session restored");
        *state = SessionState::Authenticated(session);
        (*state).clone()
    }

    /// On failure the current state and persisted credentials are left untouched.
    ///
    /// # Errors
    /// Returns the backend's error.
    #[tracing::instrument(skip(self, password), err(level = "warn"))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let auth = self.backend.login(email, password).await?;
        Ok(self.establish(auth).await)
    }

    /// # Errors
    /// Returns the backend's error.
    #[tracing::instrument(skip(self, password), err(level = "warn"))]
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, AuthError> {
        let auth = self.backend.register(email, password, name).await?;
        Ok(self.establish(auth).await)
    }

    /// One refresh tick. Rotates the tokens of an authenticated session without
    /// touching its login time. A failed refresh leaves the session as it was; only
    /// the age ceiling ends a session here.
    ///
    /// # Errors
    /// Returns the backend's error; the session is unchanged.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn refresh_session(&self) -> Result<(), AuthError> {
        if self.enforce_expiry().await {
            return Ok(());
        }

        let (generation, access_token, refresh_token) = {
            let state = self.state.read().await;
            let Some(session) = state.session() else {
                return Ok(());
            };
            let Some(refresh_token) = session.refresh_token.clone() else {
                return Ok(());
            };
            (self.generation.load(Ordering::Relaxed), session.access_token.clone(), refresh_token)
        };

        // No lock is held across the network call; concurrent ticks resolve last-write-wins.
        let auth = self.backend.refresh(&refresh_token, Some(&access_token)).await?;

        let mut state = self.state.write().await;
        match &mut *state {
            SessionState::Authenticated(session) if self.generation.load(Ordering::Relaxed) == generation => {
                session.apply_refresh(auth);
                self.persist_tokens(session).await;
                tracing::debug!(user_id = %session.user.id, "Session refreshed");
            }
            _ => tracing::debug!("Session changed during refresh; discarding result"),
        }
        Ok(())
    }

    /// Ends the session. Local state is cleared even when the server call fails.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        let token = match self.access_token().await {
            Some(token) => Some(token),
            None => self.read(ACCESS_TOKEN_KEY).await,
        };

        if let Some(token) = token
            && let Err(e) = self.backend.logout(&token).await
        {
            tracing::warn!(error = %e, "Server logout failed; clearing local session anyway");
        }

        self.teardown().await;
        tracing::info!("Logged out");
    }

    /// Moves an authenticated session past its age ceiling to `Expired`.
    /// Returns whether the session is now expired.
    pub async fn enforce_expiry(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        match &*state {
            SessionState::Authenticated(session) if session.is_older_than(self.policy.max_age, now) => {
                tracing::info!(user_id = %session.user.id, "Session reached its maximum age");
                *state = SessionState::Expired;
                true
            }
            SessionState::Expired => true,
            _ => false,
        }
    }

    /// Decides whether a navigation to `path` may proceed. An expired session is
    /// cleared first, so its holder is sent to login like any anonymous visitor.
    pub async fn navigate(&self, path: &str) -> Navigation {
        if self.enforce_expiry().await {
            self.teardown().await;
        }

        let now = self.clock.now();
        let viewer = match &*self.state.read().await {
            SessionState::Restoring => Viewer::Pending,
            SessionState::Authenticated(session) => Viewer::Subscriber { has_access: user_has_access(&session.user, now) },
            SessionState::Unauthenticated | SessionState::Expired => Viewer::Anonymous,
        };

        gate(path, viewer)
    }

    async fn establish(&self, auth: AuthSession) -> User {
        // Persisted with millisecond precision; keep memory and store in agreement.
        let now = self.clock.now();
        let session = Session::established(auth, now.replace_millisecond(now.millisecond()).unwrap_or(now));
        let user = session.user.clone();

        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.persist_tokens(&session).await;
        self.write(LOGIN_TIME_KEY, &encode_login_time(session.login_timestamp)).await;
        *state = SessionState::Authenticated(session);
        drop(state);

        tracing::info!(user_id = %user.id, "Session established");
        user
    }

    async fn persist_tokens(&self, session: &Session) {
        self.write(ACCESS_TOKEN_KEY, &session.access_token).await;
        match &session.refresh_token {
            Some(token) => self.write(REFRESH_TOKEN_KEY, token).await,
            None => self.remove(REFRESH_TOKEN_KEY).await,
        }
    }

    async fn teardown(&self) -> SessionState {
        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::Relaxed);
        for key in SESSION_KEYS {
            self.remove(key).await;
        }
        *state = SessionState::Unauthenticated;
        SessionState::Unauthenticated
    }

    /// Store failures are logged and treated as an absent entry.
    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to read token store");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value).await {
            tracing::warn!(error = %e, key, "Failed to write token store");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            tracing::warn!(error = %e, key, "Failed to clear token store entry");
        }
    }
}

use crate::domain::session::AuthSession;
use crate::domain::user::{Role, SubscriptionStatus, User};
use crate::error::AuthError;
use crate::services::identity::provider::{IdentityProvider, NewAccount, ProviderError};
use crate::services::revocation::RevocationList;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    register_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("statspro-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Login attempts by outcome")
                .build(),
            register_total: meter
                .u64_counter("auth_register_total")
                .with_description("Registration attempts by outcome")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Token refresh attempts by outcome and path")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Tokens revoked through logout")
                .build(),
        }
    }
}

fn outcome<T>(result: &Result<T, AuthError>) -> KeyValue {
    KeyValue::new("outcome", result.as_ref().map_or_else(AuthError::code, |_| "ok"))
}

/// Primary GraphQL endpoint plus the fallbacks probed before registration.
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub primary: String,
    pub alternates: Vec<String>,
}

/// Translates the dashboard's auth operations into identity-provider calls and
/// normalizes every provider failure into an [`AuthError`].
#[derive(Clone, Debug)]
pub struct IdentityGateway {
    provider: Arc<dyn IdentityProvider>,
    endpoints: Endpoints,
    revocations: RevocationList,
    trial: Duration,
    session_max_age: Duration,
    metrics: Metrics,
}

impl IdentityGateway {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        endpoints: Endpoints,
        revocations: RevocationList,
        trial: Duration,
        session_max_age: Duration,
    ) -> Self {
        Self { provider, endpoints, revocations, trial, session_max_age, metrics: Metrics::new() }
    }

    /// # Errors
    /// `InvalidCredentials` when the provider refuses the login, `ProviderUnreachable` on transport failure.
    #[tracing::instrument(skip(self, email, password), fields(user.id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let result = self.login_at(&self.endpoints.primary, email, password).await;
        self.metrics.login_total.add(1, &[outcome(&result)]);
        result
    }

    /// Creates the account on the first reachable endpoint, then signs the new user in there.
    ///
    /// # Errors
    /// `InvalidRequest` for malformed input, `EmailAlreadyExists` and `RegistrationDisabled` as reported
    /// by the provider, `ProviderUnreachable` when no endpoint answers.
    #[tracing::instrument(skip(self, email, password, name), fields(user.id = tracing::field::Empty), err(level = "warn"))]
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<AuthSession, AuthError> {
        let result = self.register_inner(email, password, name).await;
        self.metrics.register_total.add(1, &[outcome(&result)]);
        result
    }

    /// Exchanges a refresh token for a fresh session.
    ///
    /// When the provider lacks the refresh mutation, or the rotated token does not resolve a
    /// viewer, the existing access token (or the refresh token itself if none is supplied) is
    /// revalidated and handed back unchanged.
    ///
    /// # Errors
    /// `InvalidRefreshToken` when neither path yields a session.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn refresh(&self, refresh_token: &str, access_token: Option<&str>) -> Result<AuthSession, AuthError> {
        let endpoint = &self.endpoints.primary;

        let (path, result) = match self.provider.refresh_auth_token(endpoint, refresh_token).await {
            Ok(Some(token)) => match self.provider.viewer(endpoint, &token).await {
                Ok(Some(viewer)) => (
                    "mutation",
                    Ok(AuthSession {
                        user: viewer.into_user(OffsetDateTime::now_utc(), self.trial),
                        token,
                        refresh_token: Some(refresh_token.to_string()),
                    }),
                ),
                Ok(None) | Err(_) => {
                    tracing::info!("Rotated token did not resolve a viewer, revalidating existing token");
                    ("revalidate", self.revalidate(refresh_token, access_token.unwrap_or(refresh_token)).await)
                }
            },
            Ok(None) => ("mutation", Err(AuthError::InvalidRefreshToken)),
            Err(e) => {
                tracing::info!(error = %e, "Refresh mutation unavailable, revalidating existing token");
                ("revalidate", self.revalidate(refresh_token, access_token.unwrap_or(refresh_token)).await)
            }
        };

        self.metrics.refresh_total.add(1, &[outcome(&result), KeyValue::new("path", path)]);
        result
    }

    /// Resolves the user behind an access token.
    ///
    /// # Errors
    /// `InvalidToken` when the token is refused or was signed out, `ProviderUnreachable` on transport failure.
    #[tracing::instrument(skip_all, fields(user.id = tracing::field::Empty), err(level = "debug"))]
    pub async fn validate(&self, access_token: &str) -> Result<User, AuthError> {
        let now = OffsetDateTime::now_utc();
        if self.revocations.is_revoked(access_token, now) {
            return Err(AuthError::InvalidToken);
        }

        match self.provider.viewer(&self.endpoints.primary, access_token).await {
            Ok(Some(viewer)) => {
                tracing::Span::current().record("user.id", tracing::field::display(&viewer.id));
                Ok(viewer.into_user(now, self.trial))
            }
            Ok(None) | Err(ProviderError::Rejected(_)) => Err(AuthError::InvalidToken),
            Err(ProviderError::Unreachable(e)) => {
                tracing::warn!(error = %e, "Token validation could not reach the provider");
                Err(AuthError::ProviderUnreachable)
            }
        }
    }

    /// Signs an access token out of this gateway until the session ceiling would have expired it.
    #[tracing::instrument(skip_all)]
    pub fn logout(&self, access_token: &str) {
        self.revocations.revoke(access_token, OffsetDateTime::now_utc() + self.session_max_age);
        self.metrics.logout_total.add(1, &[]);
        tracing::info!("Access token revoked");
    }

    /// Probes the primary endpoint.
    ///
    /// # Errors
    /// Returns the provider error when the endpoint does not answer.
    pub async fn check_provider(&self) -> Result<(), ProviderError> {
        self.provider.ping(&self.endpoints.primary).await
    }

    async fn login_at(&self, endpoint: &str, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let grant = self.provider.login(endpoint, email, password).await.map_err(|e| match e {
            ProviderError::Unreachable(e) => {
                tracing::warn!(error = %e, "Login could not reach the provider");
                AuthError::ProviderUnreachable
            }
            ProviderError::Rejected(e) => {
                tracing::debug!(reason = %e, "Provider refused login");
                AuthError::InvalidCredentials
            }
        })?;

        match (grant.auth_token, grant.viewer) {
            (Some(token), Some(viewer)) => {
                tracing::Span::current().record("user.id", tracing::field::display(&viewer.id));
                Ok(AuthSession {
                    token,
                    refresh_token: grant.refresh_token,
                    user: viewer.into_user(OffsetDateTime::now_utc(), self.trial),
                })
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn register_inner(&self, email: &str, password: &str, name: &str) -> Result<AuthSession, AuthError> {
        validate_registration(email, password, name)?;
        let account = new_account(email, password, name);

        let endpoint = self.reachable_endpoint().await?;

        let created_id = self
            .provider
            .register_user(endpoint, &account)
            .await
            .map_err(classify_registration_error)?
            .ok_or_else(|| AuthError::InvalidRequest("Registration failed: provider did not create user".to_string()))?;
        tracing::Span::current().record("user.id", tracing::field::display(&created_id));
        tracing::info!("Account created, signing in");

        let session = self.login_at(endpoint, email, password).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Account created but automatic sign-in failed");
        })?;

        let now = OffsetDateTime::now_utc();
        Ok(AuthSession {
            user: User {
                display_name: name.trim().to_string(),
                subscription_status: SubscriptionStatus::Trial,
                subscription_expiry: Some(now + self.trial),
                role: Role::User,
                ..session.user
            },
            ..session
        })
    }

    async fn reachable_endpoint(&self) -> Result<&str, AuthError> {
        match self.provider.ping(&self.endpoints.primary).await {
            Ok(()) => return Ok(&self.endpoints.primary),
            Err(e) => tracing::warn!(error = %e, endpoint = %self.endpoints.primary, "Primary endpoint probe failed"),
        }

        for candidate in &self.endpoints.alternates {
            match self.provider.ping(candidate).await {
                Ok(()) => {
                    tracing::info!(endpoint = %candidate, "Using alternate provider endpoint");
                    return Ok(candidate);
                }
                Err(e) => tracing::debug!(error = %e, endpoint = %candidate, "Alternate endpoint probe failed"),
            }
        }

        tracing::error!("No identity provider endpoint is reachable");
        Err(AuthError::ProviderUnreachable)
    }

    async fn revalidate(&self, refresh_token: &str, token: &str) -> Result<AuthSession, AuthError> {
        let now = OffsetDateTime::now_utc();
        if self.revocations.is_revoked(token, now) {
            return Err(AuthError::InvalidRefreshToken);
        }

        match self.provider.viewer(&self.endpoints.primary, token).await {
            Ok(Some(viewer)) => Ok(AuthSession {
                token: token.to_string(),
                refresh_token: Some(refresh_token.to_string()),
                user: viewer.into_user(now, self.trial),
            }),
            Ok(None) | Err(_) => Err(AuthError::InvalidRefreshToken),
        }
    }
}

fn classify_registration_error(error: ProviderError) -> AuthError {
    match error {
        ProviderError::Unreachable(e) => {
            tracing::warn!(error = %e, "Registration could not reach the provider");
            AuthError::ProviderUnreachable
        }
        ProviderError::Rejected(message) => {
            let lower = message.to_lowercase();
            if lower.contains("email") && (lower.contains("exists") || lower.contains("already registered")) {
                AuthError::EmailAlreadyExists
            } else if lower.contains("registration") && lower.contains("disabled") {
                AuthError::RegistrationDisabled
            } else {
                AuthError::InvalidRequest(format!("Registration failed: {message}"))
            }
        }
    }
}

fn validate_registration(email: &str, password: &str, name: &str) -> Result<(), AuthError> {
    if email.is_empty() || password.is_empty() || name.trim().is_empty() {
        return Err(AuthError::InvalidRequest("Email, password, and name are required".to_string()));
    }
    if !looks_like_email(email) {
        return Err(AuthError::InvalidRequest("Invalid email format".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.rsplit_once('.').is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn new_account(email: &str, password: &str, name: &str) -> NewAccount {
    let username = email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();

    let mut parts = name.split_whitespace();
    let first_name = parts.next().unwrap_or_default().to_string();
    let last_name = parts.collect::<Vec<_>>().join(" ");

    NewAccount { username, email: email.to_string(), password: password.to_string(), first_name, last_name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::ViewerProfile;
    use crate::services::identity::provider::LoginGrant;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeProvider {
        reachable: HashSet<String>,
        refresh_supported: bool,
        rotated_viewer_fails: bool,
        valid_tokens: HashSet<String>,
        register_error: Option<ProviderError>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn check(&self, endpoint: &str, op: &str) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(format!("{op}@{endpoint}"));
            if self.reachable.contains(endpoint) {
                Ok(())
            } else {
                Err(ProviderError::Unreachable("connection refused".to_string()))
            }
        }

        fn viewer_for(token: &str) -> ViewerProfile {
            ViewerProfile {
                id: format!("id-{token}"),
                email: Some("fan@example.com".to_string()),
                first_name: Some("Pat".to_string()),
                last_name: Some("Fan".to_string()),
                roles: vec!["subscriber".to_string()],
                ..ViewerProfile::default()
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn ping(&self, endpoint: &str) -> Result<(), ProviderError> {
            self.check(endpoint, "ping")
        }

        async fn login(&self, endpoint: &str, username: &str, password: &str) -> Result<LoginGrant, ProviderError> {
            self.check(endpoint, "login")?;
            if password != "hunter22" {
                return Err(ProviderError::Rejected("incorrect_password".to_string()));
            }
            Ok(LoginGrant {
                auth_token: Some(format!("access-{username}")),
                refresh_token: Some(format!("refresh-{username}")),
                viewer: Some(Self::viewer_for(username)),
            })
        }

        async fn register_user(&self, endpoint: &str, account: &NewAccount) -> Result<Option<String>, ProviderError> {
            self.check(endpoint, "register")?;
            if let Some(e) = &self.register_error {
                return Err(e.clone());
            }
            Ok(Some(format!("new-{}", account.username)))
        }

        async fn refresh_auth_token(&self, endpoint: &str, refresh_token: &str) -> Result<Option<String>, ProviderError> {
            self.check(endpoint, "refresh")?;
            if !self.refresh_supported {
                return Err(ProviderError::Rejected("Cannot query field \"refreshJwtAuthToken\"".to_string()));
            }
            if refresh_token.starts_with("refresh-") {
                Ok(Some("rotated-access".to_string()))
            } else {
                Ok(None)
            }
        }

        async fn viewer(&self, endpoint: &str, token: &str) -> Result<Option<ViewerProfile>, ProviderError> {
            self.check(endpoint, "viewer")?;
            if token == "rotated-access" && self.rotated_viewer_fails {
                return Err(ProviderError::Unreachable("viewer timed out".to_string()));
            }
            if self.valid_tokens.contains(token) || token == "rotated-access" {
                Ok(Some(Self::viewer_for(token)))
            } else {
                Err(ProviderError::Rejected("invalid-jwt".to_string()))
            }
        }
    }

    const PRIMARY: &str = "http://wp.local/graphql";
    const ALTERNATE: &str = "http://wp.local/?graphql";

    fn gateway(provider: FakeProvider) -> (IdentityGateway, Arc<FakeProvider>) {
        let provider = Arc::new(provider);
        let gateway = IdentityGateway::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            Endpoints { primary: PRIMARY.to_string(), alternates: vec![ALTERNATE.to_string()] },
            RevocationList::new(),
            Duration::days(14),
            Duration::hours(24),
        );
        (gateway, provider)
    }

    fn reachable(endpoints: &[&str]) -> HashSet<String> {
        endpoints.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_login_maps_rejection_and_transport_failure() {
        let (gw, _) = gateway(FakeProvider { reachable: reachable(&[PRIMARY]), ..FakeProvider::default() });
        let session = gw.login("fan@example.com", "hunter22").await.unwrap();
        assert_eq!(session.token, "access-fan@example.com");
        assert_eq!(session.user.subscription_status, SubscriptionStatus::Active);

        assert_eq!(gw.login("fan@example.com", "nope").await.unwrap_err(), AuthError::InvalidCredentials);

        let (down, _) = gateway(FakeProvider::default());
        assert_eq!(down.login("fan@example.com", "hunter22").await.unwrap_err(), AuthError::ProviderUnreachable);
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_revalidating_access_token() {
        let (gw, _) = gateway(FakeProvider {
            reachable: reachable(&[PRIMARY]),
            refresh_supported: false,
            valid_tokens: reachable(&["stale-access"]),
            ..FakeProvider::default()
        });

        let session = gw.refresh("refresh-fan", Some("stale-access")).await.unwrap();
        assert_eq!(session.token, "stale-access");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-fan"));
    }

    #[tokio::test]
    async fn test_refresh_fallback_without_access_token_uses_refresh_token() {
        let (gw, _) = gateway(FakeProvider {
            reachable: reachable(&[PRIMARY]),
            valid_tokens: reachable(&["legacy-token"]),
            ..FakeProvider::default()
        });
        let session = gw.refresh("legacy-token", None).await.unwrap();
        assert_eq!(session.token, "legacy-token");
    }

    #[tokio::test]
    async fn test_refresh_fails_when_both_paths_fail() {
        let (gw, _) = gateway(FakeProvider { reachable: reachable(&[PRIMARY]), ..FakeProvider::default() });
        assert_eq!(gw.refresh("refresh-x", Some("revoked")).await.unwrap_err(), AuthError::InvalidRefreshToken);

        let (down, _) = gateway(FakeProvider::default());
        assert_eq!(down.refresh("refresh-x", Some("a")).await.unwrap_err(), AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_refresh_mutation_rotates_access_token() {
        let (gw, _) = gateway(FakeProvider {
            reachable: reachable(&[PRIMARY]),
            refresh_supported: true,
            ..FakeProvider::default()
        });
        let session = gw.refresh("refresh-fan", Some("old")).await.unwrap();
        assert_eq!(session.token, "rotated-access");

        assert_eq!(gw.refresh("bogus", None).await.unwrap_err(), AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_refresh_revalidates_when_rotated_token_has_no_viewer() {
        let (gw, provider) = gateway(FakeProvider {
            reachable: reachable(&[PRIMARY]),
            refresh_supported: true,
            rotated_viewer_fails: true,
            valid_tokens: reachable(&["current-access"]),
            ..FakeProvider::default()
        });

        let session = gw.refresh("refresh-fan", Some("current-access")).await.unwrap();
        assert_eq!(session.token, "current-access");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-fan"));
        assert_eq!(
            provider.calls.lock().unwrap().clone(),
            vec![format!("refresh@{PRIMARY}"), format!("viewer@{PRIMARY}"), format!("viewer@{PRIMARY}")]
        );

        assert_eq!(gw.refresh("refresh-fan", Some("unknown")).await.unwrap_err(), AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_logout_revokes_for_validate_and_fallback() {
        let (gw, _) = gateway(FakeProvider {
            reachable: reachable(&[PRIMARY]),
            valid_tokens: reachable(&["live"]),
            ..FakeProvider::default()
        });
        assert!(gw.validate("live").await.is_ok());

        gw.logout("live");

        assert_eq!(gw.validate("live").await.unwrap_err(), AuthError::InvalidToken);
        assert_eq!(gw.refresh("r", Some("live")).await.unwrap_err(), AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_validate_distinguishes_rejection_from_outage() {
        let (gw, _) = gateway(FakeProvider { reachable: reachable(&[PRIMARY]), ..FakeProvider::default() });
        assert_eq!(gw.validate("garbage").await.unwrap_err(), AuthError::InvalidToken);

        let (down, _) = gateway(FakeProvider::default());
        assert_eq!(down.validate("garbage").await.unwrap_err(), AuthError::ProviderUnreachable);
    }

    #[tokio::test]
    async fn test_register_probes_alternate_endpoint() {
        let (gw, provider) = gateway(FakeProvider { reachable: reachable(&[ALTERNATE]), ..FakeProvider::default() });

        let session = gw.register("Big.Fan+1@example.com", "hunter22", "Big Game Fan").await.unwrap();

        assert_eq!(session.user.display_name, "Big Game Fan");
        assert_eq!(session.user.subscription_status, SubscriptionStatus::Trial);
        assert!(session.user.subscription_expiry.is_some());
        assert_eq!(session.user.role, Role::User);

        let calls = provider.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                format!("ping@{PRIMARY}"),
                format!("ping@{ALTERNATE}"),
                format!("register@{ALTERNATE}"),
                format!("login@{ALTERNATE}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_register_unreachable_when_no_endpoint_answers() {
        let (gw, _) = gateway(FakeProvider::default());
        assert_eq!(
            gw.register("fan@example.com", "hunter22", "Fan").await.unwrap_err(),
            AuthError::ProviderUnreachable
        );
    }

    #[tokio::test]
    async fn test_register_classifies_provider_messages() {
        let cases = [
            ("This email address is already registered.", AuthError::EmailAlreadyExists),
            ("Email exists", AuthError::EmailAlreadyExists),
            ("User registration is currently disabled", AuthError::RegistrationDisabled),
            (
                "Sorry, that username already exists!",
                AuthError::InvalidRequest("Registration failed: Sorry, that username already exists!".to_string()),
            ),
        ];
        for (message, expected) in cases {
            let (gw, _) = gateway(FakeProvider {
                reachable: reachable(&[PRIMARY]),
                register_error: Some(ProviderError::Rejected(message.to_string())),
                ..FakeProvider::default()
            });
            assert_eq!(gw.register("fan@example.com", "hunter22", "Fan").await.unwrap_err(), expected, "{message}");
        }
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input_before_calling_provider() {
        let (gw, provider) = gateway(FakeProvider { reachable: reachable(&[PRIMARY]), ..FakeProvider::default() });
        for (email, password, name) in
            [("", "hunter22", "Fan"), ("not-an-email", "hunter22", "Fan"), ("fan@example.com", "short", "Fan")]
        {
            assert!(matches!(gw.register(email, password, name).await, Err(AuthError::InvalidRequest(_))));
        }
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_new_account_derives_username_and_names() {
        let account = new_account("Big.Fan+1@example.com", "pw", "  Big  Game Fan ");
        assert_eq!(account.username, "bigfan1");
        assert_eq!(account.first_name, "Big");
        assert_eq!(account.last_name, "Game Fan");
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("a b@c.d"));
        assert!(!looks_like_email("@c.d"));
        assert!(!looks_like_email("a@@c.d"));
        assert!(!looks_like_email("a@.d"));
    }
}

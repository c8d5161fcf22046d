use crate::domain::user::ViewerProfile;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The endpoint could not be reached, or answered with an error status and no GraphQL errors.
    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),
    /// The provider answered but refused the operation.
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),
}

/// Result of the provider's `login` mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginGrant {
    pub auth_token: Option<String>,
    pub refresh_token: Option<String>,
    pub viewer: Option<ViewerProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Operations offered by the external identity provider. Every call names the
/// GraphQL endpoint it targets so callers can fail over between endpoints.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    /// Cheap connectivity probe.
    ///
    /// # Errors
    /// Returns an error if the endpoint does not answer a trivial query.
    async fn ping(&self, endpoint: &str) -> Result<(), ProviderError>;

    /// # Errors
    /// Returns `ProviderError::Rejected` when the credentials are refused.
    async fn login(&self, endpoint: &str, username: &str, password: &str) -> Result<LoginGrant, ProviderError>;

    /// Creates an account and returns the new user's id, if the provider reported one.
    ///
    /// # Errors
    /// Returns `ProviderError::Rejected` carrying the provider's message when registration is refused.
    async fn register_user(&self, endpoint: &str, account: &NewAccount) -> Result<Option<String>, ProviderError>;

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    /// Returns an error when the provider does not support the operation or refuses the token.
    async fn refresh_auth_token(&self, endpoint: &str, refresh_token: &str) -> Result<Option<String>, ProviderError>;

    /// Resolves the account a bearer token belongs to.
    ///
    /// # Errors
    /// Returns `ProviderError::Rejected` when the token is refused.
    async fn viewer(&self, endpoint: &str, token: &str) -> Result<Option<ViewerProfile>, ProviderError>;
}

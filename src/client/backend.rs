use crate::api::schemas::auth::{ErrorResponse, Login, Refresh, Registration, SessionResponse, ValidateResponse};
use crate::domain::session::AuthSession;
use crate::domain::user::User;
use crate::error::AuthError;
use crate::services::identity::IdentityGateway;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// The operations a session controller needs from whoever issues credentials.
#[async_trait]
pub trait AuthBackend: Send + Sync + std::fmt::Debug {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn register(&self, email: &str, password: &str, name: &str) -> Result<AuthSession, AuthError>;

    async fn refresh(&self, refresh_token: &str, access_token: Option<&str>) -> Result<AuthSession, AuthError>;

    async fn validate(&self, access_token: &str) -> Result<User, AuthError>;

    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;
}

#[async_trait]
impl AuthBackend for IdentityGateway {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        IdentityGateway::login(self, email, password).await
    }

    async fn register(&self, email: &str, password: &str, name: &str) -> Result<AuthSession, AuthError> {
        IdentityGateway::register(self, email, password, name).await
    }

    async fn refresh(&self, refresh_token: &str, access_token: Option<&str>) -> Result<AuthSession, AuthError> {
        IdentityGateway::refresh(self, refresh_token, access_token).await
    }

    async fn validate(&self, access_token: &str) -> Result<User, AuthError> {
        IdentityGateway::validate(self, access_token).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        IdentityGateway::logout(self, access_token);
        Ok(())
    }
}

/// Talks to a running server's `/auth/*` endpoints.
#[derive(Clone, Debug)]
pub struct HttpAuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decodes a 2xx body as `T`, or turns an error body into the matching [`AuthError`].
    /// `unauthorized` is used for a 401 whose body carries no recognisable code.
    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
        unauthorized: AuthError,
    ) -> Result<T, AuthError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                tracing::warn!(error = %e, "Malformed response from auth server");
                AuthError::ProviderUnreachable
            });
        }

        let body = response.json::<ErrorResponse>().await.ok();
        if let Some(body) = &body
            && let Some(error) = AuthError::from_code(&body.code, &body.error)
        {
            return Err(error);
        }

        let error = match status {
            StatusCode::UNAUTHORIZED => unauthorized,
            StatusCode::CONFLICT => AuthError::EmailAlreadyExists,
            StatusCode::FORBIDDEN => AuthError::RegistrationDisabled,
            StatusCode::BAD_REQUEST => {
                AuthError::InvalidRequest(body.map(|b| b.error).unwrap_or_else(|| "Bad request".to_string()))
            }
            _ => {
                tracing::warn!(status = %status, "Unexpected status from auth server");
                AuthError::ProviderUnreachable
            }
        };
        Err(error)
    }
}

fn transport(e: &reqwest::Error) -> AuthError {
    tracing::warn!(error = %e, "Auth server request failed");
    AuthError::ProviderUnreachable
}

#[async_trait]
impl AuthBackend for HttpAuthClient {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = Login { email: email.to_string(), password: password.to_string() };
        let response =
            self.http.post(self.url("/auth/login")).json(&body).send().await.map_err(|e| transport(&e))?;
        let session: SessionResponse = Self::read(response, AuthError::InvalidCredentials).await?;
        Ok(session.into())
    }

    async fn register(&self, email: &str, password: &str, name: &str) -> Result<AuthSession, AuthError> {
        let body = Registration { email: email.to_string(), password: password.to_string(), name: name.to_string() };
        let response =
            self.http.post(self.url("/auth/register")).json(&body).send().await.map_err(|e| transport(&e))?;
        let session: SessionResponse = Self::read(response, AuthError::InvalidCredentials).await?;
        Ok(session.into())
    }

    async fn refresh(&self, refresh_token: &str, access_token: Option<&str>) -> Result<AuthSession, AuthError> {
        let body = Refresh { refresh_token: refresh_token.to_string() };
        let mut request = self.http.post(self.url("/auth/refresh")).json(&body);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| transport(&e))?;
        let session: SessionResponse = Self::read(response, AuthError::InvalidRefreshToken).await?;
        Ok(session.into())
    }

    async fn validate(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .http
            .get(self.url("/auth/validate"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        let validated: ValidateResponse = Self::read(response, AuthError::InvalidToken).await?;
        Ok(validated.user)
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.url("/auth/logout"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        let _: serde_json::Value = Self::read(response, AuthError::InvalidToken).await?;
        Ok(())
    }
}

//! WPGraphQL-backed identity provider.

mod queries;

use crate::domain::user::ViewerProfile;
use crate::services::identity::provider::{IdentityProvider, LoginGrant, NewAccount, ProviderError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

#[derive(Debug, Clone, Default)]
pub struct WordPressProvider {
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    id: String,
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    nicename: Option<String>,
    roles: Option<RoleConnection>,
}

#[derive(Deserialize)]
struct RoleConnection {
    #[serde(default)]
    nodes: Vec<RoleNode>,
}

#[derive(Deserialize)]
struct RoleNode {
    name: String,
}

impl From<RawUser> for ViewerProfile {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            username: raw.username,
            email: raw.email,
            first_name: raw.first_name,
            last_name: raw.last_name,
            nicename: raw.nicename,
            roles: raw.roles.map(|r| r.nodes.into_iter().map(|n| n.name).collect()).unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneralSettingsData {
    general_settings: Option<Value>,
}

#[derive(Deserialize)]
struct LoginData {
    login: Option<LoginPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    auth_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<RawUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterData {
    register_user: Option<RegisterPayload>,
}

#[derive(Deserialize)]
struct RegisterPayload {
    user: Option<CreatedUser>,
}

#[derive(Deserialize)]
struct CreatedUser {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    refresh_jwt_auth_token: Option<RefreshPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct ViewerData {
    viewer: Option<RawUser>,
}

impl WordPressProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
        variables: Value,
        bearer: Option<&str>,
    ) -> Result<T, ProviderError> {
        let mut request = self.http.post(endpoint).json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| ProviderError::Unreachable(e.to_string()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Unreachable(format!("endpoint answered {status}")));
        }

        let body: GraphqlResponse<T> = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(ProviderError::Unreachable(format!("malformed GraphQL response: {e}")));
            }
            Err(_) => return Err(ProviderError::Unreachable(format!("endpoint answered {status}"))),
        };

        if let Some(error) = body.errors.into_iter().next() {
            return Err(ProviderError::Rejected(error.message));
        }
        if !status.is_success() {
            return Err(ProviderError::Unreachable(format!("endpoint answered {status}")));
        }

        body.data.ok_or_else(|| ProviderError::Rejected("empty GraphQL response".to_string()))
    }
}

#[async_trait]
impl IdentityProvider for WordPressProvider {
    #[tracing::instrument(skip(self), err(level = "debug"))]
    async fn ping(&self, endpoint: &str) -> Result<(), ProviderError> {
        let data: GeneralSettingsData = self.execute(endpoint, queries::GENERAL_SETTINGS, json!({}), None).await?;
        if data.general_settings.is_some() {
            Ok(())
        } else {
            Err(ProviderError::Rejected("generalSettings missing from response".to_string()))
        }
    }

    #[tracing::instrument(skip(self, username, password), err(level = "debug"))]
    async fn login(&self, endpoint: &str, username: &str, password: &str) -> Result<LoginGrant, ProviderError> {
        let data: LoginData = self
            .execute(endpoint, queries::LOGIN, json!({ "username": username, "password": password }), None)
            .await?;

        Ok(data
            .login
            .map(|payload| LoginGrant {
                auth_token: payload.auth_token,
                refresh_token: payload.refresh_token,
                viewer: payload.user.map(ViewerProfile::from),
            })
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self, account), fields(username = %account.username), err(level = "debug"))]
    async fn register_user(&self, endpoint: &str, account: &NewAccount) -> Result<Option<String>, ProviderError> {
        let variables = json!({
            "username": account.username,
            "email": account.email,
            "password": account.password,
            "firstName": account.first_name,
            "lastName": account.last_name,
        });
        let data: RegisterData = self.execute(endpoint, queries::REGISTER_USER, variables, None).await?;
        Ok(data.register_user.and_then(|p| p.user).map(|u| u.id))
    }

    #[tracing::instrument(skip(self, refresh_token), err(level = "debug"))]
    async fn refresh_auth_token(&self, endpoint: &str, refresh_token: &str) -> Result<Option<String>, ProviderError> {
        let data: RefreshData = self
            .execute(endpoint, queries::REFRESH_AUTH_TOKEN, json!({ "refreshToken": refresh_token }), None)
            .await?;
        Ok(data.refresh_jwt_auth_token.and_then(|p| p.auth_token))
    }

    #[tracing::instrument(skip(self, token), err(level = "debug"))]
    async fn viewer(&self, endpoint: &str, token: &str) -> Result<Option<ViewerProfile>, ProviderError> {
        let data: ViewerData = self.execute(endpoint, queries::VIEWER, json!({}), Some(token)).await?;
        Ok(data.viewer.map(ViewerProfile::from))
    }
}

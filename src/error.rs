use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures of the authentication flow, as seen by callers of the identity gateway
/// and the session controller. Provider transport details never cross this boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("An account with this email already exists")]
    EmailAlreadyExists,
    #[error("User registration is disabled")]
    RegistrationDisabled,
    #[error("Identity provider is unreachable")]
    ProviderUnreachable,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AuthError {
    /// Stable machine-readable kind, carried in error bodies as `code`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::InvalidToken => "invalid_token",
            Self::EmailAlreadyExists => "email_already_exists",
            Self::RegistrationDisabled => "registration_disabled",
            Self::ProviderUnreachable => "provider_unreachable",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Inverse of [`AuthError::code`]. Unknown codes yield `None`.
    #[must_use]
    pub fn from_code(code: &str, message: &str) -> Option<Self> {
        let kind = match code {
            "invalid_credentials" => Self::InvalidCredentials,
            "invalid_refresh_token" => Self::InvalidRefreshToken,
            "invalid_token" => Self::InvalidToken,
            "email_already_exists" => Self::EmailAlreadyExists,
            "registration_disabled" => Self::RegistrationDisabled,
            "provider_unreachable" => Self::ProviderUnreachable,
            "invalid_request" => Self::InvalidRequest(message.to_string()),
            _ => return None,
        };
        Some(kind)
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::InvalidRefreshToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::EmailAlreadyExists => StatusCode::CONFLICT,
            Self::RegistrationDisabled => StatusCode::FORBIDDEN,
            Self::ProviderUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Auth(e) => {
                if e == AuthError::ProviderUnreachable {
                    tracing::warn!("Identity provider unreachable");
                } else {
                    tracing::debug!(code = e.code(), "Authentication request rejected");
                }
                (e.status(), e.code(), e.to_string())
            }
            Self::Unauthorized => {
                tracing::debug!("Missing or malformed bearer token");
                (StatusCode::UNAUTHORIZED, "unauthorized", "No valid token provided".to_string())
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, "invalid_request", msg)
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

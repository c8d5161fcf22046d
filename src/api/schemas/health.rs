use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
}

impl HealthResponse {
    #[must_use]
    pub fn from_provider(up: bool) -> Self {
        let label = if up { "ok" } else { "error" };
        Self { status: label.to_string(), provider: label.to_string() }
    }
}

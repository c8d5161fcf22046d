use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trial,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// A dashboard subscriber as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub subscription_status: SubscriptionStatus,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub subscription_expiry: Option<OffsetDateTime>,
    pub role: Role,
}

/// Account record returned by the identity provider's `viewer` and `login` operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerProfile {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nicename: Option<String>,
    pub roles: Vec<String>,
}

const ADMIN_ROLE: &str = "administrator";
const ACTIVE_ROLES: [&str; 2] = ["premium_member", "subscriber"];
const TRIAL_ROLE: &str = "trial_member";

impl ViewerProfile {
    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.nicename
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    /// Maps the provider's account record onto a subscriber.
    ///
    /// Subscription state is derived from role membership; trial members get an
    /// expiry `trial` from `now`.
    #[must_use]
    pub fn into_user(self, now: OffsetDateTime, trial: Duration) -> User {
        let (subscription_status, subscription_expiry) = if ACTIVE_ROLES.iter().any(|r| self.has_role(r)) {
            (SubscriptionStatus::Active, None)
        } else if self.has_role(TRIAL_ROLE) {
            (SubscriptionStatus::Trial, Some(now + trial))
        } else {
            (SubscriptionStatus::Inactive, None)
        };

        let role = if self.roles.iter().any(|r| r == ADMIN_ROLE) { Role::Admin } else { Role::User };

        User {
            display_name: self.display_name(),
            email: self.email.unwrap_or_default(),
            id: self.id,
            subscription_status,
            subscription_expiry,
            role,
        }
    }
}

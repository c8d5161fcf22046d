use crate::domain::user::{SubscriptionStatus, User};
use time::OffsetDateTime;

/// Grants dashboard access to active and trial subscribers whose subscription has not lapsed.
#[must_use]
pub fn grants_access(status: SubscriptionStatus, expiry: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match status {
        SubscriptionStatus::Active | SubscriptionStatus::Trial => expiry.is_none_or(|expiry| now < expiry),
        SubscriptionStatus::Inactive => false,
    }
}

#[must_use]
pub fn user_has_access(user: &User, now: OffsetDateTime) -> bool {
    grants_access(user.subscription_status, user.subscription_expiry, now)
}

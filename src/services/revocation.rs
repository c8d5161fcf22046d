use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;

/// Access tokens signed out through this gateway. Only SHA-256 digests are kept,
/// each until the session ceiling would have expired the token anyway.
#[derive(Clone, Debug, Default)]
pub struct RevocationList {
    entries: Arc<DashMap<String, OffsetDateTime>>,
}

impl RevocationList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, token: &str, until: OffsetDateTime) {
        self.entries.insert(digest(token), until);
    }

    #[must_use]
    pub fn is_revoked(&self, token: &str, now: OffsetDateTime) -> bool {
        self.entries.get(&digest(token)).is_some_and(|until| *until > now)
    }

    /// Drops entries whose retention has elapsed and returns how many were removed.
    pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, until| *until > now);
        before.saturating_sub(self.entries.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

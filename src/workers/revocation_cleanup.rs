use crate::services::revocation::RevocationList;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug)]
pub struct RevocationCleanupWorker {
    revocations: RevocationList,
    cleanup_interval_secs: u64,
}

impl RevocationCleanupWorker {
    #[must_use]
    pub const fn new(revocations: RevocationList, cleanup_interval_secs: u64) -> Self {
        Self { revocations, cleanup_interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.cleanup_interval_secs == 0 {
            tracing::info!("Revocation cleanup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.cleanup_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    tracing::info_span!("run_revocation_cleanup")
                        .in_scope(|| self.perform_cleanup(OffsetDateTime::now_utc()));
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Revocation cleanup loop shutting down...");
    }

    /// Drops revocations whose tokens are past the session ceiling.
    #[tracing::instrument(skip(self), fields(expired_deleted = tracing::field::Empty))]
    pub fn perform_cleanup(&self, now: OffsetDateTime) -> usize {
        let count = self.revocations.purge_expired(now);
        if count > 0 {
            tracing::info!(count = %count, "Purged expired revocations");
            tracing::Span::current().record("expired_deleted", count);
        }
        count
    }
}

use crate::client::controller::SessionController;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Drives [`SessionController::refresh_session`] on a fixed period while the session lives.
#[derive(Debug)]
pub struct SessionRefreshWorker {
    controller: Arc<SessionController>,
    period: Duration,
}

impl SessionRefreshWorker {
    #[must_use]
    pub fn new(controller: Arc<SessionController>) -> Self {
        let period = controller.policy().refresh_interval;
        Self::with_period(controller, period)
    }

    #[must_use]
    pub const fn with_period(controller: Arc<SessionController>, period: Duration) -> Self {
        Self { controller, period }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.period.is_zero() {
            tracing::info!("Session refresh is disabled (interval = 0)");
            return;
        }

        // The first tick is one full period after start; login already issued fresh tokens.
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.controller.refresh_session().await {
                        tracing::warn!(error = %e, "Scheduled session refresh failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Session refresh loop shutting down...");
    }
}

use crate::services::identity::IdentityGateway;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("identity provider did not answer: {0}")]
    Unreachable(String),
    #[error("identity provider probe timed out after {0:?}")]
    TimedOut(Duration),
}

/// Readiness of the one upstream this server cannot work without.
#[derive(Clone, Debug)]
pub struct HealthService {
    gateway: IdentityGateway,
    provider_timeout: Duration,
    provider_up: Gauge<i64>,
}

impl HealthService {
    #[must_use]
    pub fn new(gateway: IdentityGateway, provider_timeout_ms: u64) -> Self {
        let provider_up = global::meter("statspro-server")
            .i64_gauge("statspro_provider_up")
            .with_description("1 when the identity provider answered the last readiness probe")
            .build();
        Self { gateway, provider_timeout: Duration::from_millis(provider_timeout_ms), provider_up }
    }

    /// Sends the provider's cheapest query, bounded by the configured timeout.
    ///
    /// # Errors
    /// Returns why the provider is not usable right now.
    pub async fn check_provider(&self) -> Result<(), ProbeFailure> {
        let outcome = match tokio::time::timeout(self.provider_timeout, self.gateway.check_provider()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProbeFailure::Unreachable(e.to_string())),
            Err(_) => Err(ProbeFailure::TimedOut(self.provider_timeout)),
        };

        self.provider_up.record(i64::from(outcome.is_ok()), &[KeyValue::new("component", "identity_provider")]);
        outcome
    }
}

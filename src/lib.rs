#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::wordpress::WordPressProvider;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::health_service::HealthService;
use crate::services::identity::{Endpoints, IdentityGateway, IdentityProvider};
use crate::services::rate_limit_service::RateLimitService;
use crate::services::revocation::RevocationList;
use crate::workers::RevocationCleanupWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything `main` needs after wiring: request-path services, the readiness
/// service for the management router, and the background workers.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    pub revocation_cleanup: RevocationCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.revocation_cleanup.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    provider: Option<Arc<dyn IdentityProvider>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, provider: None }
    }

    /// Overrides the identity provider; defaults to WordPress over GraphQL.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn build(self) -> App {
        let config = self.config;
        let provider: Arc<dyn IdentityProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(WordPressProvider::new()),
        };

        let revocations = RevocationList::new();
        let endpoints = Endpoints {
            primary: config.provider.graphql_url.clone(),
            alternates: config.provider.alternate_urls.clone(),
        };
        let gateway = IdentityGateway::new(
            provider,
            endpoints,
            revocations.clone(),
            config.session.trial_length(),
            config.session.max_age(),
        );

        let health_service = HealthService::new(gateway.clone(), config.provider.health_timeout_ms);
        let rate_limit_service = RateLimitService::new(config.server.trusted_proxies.clone());

        let workers = Workers {
            revocation_cleanup: RevocationCleanupWorker::new(
                revocations,
                config.session.revocation_cleanup_interval_secs,
            ),
        };

        App { services: ServiceContainer { gateway, rate_limit_service }, health_service, workers }
    }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        tracing::error!(location = %location, payload = %payload, "Panic occurred");
    }));
}

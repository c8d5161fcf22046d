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

use statspro_server::api::{MgmtState, app_router, mgmt_router};
use statspro_server::config::Config;
use statspro_server::{AppBuilder, telemetry};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Debug)]
struct Listeners {
    api: TcpListener,
    mgmt: TcpListener,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    statspro_server::setup_panic_hook();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    statspro_server::spawn_signal_handler(shutdown_tx.clone());

    let listeners = bind(&config).instrument(tracing::info_span!("boot_server")).await?;

    let app = AppBuilder::new(config.clone()).build();
    tracing::info!(
        provider = %config.provider.graphql_url,
        alternates = config.provider.alternate_urls.len(),
        "identity provider configured"
    );

    let worker_tasks = app.workers.spawn_all(shutdown_rx.clone());

    let api = serve(listeners.api, app_router(config.clone(), app.services), shutdown_rx.clone());
    let mgmt = serve(listeners.mgmt, mgmt_router(MgmtState { health_service: app.health_service }), shutdown_rx);

    if let Err(e) = tokio::try_join!(api, mgmt) {
        tracing::error!(error = %e, "Server error");
    }

    let _ = shutdown_tx.send(true);
    drain(worker_tasks, Duration::from_secs(config.server.shutdown_timeout_secs)).await;

    telemetry_guard.shutdown();
    Ok(())
}

async fn bind(config: &Config) -> anyhow::Result<Listeners> {
    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

    let api = TcpListener::bind(api_addr).await?;
    let mgmt = TcpListener::bind(mgmt_addr).await?;

    tracing::info!(address = %api_addr, "listening");
    tracing::info!(address = %mgmt_addr, "management server listening");
    Ok(Listeners { api, mgmt })
}

/// Serves until the shutdown channel flips, then drains in-flight requests.
async fn serve(listener: TcpListener, router: axum::Router, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&s| s).await;
        })
        .await
}

async fn drain(tasks: Vec<JoinHandle<()>>, timeout: Duration) {
    if tokio::time::timeout(timeout, futures::future::join_all(tasks)).await.is_ok() {
        tracing::info!("Background tasks finished.");
    } else {
        tracing::warn!("Timeout waiting for background tasks to finish.");
    }
}

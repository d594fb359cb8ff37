//! Storeguard Server entry point.

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use storeguard_server::AppState;
use storeguard_server::config::Config;
use storeguard_service::ServiceState;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let service = ServiceState::new(&config.service_config());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        actions = service.policies().kinds().count(),
        overrides = config.policies.len(),
        "Storeguard Server starting",
    );

    let sweeper = config.sweep_interval().map(|interval| {
        let sweeper = service.sweeper(interval);
        sweeper.start();
        sweeper
    });
    if sweeper.is_none() {
        tracing::warn!("Sweeper disabled, rate-limit entries are never evicted");
    }

    let app = storeguard_server::router(AppState::new(service));

    let addr = SocketAddr::new(config.host.parse().expect("invalid host"), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "Storeguard Server ready");

    storeguard_http::serve(listener, app, shutdown_signal())
        .await
        .expect("server error");

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }

    tracing::info!("Storeguard Server shut down");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install signal handler");
    tracing::info!("Shutdown signal received");
}

//! Room Controller
//!
//! Entry point for the room controller service: signaling relay, room
//! coordination and recording control for browser video calls.

use rc_service::adapter::{Adapter, MemoryAdapter};
use rc_service::auth::IdentityResolver;
use rc_service::config::Config;
use rc_service::handlers::HealthState;
use rc_service::network::{select_network, NetworkDeps};
use rc_service::recording::{RecordingBackend, RecordingClient};
use rc_service::rooms::RoomRegistry;
use rc_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rc_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        network = %config.network_mode,
        record_service_url = %config.record_service_url,
        record_timeout_seconds = config.record_timeout.as_secs(),
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        "Configuration loaded successfully"
    );

    let identity = Arc::new(IdentityResolver::new(
        &config.jwt_secret,
        config.jwt_clock_skew,
    ));

    let recording = RecordingClient::new(&config.record_service_url, config.record_timeout)
        .map_err(|e| {
            error!("Failed to create recording client: {}", e);
            e
        })?;

    // Select topology once, before accepting connections
    let adapter: Arc<dyn Adapter> = Arc::new(MemoryAdapter::new());
    let recorder: Arc<dyn RecordingBackend> = Arc::new(recording.clone());
    let network = select_network(
        config.network_mode,
        NetworkDeps {
            registry: RoomRegistry::new(),
            recorder,
            adapter,
        },
    )
    .map_err(|e| {
        error!("Failed to select network: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();
    let drain_period = config.drain_period;
    let health = Arc::new(HealthState::new());

    let state = Arc::new(AppState {
        config,
        identity,
        network,
        recording,
        health: Arc::clone(&health),
    });

    let app = routes::build_routes(state);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    health.set_ready();
    info!("Room Controller listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(health, drain_period))
        .await?;

    info!("Room Controller shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(health: Arc<HealthState>, drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    health.set_not_ready();

    if drain_period.is_zero() {
        info!("Skipping drain period (RC_DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}

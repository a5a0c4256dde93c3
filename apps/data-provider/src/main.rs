//! Data Provider Binary
//!
//! Starts the broker-backed market data HTTP service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin data-provider
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_KEY`: Broker API key
//! - `SECRET_KEY`: Broker secret key
//!
//! ## Optional
//! - `CA_CERT_PATH`, `CA_PASSWORD`: Client certificate (both required to activate)
//! - `BROKER_SIMULATION`: Use the simulation environment (default: true)
//! - `BROKER_GATEWAY_URL`: Session gateway URL (default: <http://localhost:8080>)
//! - `BROKER_REQUEST_TIMEOUT_SECS`: Gateway request timeout (default: 10)
//! - `DATA_PROVIDER_PORT`: HTTP port (default: 8000)
//! - `KBARS_TIMEOUT_SECS`: Per-symbol kbar wait (default: 30)
//! - `MARKET_UTC_OFFSET_SECS`: Offset used to assign ticks to dates (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: data-provider)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use data_provider::application::ports::{BrokerSession, SessionGate};
use data_provider::application::services::{BarAggregator, CallbackBridge, SessionGuardian};
use data_provider::infrastructure::broker::GatewayBrokerSession;
use data_provider::infrastructure::http::{AppState, HttpServer};
use data_provider::infrastructure::telemetry;
use data_provider::{ProviderConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Data Provider");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ProviderConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let gateway = GatewayBrokerSession::new(&config.broker, config.environment)
        .context("failed to build broker gateway client")?;
    let session: Arc<dyn BrokerSession> = Arc::new(gateway);

    let guardian = Arc::new(SessionGuardian::new(
        Arc::clone(&session),
        config.credentials.clone(),
        config.certificate.clone(),
    ));
    guardian
        .establish()
        .await
        .context("initial broker login failed")?;

    let gate: Arc<dyn SessionGate> = guardian;
    let bridge = Arc::new(CallbackBridge::new(
        Arc::clone(&session),
        config.historical.kbars_timeout,
    ));
    let aggregator = Arc::new(BarAggregator::new(
        Arc::clone(&gate),
        bridge,
        config.historical.market_offset,
    ));

    let state = AppState::new(
        gate,
        session,
        aggregator,
        env!("CARGO_PKG_VERSION").to_string(),
    );

    let shutdown_token = CancellationToken::new();
    let server = HttpServer::new(config.server.port, state, shutdown_token.clone());
    let mut server_task = tokio::spawn(server.run());

    tracing::info!("Data provider ready");

    tokio::select! {
        result = &mut server_task => {
            result
                .context("HTTP server task panicked")?
                .context("HTTP server failed")?;
            return Ok(());
        }
        () = await_shutdown(shutdown_token) => {}
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await {
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
        Err(_) => tracing::warn!("Graceful shutdown timed out"),
        Ok(Ok(Ok(()))) => {}
    }

    tracing::info!("Data provider stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ProviderConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        gateway_url = %config.broker.gateway_url,
        port = config.server.port,
        certificate = config.certificate.is_some(),
        kbars_timeout_secs = config.historical.kbars_timeout.as_secs(),
        market_offset_secs = config.historical.market_offset.local_minus_utc(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

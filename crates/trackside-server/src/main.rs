use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trackside_core::source::{SerialTransport, SourceReader};
use trackside_core::store::SqliteStore;
use trackside_core::supervisor::Supervisor;
use trackside_server::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        port = %config.telemetry.transport.port_name,
        baud = config.telemetry.transport.baud_rate,
        db = %config.telemetry.database_path.display(),
        k_t = config.telemetry.torque.motor_torque_constant,
        gear_ratio = config.telemetry.torque.gear_ratio,
        efficiency = config.telemetry.torque.drivetrain_efficiency,
        "Starting trackside {}",
        trackside_core::VERSION
    );

    let store = SqliteStore::open(&config.telemetry.database_path)
        .with_context(|| format!("cannot open {}", config.telemetry.database_path.display()))?;
    let supervisor = Arc::new(Supervisor::new(&config.telemetry, Arc::new(store)));

    let reader = SourceReader::new(
        SerialTransport::new(&config.telemetry.transport),
        supervisor.pipeline(),
    );
    let reader_task = tokio::spawn(reader.run(supervisor.shutdown_token()));

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "HTTP server listening");

    axum::serve(listener, router(AppState::new(supervisor.clone())))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down");
    supervisor.shutdown().await;
    if let Err(e) = reader_task.await {
        tracing::warn!(error = %e, "Live reader task failed");
    }
    Ok(())
}

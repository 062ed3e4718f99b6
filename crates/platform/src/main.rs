//! Platform entry point.

use std::process::ExitCode;

use event_store::{EventStore, Outbox, ProcessedEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use platform::config::StorageKind;
use platform::{Config, Platform, ServiceStores, telemetry};
use tokio::signal;
use tokio::sync::watch;

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(error = %error, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run_with<S>(
    stores: ServiceStores<S>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> platform::Result<()>
where
    S: EventStore + Outbox + ProcessedEventStore + Clone + 'static,
{
    let platform = Platform::start(stores, config).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    platform::serve(&platform, config, metrics_handle, shutdown_rx).await
}

async fn run() -> platform::Result<()> {
    let config = Config::from_env()?;
    telemetry::init_tracing(&config)?;
    let metrics_handle = telemetry::install_metrics()?;

    tracing::info!(
        storage = ?config.storage,
        default_coordinator = %config.default_coordinator_id,
        "starting academic records platform"
    );

    match config.storage {
        StorageKind::Memory => {
            run_with(ServiceStores::in_memory(), &config, metrics_handle).await?
        }
        StorageKind::Postgres => {
            let stores = ServiceStores::connect(&config).await?;
            run_with(stores, &config, metrics_handle).await?
        }
    }

    tracing::info!("platform shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // The subscriber may not be installed yet.
            eprintln!("academic-platform: {error}");
            ExitCode::FAILURE
        }
    }
}

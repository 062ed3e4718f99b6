//! Academic records platform: the course catalog, registration and student
//! academic services wired to one message bus.
//!
//! Each service commits events to its own store; an outbox dispatcher per
//! service publishes them as integration events, and the consumers in
//! [`consumers`] react to the events of other services. The process exposes
//! Prometheus metrics over HTTP and logs through `tracing`.

pub mod config;
pub mod consumers;
pub mod error;
pub mod routes;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{PlatformError, Result};
pub use services::{Platform, ServiceStores};

use event_store::{EventStore, Outbox, ProcessedEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Runs the outbox dispatchers and the operations endpoint until `shutdown`
/// turns true, then waits for the dispatchers to stop.
pub async fn serve<S>(
    platform: &Platform<S>,
    config: &Config,
    metrics_handle: PrometheusHandle,
    shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    S: EventStore + Outbox + ProcessedEventStore + Clone + 'static,
{
    let dispatchers = platform.spawn_dispatchers(shutdown.clone());

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Operations endpoint listening");

    let mut server_shutdown = shutdown;
    axum::serve(listener, routes::router(metrics_handle))
        .with_graceful_shutdown(async move {
            // A dropped sender also means shut down.
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    for dispatcher in dispatchers {
        if let Err(error) = dispatcher.await {
            tracing::error!(error = %error, "Outbox dispatcher task failed");
        }
    }
    Ok(())
}

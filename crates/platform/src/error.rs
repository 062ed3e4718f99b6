//! Platform error type.

use event_store::EventStoreError;
use messaging::DispatchError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors raised while configuring, wiring or running the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidConfig {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when STORAGE=postgres")]
    MissingDatabaseUrl(&'static str),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Outbox dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Message bus refused {0} message(s)")]
    BusRefused(usize),

    #[error("Services still publishing after {0} rounds")]
    NotQuiescent(usize),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

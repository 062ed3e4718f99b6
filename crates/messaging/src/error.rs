//! Messaging error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Errors returned by an [`EventBus`](crate::EventBus).
#[derive(Debug, Error)]
pub enum BusError {
    /// The broker is not accepting messages.
    #[error("Message bus unavailable")]
    Unavailable,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A stored event that cannot become an integration event.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("No integration event for aggregate type '{0}'")]
    UnknownAggregate(String),

    #[error("Cannot decode {aggregate_type} event payload: {source}")]
    Payload {
        aggregate_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by an integration event handler.
///
/// Any error makes the bus redeliver the message.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The handler received an event type it is not bound to.
    #[error("Unexpected event type '{0}'")]
    UnexpectedEvent(String),

    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl ConsumerError {
    pub fn handler(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        ConsumerError::Handler(Box::new(error))
    }
}

/// Errors that stop an outbox dispatch pass.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Outbox error: {0}")]
    Outbox(#[from] EventStoreError),
}

pub type Result<T, E = BusError> = std::result::Result<T, E>;

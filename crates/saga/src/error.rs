//! Saga error types.

use common::AggregateId;
use domain::DomainError;
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

use crate::state::SagaState;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Saga is in an invalid state for the requested operation.
    #[error("Invalid saga state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: SagaState },

    /// Some courses could not be reassigned; a retry resumes the saga.
    #[error("Saga {saga_id}: {failed} course(s) could not be reassigned")]
    StepsFailed { saga_id: AggregateId, failed: usize },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The coordinator assignment index could not be brought up to date.
    #[error("Assignment index error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

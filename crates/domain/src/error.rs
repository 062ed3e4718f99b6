//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::course::CourseError;
use crate::department::DepartmentError;
use crate::registration::RegistrationError;
use crate::student::StudentError;

/// Errors returned from command execution.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Course(#[from] CourseError),

    #[error(transparent)]
    Department(#[from] DepartmentError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Student(#[from] StudentError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every attempt lost an optimistic concurrency race.
    #[error("{aggregate_type} {aggregate_id} still conflicting after {attempts} attempts")]
    ConcurrencyRetriesExhausted {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
        attempts: u32,
    },
}

impl DomainError {
    /// True for business-rule violations, false for infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DomainError::Course(_)
                | DomainError::Department(_)
                | DomainError::Registration(_)
                | DomainError::Student(_)
                | DomainError::AggregateNotFound { .. }
        )
    }
}

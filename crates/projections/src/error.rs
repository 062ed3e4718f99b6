//! Projection errors.

use event_store::{EventEnvelope, EventId, EventStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Failed to read the event store: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Event {0} was read without a commit sequence")]
    Unsequenced(EventId),

    /// A stored event of an aggregate the projection follows did not decode.
    #[error("{projection} cannot decode {event_type} event {event_id}: {source}")]
    UndecodableEvent {
        projection: &'static str,
        event_id: EventId,
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProjectionError {
    pub(crate) fn undecodable(
        projection: &'static str,
        event: &EventEnvelope,
        source: serde_json::Error,
    ) -> Self {
        ProjectionError::UndecodableEvent {
            projection,
            event_id: event.event_id,
            event_type: event.event_type.clone(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

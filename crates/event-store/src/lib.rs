//! Event persistence for the academic records services.
//!
//! Each service owns one store. Appending events also enqueues them in the
//! store's outbox within the same transaction, and consumers record the
//! messages they have applied in the same store.

pub mod error;
pub mod event;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod processed;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use outbox::{Outbox, OutboxMessage, OutboxStatus};
pub use postgres::PostgresEventStore;
pub use processed::ProcessedEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};

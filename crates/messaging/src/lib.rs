//! Cross-service event propagation.
//!
//! Committed domain events leave a service through its outbox: the
//! [`OutboxDispatcher`] translates each one into an [`IntegrationEvent`]
//! and publishes it on an [`EventBus`]. Consumers subscribe per
//! [`Endpoint`] and are wrapped in an [`IdempotentHandler`] so redelivered
//! events are applied once.

pub mod bus;
pub mod consumer;
pub mod error;
pub mod event;
pub mod memory;
pub mod outbox;
pub mod publisher;
pub mod translator;

pub use bus::{Endpoint, EventBus};
pub use consumer::{IdempotentHandler, IntegrationEventHandler};
pub use error::{BusError, ConsumerError, DispatchError, Result, TranslationError};
pub use event::{
    EnrollmentChange, IntegrationEvent, IntegrationPayload, PrerequisiteChange, routing_key,
};
pub use memory::{BusConfig, DeadLetter, InMemoryBus};
pub use outbox::{DispatchReport, DispatcherConfig, OutboxDispatcher};
pub use publisher::IntegrationEventPublisher;
pub use translator::EventTranslator;

//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events record facts that happened inside one aggregate. They are
/// named in past tense and never change once raised.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// Ordered list of events raised by a command and not yet persisted.
///
/// The command handler drains it exactly once per successful command.
#[derive(Debug, Clone)]
pub struct EventBuffer<E> {
    events: Vec<E>,
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBuffer<E> {
    pub fn push(&mut self, event: E) {
        self.events.push(event);
    }

    /// Removes and returns every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.events.iter()
    }
}

/// Trait for event-sourced aggregates.
///
/// State is rebuilt by replaying events through [`Aggregate::apply`].
/// Command methods validate against the current state and call
/// [`Aggregate::raise`], which applies the event and buffers it for
/// persistence.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Business-rule violations returned by command methods.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or `None` before creation.
    fn id(&self) -> Option<AggregateId>;

    /// Version of the last persisted event; 0 for a new aggregate.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate state.
    ///
    /// Must be deterministic and infallible: events are facts.
    fn apply(&mut self, event: Self::Event);

    fn pending_events(&self) -> &EventBuffer<Self::Event>;

    fn pending_events_mut(&mut self) -> &mut EventBuffer<Self::Event>;

    /// Applies `event` and buffers it until the command completes.
    fn raise(&mut self, event: Self::Event) {
        self.apply(event.clone());
        self.pending_events_mut().push(event);
    }

    /// Drains the buffered events.
    fn take_pending_events(&mut self) -> Vec<Self::Event> {
        self.pending_events_mut().drain()
    }

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

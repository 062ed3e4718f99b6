//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Attempts made before a command gives up on optimistic concurrency conflicts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Loads aggregates, runs commands against them and persists the raised
/// events.
///
/// Every append carries the version the aggregate was loaded at. When another
/// writer got there first the store reports a conflict; the handler then
/// reloads and re-runs the command, up to `max_attempts` times. Because the
/// command sees fresh state on each attempt, invariants checked inside the
/// aggregate hold across concurrent writers.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    max_attempts: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            _phantom: PhantomData,
        }
    }

    /// Sets how many times a conflicting command is attempted. At least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Rebuilds an aggregate from its events.
    ///
    /// Returns a default instance when the aggregate has no events.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Runs `command_fn` against the current state and persists what it raised.
    ///
    /// The closure may run more than once if concurrent writers conflict.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&mut A) -> Result<(), A::Error>,
        DomainError: From<A::Error>,
    {
        self.execute_caused_by(aggregate_id, None, command_fn).await
    }

    /// Like [`execute`](Self::execute), recording `causation_id` in the
    /// metadata of every persisted event.
    pub async fn execute_caused_by<F>(
        &self,
        aggregate_id: AggregateId,
        causation_id: Option<Uuid>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&mut A) -> Result<(), A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 1;
        loop {
            let mut aggregate = self.load(aggregate_id).await?;
            let current_version = aggregate.version();

            if let Err(error) = command_fn(&mut aggregate) {
                tracing::warn!(
                    aggregate_type = A::aggregate_type(),
                    aggregate_id = %aggregate_id,
                    reason = %error,
                    "Command rejected"
                );
                metrics::counter!("commands_rejected_total", "aggregate" => A::aggregate_type())
                    .increment(1);
                return Err(error.into());
            }

            let events = aggregate.take_pending_events();
            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    new_version: current_version,
                });
            }

            let envelopes =
                self.build_envelopes(aggregate_id, current_version, &events, causation_id)?;

            let options = if current_version == Version::initial() {
                AppendOptions::expect_new()
            } else {
                AppendOptions::expect_version(current_version)
            };

            match self.store.append(envelopes, options).await {
                Ok(new_version) => {
                    aggregate.set_version(new_version);
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version,
                    });
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    tracing::debug!(
                        aggregate_type = A::aggregate_type(),
                        aggregate_id = %aggregate_id,
                        attempt,
                        "Concurrent write detected, retrying command"
                    );
                    attempt += 1;
                }
                Err(e) if e.is_conflict() => {
                    tracing::error!(
                        aggregate_type = A::aggregate_type(),
                        aggregate_id = %aggregate_id,
                        attempts = attempt,
                        "Command lost every concurrency retry"
                    );
                    return Err(DomainError::ConcurrencyRetriesExhausted {
                        aggregate_type: A::aggregate_type(),
                        aggregate_id,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        aggregate_type = A::aggregate_type(),
                        aggregate_id = %aggregate_id,
                        error = %e,
                        "Failed to persist events"
                    );
                    return Err(e.into());
                }
            }
        }
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
        causation_id: Option<Uuid>,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            if let Some(cause) = causation_id {
                builder = builder.caused_by(cause);
            }
            envelopes.push(builder.build()?);
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EventBuffer;
    use async_trait::async_trait;
    use event_store::{EventStoreError, EventStream, InMemoryEventStore};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { id: AggregateId, limit: u32 },
        Counted,
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Counted => "TallyCounted",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Tally {
        id: Option<AggregateId>,
        limit: u32,
        count: u32,
        version: Version,
        pending: EventBuffer<TallyEvent>,
    }

    #[derive(Debug, thiserror::Error)]
    enum TallyError {
        #[error("tally already opened")]
        AlreadyOpened,
        #[error("tally is at its limit")]
        AtLimit,
    }

    impl From<TallyError> for DomainError {
        fn from(e: TallyError) -> Self {
            DomainError::AggregateNotFound {
                aggregate_type: "Tally",
                aggregate_id: e.to_string(),
            }
        }
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = TallyError;

        fn aggregate_type() -> &'static str {
            "Tally"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: TallyEvent) {
            match event {
                TallyEvent::Opened { id, limit } => {
                    self.id = Some(id);
                    self.limit = limit;
                }
                TallyEvent::Counted => self.count += 1,
            }
        }

        fn pending_events(&self) -> &EventBuffer<TallyEvent> {
            &self.pending
        }

        fn pending_events_mut(&mut self) -> &mut EventBuffer<TallyEvent> {
            &mut self.pending
        }
    }

    impl Tally {
        fn open(&mut self, id: AggregateId, limit: u32) -> Result<(), TallyError> {
            if self.id.is_some() {
                return Err(TallyError::AlreadyOpened);
            }
            self.raise(TallyEvent::Opened { id, limit });
            Ok(())
        }

        fn count(&mut self) -> Result<(), TallyError> {
            if self.count >= self.limit {
                return Err(TallyError::AtLimit);
            }
            self.raise(TallyEvent::Counted);
            Ok(())
        }
    }

    /// Store that reports a conflict on the first `conflicts` appends.
    #[derive(Clone)]
    struct ConflictingStore {
        inner: InMemoryEventStore,
        conflicts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl EventStore for ConflictingStore {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> event_store::Result<Version> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: events[0].aggregate_id,
                    expected: options.expected_version.unwrap_or_default(),
                    actual: Version::new(99),
                });
            }
            self.inner.append(events, options).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn stream_all_events(&self) -> event_store::Result<EventStream> {
            self.inner.stream_all_events().await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }
    }

    async fn opened(handler: &CommandHandler<InMemoryEventStore, Tally>, limit: u32) -> AggregateId {
        let id = AggregateId::new();
        handler.execute(id, |t| t.open(id, limit)).await.unwrap();
        id
    }

    #[tokio::test]
    async fn creates_and_persists() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        let result = handler.execute(id, |t| t.open(id, 2)).await.unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.id(), Some(id));
        assert!(result.aggregate.pending_events().is_empty());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn rejection_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = opened(&handler, 0).await;

        let result = handler.execute(id, |t| t.count()).await;

        assert!(result.unwrap_err().is_rejection());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn no_events_means_no_append() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler.execute(AggregateId::new(), |_| Ok(())).await.unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_missing() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        assert!(handler.load_existing(AggregateId::new()).await.unwrap().is_none());

        let id = opened(&handler, 1).await;
        let tally = handler.load_existing(id).await.unwrap().unwrap();
        assert_eq!(tally.limit, 1);
        assert_eq!(tally.version(), Version::first());
    }

    #[tokio::test]
    async fn records_causation() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        let cause = Uuid::new_v4();

        handler
            .execute_caused_by(id, Some(cause), |t| t.open(id, 1))
            .await
            .unwrap();

        let events = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(events[0].causation_id(), Some(cause));
    }

    #[tokio::test]
    async fn retries_after_conflict() {
        let inner = InMemoryEventStore::new();
        let store = ConflictingStore {
            inner: inner.clone(),
            conflicts: Arc::new(AtomicU32::new(2)),
        };
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store);
        let id = AggregateId::new();

        let result = handler.execute(id, |t| t.open(id, 1)).await.unwrap();

        assert_eq!(result.new_version, Version::first());
        assert_eq!(inner.event_count().await, 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = ConflictingStore {
            inner: InMemoryEventStore::new(),
            conflicts: Arc::new(AtomicU32::new(10)),
        };
        let handler: CommandHandler<_, Tally> =
            CommandHandler::new(store).with_max_attempts(2);
        let id = AggregateId::new();

        let result = handler.execute(id, |t| t.open(id, 1)).await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyRetriesExhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_writers_respect_limit() {
        let store = InMemoryEventStore::new();
        let handler: Arc<CommandHandler<_, Tally>> =
            Arc::new(CommandHandler::new(store).with_max_attempts(50));
        let id = opened(&handler, 3).await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.execute(id, |t| t.count()).await })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(handler.load(id).await.unwrap().count, 3);
    }
}

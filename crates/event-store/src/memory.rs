use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    outbox::{Outbox, OutboxMessage, OutboxStatus},
    processed::ProcessedEventStore,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Debug, Clone)]
struct OutboxEntry {
    sequence: i64,
    event: EventEnvelope,
    status: OutboxStatus,
    attempts: u32,
    last_error: Option<String>,
    enqueued_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    fn to_message(&self) -> OutboxMessage {
        OutboxMessage {
            sequence: self.sequence,
            event: self.event.clone(),
            attempts: self.attempts,
            last_error: self.last_error.clone(),
            enqueued_at: self.enqueued_at,
        }
    }
}

#[derive(Default)]
struct State {
    /// Commit order.
    events: Vec<EventEnvelope>,
    outbox: Vec<OutboxEntry>,
    processed: HashSet<(String, Uuid)>,
}

impl State {
    fn current_version(&self, aggregate_id: AggregateId) -> Version {
        self.events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial())
    }

    fn outbox_entry_mut(&mut self, event_id: EventId) -> Result<&mut OutboxEntry> {
        self.outbox
            .iter_mut()
            .find(|entry| entry.event.event_id == event_id)
            .ok_or(EventStoreError::OutboxMessageNotFound(event_id))
    }
}

/// In-memory store used by tests and by the single-process deployment.
///
/// Events, outbox rows and the processed-message ledger sit behind one lock,
/// so an append and its outbox rows are observed together or not at all.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Status of the outbox row for an event.
    pub async fn outbox_status(&self, event_id: EventId) -> Option<OutboxStatus> {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .find(|entry| entry.event.event_id == event_id)
            .map(|entry| entry.status)
    }

    /// When the outbox row for an event was delivered.
    pub async fn delivered_at(&self, event_id: EventId) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .find(|entry| entry.event.event_id == event_id)
            .and_then(|entry| entry.delivered_at)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut state = self.state.write().await;
        let current_version = state.current_version(aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Mirrors the (aggregate_id, version) unique constraint in Postgres.
        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        let now = Utc::now();
        let mut event_sequence = state.events.len() as i64;
        let mut outbox_sequence = state.outbox.len() as i64;
        for event in &mut events {
            event_sequence += 1;
            outbox_sequence += 1;
            event.sequence = Some(event_sequence);
            state.outbox.push(OutboxEntry {
                sequence: outbox_sequence,
                event: event.clone(),
                status: OutboxStatus::Pending,
                attempts: 0,
                last_error: None,
                enqueued_at: now,
                delivered_at: None,
            });
        }
        state.events.extend(events);

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.state.read().await.events.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn stream_events_after(&self, sequence: i64) -> Result<EventStream> {
        use futures_util::stream;

        // Sequences are gapless here: event n sits at index n - 1.
        let skip = usize::try_from(sequence).unwrap_or(0);
        let events: Vec<_> = self
            .state
            .read()
            .await
            .events
            .iter()
            .skip(skip)
            .cloned()
            .collect();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }
}

#[async_trait]
impl Outbox for InMemoryEventStore {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|entry| entry.status == OutboxStatus::Pending)
            .take(limit)
            .map(OutboxEntry::to_message)
            .collect())
    }

    async fn mark_delivered(&self, event_id: EventId) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state.outbox_entry_mut(event_id)?;
        if entry.status == OutboxStatus::Pending {
            entry.status = OutboxStatus::Delivered;
            entry.delivered_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_failure(&self, event_id: EventId, error: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state.outbox_entry_mut(event_id)?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        Ok(())
    }

    async fn dead_letter(&self, event_id: EventId, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state.outbox_entry_mut(event_id)?;
        entry.status = OutboxStatus::DeadLettered;
        entry.last_error = Some(reason.to_string());
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|entry| entry.status == OutboxStatus::Pending)
            .count())
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryEventStore {
    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.processed.contains(&(consumer.to_string(), message_id)))
    }

    async fn mark_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.processed.insert((consumer.to_string(), message_id)))
    }
}

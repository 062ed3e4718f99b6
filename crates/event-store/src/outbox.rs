//! Transactional outbox.
//!
//! Every event appended to a store gets an outbox row in the same
//! transaction. A dispatcher drains pending rows in commit order, publishes
//! them, and marks each delivered only after the bus has accepted it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventEnvelope, EventId, Result};

/// Delivery state of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Delivered,
    /// Will never be delivered; kept for inspection.
    DeadLettered,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::DeadLettered => "dead_lettered",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending outbox row.
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    /// Commit order across the whole store.
    pub sequence: i64,
    pub event: EventEnvelope,
    /// Failed publish attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Read/acknowledge side of the outbox.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Returns up to `limit` pending rows, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Marks a row delivered. Delivering an already delivered row is a no-op.
    async fn mark_delivered(&self, event_id: EventId) -> Result<()>;

    /// Records a failed publish attempt; the row stays pending.
    async fn record_failure(&self, event_id: EventId, error: &str) -> Result<()>;

    /// Takes a row out of the pending set permanently.
    async fn dead_letter(&self, event_id: EventId, reason: &str) -> Result<()>;

    /// Number of rows still pending.
    async fn pending_count(&self) -> Result<usize>;
}

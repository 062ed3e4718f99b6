//! Ledger of integration messages a consumer has already applied.

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

/// Records which messages each consumer endpoint has applied, keyed by the
/// message's correlation id.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool>;

    /// Records the message as applied. Returns false if it was already recorded.
    async fn mark_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool>;
}

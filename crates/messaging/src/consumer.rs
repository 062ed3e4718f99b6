//! Integration event handlers and the idempotency guard.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::ProcessedEventStore;

use crate::bus::Endpoint;
use crate::error::ConsumerError;
use crate::event::IntegrationEvent;

/// Applies one integration event.
///
/// Returning an error makes the bus redeliver the event.
#[async_trait]
pub trait IntegrationEventHandler: Send + Sync {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError>;
}

#[async_trait]
impl<H: IntegrationEventHandler + ?Sized> IntegrationEventHandler for Arc<H> {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        (**self).handle(event).await
    }
}

/// Runs a handler at most once per `(endpoint, correlation_id)`.
///
/// The pair is recorded only after the handler succeeds, so a failed
/// attempt is retried on redelivery.
pub struct IdempotentHandler<P, H> {
    endpoint: String,
    processed: P,
    inner: H,
}

impl<P: ProcessedEventStore, H: IntegrationEventHandler> IdempotentHandler<P, H> {
    pub fn new(endpoint: &Endpoint, processed: P, inner: H) -> Self {
        Self {
            endpoint: endpoint.name().to_string(),
            processed,
            inner,
        }
    }
}

#[async_trait]
impl<P, H> IntegrationEventHandler for IdempotentHandler<P, H>
where
    P: ProcessedEventStore,
    H: IntegrationEventHandler,
{
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        if self
            .processed
            .is_processed(&self.endpoint, event.correlation_id)
            .await?
        {
            tracing::debug!(
                endpoint = %self.endpoint,
                correlation_id = %event.correlation_id,
                "Duplicate delivery skipped"
            );
            metrics::counter!("integration_events_duplicates_total", "endpoint" => self.endpoint.clone())
                .increment(1);
            return Ok(());
        }

        self.inner.handle(event).await?;

        self.processed
            .mark_processed(&self.endpoint, event.correlation_id)
            .await?;
        metrics::counter!("integration_events_consumed_total", "endpoint" => self.endpoint.clone())
            .increment(1);
        Ok(())
    }
}

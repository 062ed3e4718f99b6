//! Publishes integration events under their routing keys.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::error::BusError;
use crate::event::IntegrationEvent;

/// Routes each event to the kebab-case form of its type and counts what was
/// published.
#[derive(Clone)]
pub struct IntegrationEventPublisher {
    bus: Arc<dyn EventBus>,
}

impl IntegrationEventPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    #[tracing::instrument(
        skip(self, event),
        fields(event_type = event.event_type(), correlation_id = %event.correlation_id)
    )]
    pub async fn publish(&self, event: &IntegrationEvent) -> Result<(), BusError> {
        let routing_key = event.routing_key();
        match self.bus.publish(&routing_key, event).await {
            Ok(()) => {
                metrics::counter!("integration_events_published_total", "event_type" => event.event_type())
                    .increment(1);
                tracing::debug!(routing_key, "Integration event published");
                Ok(())
            }
            Err(error) => {
                metrics::counter!("integration_events_publish_failures_total", "event_type" => event.event_type())
                    .increment(1);
                tracing::warn!(routing_key, error = %error, "Publish failed");
                Err(error)
            }
        }
    }
}

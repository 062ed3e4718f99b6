//! Message bus port.

use async_trait::async_trait;

use crate::error::BusError;
use crate::event::{IntegrationEvent, routing_key};

/// Publishes integration events to every endpoint bound to a routing key.
///
/// A successful return means the bus has taken responsibility for the
/// message; delivery to endpoints happens after that.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, routing_key: &str, event: &IntegrationEvent) -> Result<(), BusError>;
}

/// A named consumer queue bound to one event type.
///
/// Names follow `<event-kebab>-<service>`, e.g. `user-created-course-catalog`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    name: String,
    routing_key: String,
    concurrency_limit: usize,
}

impl Endpoint {
    /// Endpoint of `service` for events of `event_type` (e.g. `"UserCreated"`),
    /// handling at most `concurrency_limit` messages at once.
    pub fn new(event_type: &str, service: &str, concurrency_limit: usize) -> Self {
        let routing_key = routing_key(event_type);
        Self {
            name: format!("{routing_key}-{service}"),
            routing_key,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

//! In-process message bus.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock, Semaphore, mpsc};

use crate::bus::{Endpoint, EventBus};
use crate::consumer::IntegrationEventHandler;
use crate::error::BusError;
use crate::event::IntegrationEvent;

/// Redelivery policy of an [`InMemoryBus`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Redeliveries after the first failed attempt before dead-lettering.
    pub max_redeliveries: u32,
    pub redelivery_delay: Duration,
    /// How many published messages and dead letters are kept for
    /// inspection. The oldest are dropped first.
    pub history_limit: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: 3,
            redelivery_delay: Duration::from_millis(100),
            history_limit: 1000,
        }
    }
}

/// A message an endpoint gave up on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub endpoint: String,
    /// The message as it was on the wire.
    pub message: String,
    pub error: String,
    pub attempts: u32,
}

impl DeadLetter {
    pub fn event(&self) -> Result<IntegrationEvent, serde_json::Error> {
        serde_json::from_str(&self.message)
    }
}

struct Delivery {
    message: Arc<str>,
    attempt: u32,
}

struct Route {
    endpoint: Endpoint,
    sender: mpsc::UnboundedSender<Delivery>,
}

struct BusInner {
    config: BusConfig,
    routes: RwLock<HashMap<String, Vec<Route>>>,
    available: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
    published: Mutex<VecDeque<IntegrationEvent>>,
}

fn push_bounded<T>(history: &mut VecDeque<T>, item: T, limit: usize) {
    if limit == 0 {
        return;
    }
    while history.len() >= limit {
        history.pop_front();
    }
    history.push_back(item);
}

impl BusInner {
    /// One delivery reached its final outcome.
    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn dead_letter(&self, endpoint: &Endpoint, delivery: Delivery, error: String) {
        tracing::error!(
            endpoint = %endpoint,
            attempts = delivery.attempt,
            error = %error,
            "Message dead-lettered"
        );
        metrics::counter!("bus_dead_letters_total", "endpoint" => endpoint.name().to_string())
            .increment(1);
        let letter = DeadLetter {
            endpoint: endpoint.name().to_string(),
            message: delivery.message.to_string(),
            error,
            attempts: delivery.attempt,
        };
        push_bounded(
            &mut *self.dead_letters.lock().await,
            letter,
            self.config.history_limit,
        );
        self.finish();
    }
}

/// Message bus living in the current process.
///
/// Each subscribed [`Endpoint`] gets its own queue and worker task. The
/// worker runs up to the endpoint's concurrency limit of handlers at once.
/// A failed handler is redelivered after [`BusConfig::redelivery_delay`];
/// once [`BusConfig::max_redeliveries`] is used up the message is
/// dead-lettered.
///
/// Messages travel as their JSON encoding, so every consumer decodes what a
/// network broker would hand it.
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<BusInner>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                routes: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                dead_letters: Mutex::new(VecDeque::new()),
                published: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Binds `handler` to `endpoint` and starts the endpoint's worker.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn subscribe<H>(&self, endpoint: Endpoint, handler: H)
    where
        H: IntegrationEventHandler + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_endpoint(
            Arc::clone(&self.inner),
            endpoint.clone(),
            Arc::new(handler),
            sender.downgrade(),
            receiver,
        ));

        tracing::info!(endpoint = %endpoint, limit = endpoint.concurrency_limit(), "Endpoint subscribed");
        self.inner
            .routes
            .write()
            .await
            .entry(endpoint.routing_key().to_string())
            .or_default()
            .push(Route { endpoint, sender });
    }

    /// While unavailable, every publish fails with [`BusError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Deliveries not yet handled, redelivered or dead-lettered.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until every delivery has reached a final outcome.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// The most recent dead letters, oldest first, up to
    /// [`BusConfig::history_limit`].
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead_letters.lock().await.iter().cloned().collect()
    }

    /// The most recent accepted messages in publish order, up to
    /// [`BusConfig::history_limit`].
    pub async fn published(&self) -> Vec<IntegrationEvent> {
        self.inner.published.lock().await.iter().cloned().collect()
    }

    pub async fn endpoints(&self) -> Vec<String> {
        let routes = self.inner.routes.read().await;
        let mut names: Vec<_> = routes
            .values()
            .flatten()
            .map(|route| route.endpoint.name().to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, routing_key: &str, event: &IntegrationEvent) -> Result<(), BusError> {
        if !self.is_available() {
            return Err(BusError::Unavailable);
        }

        let message: Arc<str> = serde_json::to_string(event)?.into();
        let routes = self.inner.routes.read().await;
        push_bounded(
            &mut *self.inner.published.lock().await,
            event.clone(),
            self.inner.config.history_limit,
        );

        let Some(routes) = routes.get(routing_key) else {
            tracing::debug!(routing_key, "No endpoint bound, message dropped");
            return Ok(());
        };

        for route in routes {
            self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
            let delivery = Delivery {
                message: Arc::clone(&message),
                attempt: 1,
            };
            if let Err(mpsc::error::SendError(delivery)) = route.sender.send(delivery) {
                self.inner
                    .dead_letter(&route.endpoint, delivery, "endpoint stopped".to_string())
                    .await;
            }
        }
        Ok(())
    }
}

async fn run_endpoint(
    inner: Arc<BusInner>,
    endpoint: Endpoint,
    handler: Arc<dyn IntegrationEventHandler>,
    redeliver: mpsc::WeakUnboundedSender<Delivery>,
    mut receiver: mpsc::UnboundedReceiver<Delivery>,
) {
    let permits = Arc::new(Semaphore::new(endpoint.concurrency_limit()));

    while let Some(delivery) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let inner = Arc::clone(&inner);
        let endpoint = endpoint.clone();
        let handler = Arc::clone(&handler);
        let redeliver = redeliver.clone();

        tokio::spawn(async move {
            let event: IntegrationEvent = match serde_json::from_str(&delivery.message) {
                Ok(event) => event,
                Err(error) => {
                    drop(permit);
                    inner
                        .dead_letter(&endpoint, delivery, format!("undecodable message: {error}"))
                        .await;
                    return;
                }
            };

            let result = handler.handle(&event).await;
            drop(permit);

            let error = match result {
                Ok(()) => {
                    inner.finish();
                    return;
                }
                Err(error) => error.to_string(),
            };

            if delivery.attempt > inner.config.max_redeliveries {
                inner.dead_letter(&endpoint, delivery, error).await;
                return;
            }

            tracing::warn!(
                endpoint = %endpoint,
                correlation_id = %event.correlation_id,
                attempt = delivery.attempt,
                error = %error,
                "Handler failed, scheduling redelivery"
            );
            metrics::counter!("bus_redeliveries_total", "endpoint" => endpoint.name().to_string())
                .increment(1);
            tokio::time::sleep(inner.config.redelivery_delay).await;

            let next = Delivery {
                message: delivery.message,
                attempt: delivery.attempt + 1,
            };
            let Some(sender) = redeliver.upgrade() else {
                inner.dead_letter(&endpoint, next, error).await;
                return;
            };
            if let Err(mpsc::error::SendError(next)) = sender.send(next) {
                inner.dead_letter(&endpoint, next, error).await;
            }
        });
    }

    tracing::debug!(endpoint = %endpoint, "Endpoint worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsumerError;
    use crate::event::IntegrationPayload;
    use chrono::Utc;
    use common::UserId;
    use std::sync::atomic::AtomicU32;

    fn deactivated() -> IntegrationEvent {
        IntegrationEvent::new(IntegrationPayload::UserDeactivated {
            user_id: UserId::new(),
            email: "ada@uni.test".into(),
            user_type: "CourseCoordinator".into(),
            deactivated_at: Utc::now(),
        })
    }

    fn fast_config(max_redeliveries: u32) -> BusConfig {
        BusConfig {
            max_redeliveries,
            redelivery_delay: Duration::from_millis(1),
            ..BusConfig::default()
        }
    }

    /// Fails the first `failures` calls.
    #[derive(Default)]
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl IntegrationEventHandler for Flaky {
        async fn handle(&self, _event: &IntegrationEvent) -> Result<(), ConsumerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ConsumerError::UnexpectedEvent("not yet".into()));
            }
            Ok(())
        }
    }

    /// Records the highest number of concurrent calls.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl IntegrationEventHandler for Gauge {
        async fn handle(&self, _event: &IntegrationEvent) -> Result<(), ConsumerError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_to_every_bound_endpoint() {
        let bus = InMemoryBus::new();
        let catalog = Arc::new(Flaky::default());
        let other = Arc::new(Flaky::default());
        bus.subscribe(
            Endpoint::new("UserDeactivated", "course-catalog", 3),
            Arc::clone(&catalog),
        )
        .await;
        bus.subscribe(
            Endpoint::new("UserDeactivated", "registration", 3),
            Arc::clone(&other),
        )
        .await;

        let event = deactivated();
        bus.publish(&event.routing_key(), &event).await.unwrap();
        bus.wait_idle().await;

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.published().await, vec![event]);
    }

    #[tokio::test]
    async fn unavailable_bus_rejects_publish() {
        let bus = InMemoryBus::new();
        bus.set_available(false);

        let event = deactivated();
        let err = bus.publish(&event.routing_key(), &event).await.unwrap_err();
        assert!(matches!(err, BusError::Unavailable));
        assert!(bus.published().await.is_empty());

        bus.set_available(true);
        bus.publish(&event.routing_key(), &event).await.unwrap();
    }

    #[tokio::test]
    async fn failed_handler_is_redelivered() {
        let bus = InMemoryBus::with_config(fast_config(3));
        let handler = Arc::new(Flaky {
            failures: 2,
            ..Flaky::default()
        });
        bus.subscribe(
            Endpoint::new("UserDeactivated", "course-catalog", 1),
            Arc::clone(&handler),
        )
        .await;

        let event = deactivated();
        bus.publish(&event.routing_key(), &event).await.unwrap();
        bus.wait_idle().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(bus.dead_letters().await.is_empty());
    }

    #[tokio::test]
    async fn exhausted_redeliveries_dead_letter() {
        let bus = InMemoryBus::with_config(fast_config(2));
        let handler = Arc::new(Flaky {
            failures: u32::MAX,
            ..Flaky::default()
        });
        bus.subscribe(
            Endpoint::new("UserDeactivated", "course-catalog", 1),
            Arc::clone(&handler),
        )
        .await;

        let event = deactivated();
        bus.publish(&event.routing_key(), &event).await.unwrap();
        bus.wait_idle().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        let dead = bus.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].endpoint, "user-deactivated-course-catalog");
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].event().unwrap(), event);
    }

    #[tokio::test]
    async fn concurrency_limit_is_respected() {
        let bus = InMemoryBus::new();
        let gauge = Arc::new(Gauge::default());
        bus.subscribe(
            Endpoint::new("UserDeactivated", "course-catalog", 3),
            Arc::clone(&gauge),
        )
        .await;

        for _ in 0..12 {
            let event = deactivated();
            bus.publish(&event.routing_key(), &event).await.unwrap();
        }
        bus.wait_idle().await;

        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn published_history_keeps_only_the_latest() {
        let bus = InMemoryBus::with_config(BusConfig {
            history_limit: 100,
            ..BusConfig::default()
        });

        let mut last = None;
        for _ in 0..10_000 {
            let event = deactivated();
            bus.publish(&event.routing_key(), &event).await.unwrap();
            last = Some(event);
        }

        let published = bus.published().await;
        assert_eq!(published.len(), 100);
        assert_eq!(published.last(), last.as_ref());
    }

    #[tokio::test]
    async fn dead_letter_history_is_bounded() {
        let bus = InMemoryBus::with_config(BusConfig {
            history_limit: 2,
            ..fast_config(0)
        });
        bus.subscribe(
            Endpoint::new("UserDeactivated", "course-catalog", 1),
            Arc::new(Flaky {
                failures: u32::MAX,
                ..Flaky::default()
            }),
        )
        .await;

        let mut events = Vec::new();
        for _ in 0..5 {
            let event = deactivated();
            bus.publish(&event.routing_key(), &event).await.unwrap();
            events.push(event);
        }
        bus.wait_idle().await;

        let dead = bus.dead_letters().await;
        assert_eq!(dead.len(), 2);
        assert_eq!(dead[1].attempts, 1);
        assert!(dead.iter().all(|letter| events.contains(&letter.event().unwrap())));
    }

    #[tokio::test]
    async fn unbound_routing_key_is_accepted() {
        let bus = InMemoryBus::new();
        let event = deactivated();
        bus.publish("nobody-listens", &event).await.unwrap();
        bus.wait_idle().await;
        assert_eq!(bus.in_flight(), 0);
        assert!(bus.endpoints().await.is_empty());
    }
}

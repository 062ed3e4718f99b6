//! Outbox dispatcher: moves committed events from a store's outbox onto the bus.

use std::time::Duration;

use event_store::Outbox;
use tokio::sync::watch;

use crate::error::DispatchError;
use crate::publisher::IntegrationEventPublisher;
use crate::translator::EventTranslator;

/// Polling and backoff settings of an [`OutboxDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    /// Upper bound of the delay between passes while the bus is failing.
    pub max_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// What one dispatch pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub published: usize,
    /// Private events marked delivered without publishing.
    pub not_published: usize,
    pub dead_lettered: usize,
    /// Publish attempts the bus refused. The pass stops at the first one.
    pub failed: usize,
}

impl DispatchReport {
    /// Rows that left the pending set.
    pub fn settled(&self) -> usize {
        self.published + self.not_published + self.dead_lettered
    }
}

/// Publishes a service's pending outbox rows in commit order.
///
/// A row is marked delivered only after the bus accepted its integration
/// event. When the bus refuses one, the failure is recorded on the row and
/// the pass stops there, so later rows never overtake it.
pub struct OutboxDispatcher<O: Outbox> {
    service: String,
    outbox: O,
    translator: EventTranslator,
    publisher: IntegrationEventPublisher,
    config: DispatcherConfig,
}

impl<O: Outbox> OutboxDispatcher<O> {
    pub fn new(
        service: impl Into<String>,
        outbox: O,
        translator: EventTranslator,
        publisher: IntegrationEventPublisher,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            service: service.into(),
            outbox,
            translator,
            publisher,
            config,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Runs one pass over at most `batch_size` pending rows.
    #[tracing::instrument(skip(self), fields(service = %self.service))]
    pub async fn dispatch_pending(&self) -> Result<DispatchReport, DispatchError> {
        let batch = self.outbox.pending(self.config.batch_size).await?;
        let mut report = DispatchReport::default();

        for message in batch {
            let event_id = message.event.event_id;

            let event = match self.translator.translate(&message.event) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    self.outbox.mark_delivered(event_id).await?;
                    report.not_published += 1;
                    continue;
                }
                Err(error) => {
                    tracing::error!(
                        %event_id,
                        event_type = %message.event.event_type,
                        error = %error,
                        "Untranslatable outbox message"
                    );
                    self.outbox.dead_letter(event_id, &error.to_string()).await?;
                    report.dead_lettered += 1;
                    continue;
                }
            };

            if let Err(error) = self.publisher.publish(&event).await {
                self.outbox
                    .record_failure(event_id, &error.to_string())
                    .await?;
                report.failed += 1;
                break;
            }
            self.outbox.mark_delivered(event_id).await?;
            report.published += 1;
        }

        let pending = self.outbox.pending_count().await?;
        metrics::gauge!("outbox_pending_messages", "service" => self.service.clone())
            .set(pending as f64);
        if report.settled() > 0 || report.failed > 0 {
            tracing::debug!(
                published = report.published,
                not_published = report.not_published,
                dead_lettered = report.dead_lettered,
                failed = report.failed,
                pending,
                "Outbox pass finished"
            );
        }

        Ok(report)
    }

    /// Dispatches until `shutdown` turns true.
    ///
    /// Polls every `poll_interval`, immediately again after a full batch, and
    /// backs off exponentially up to `max_backoff` while passes fail.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(service = %self.service, "Outbox dispatcher started");
        let mut backoff = self.config.poll_interval;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.dispatch_pending().await {
                Ok(report) if report.failed > 0 => {
                    backoff = backoff.saturating_mul(2).min(self.config.max_backoff);
                    tracing::warn!(
                        service = %self.service,
                        retry_in_ms = backoff.as_millis() as u64,
                        "Bus refused a message, backing off"
                    );
                    backoff
                }
                Ok(report) => {
                    backoff = self.config.poll_interval;
                    if report.settled() >= self.config.batch_size {
                        Duration::ZERO
                    } else {
                        self.config.poll_interval
                    }
                }
                Err(error) => {
                    backoff = backoff.saturating_mul(2).min(self.config.max_backoff);
                    tracing::error!(service = %self.service, error = %error, "Outbox pass failed");
                    backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(service = %self.service, "Outbox dispatcher stopped");
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    outbox::{Outbox, OutboxMessage, OutboxStatus},
    processed::ProcessedEventStore,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const EVENT_COLUMNS: &str = "sequence, id, event_type, aggregate_id, aggregate_type, version, \
                             timestamp, payload, metadata";

/// Advisory lock key held by every append until it commits. Appends are
/// serialized so that sequence order is also visibility order.
const APPEND_LOCK_KEY: i64 = 0x6576_656e_7473;

/// PostgreSQL-backed store. One database per service.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and runs the migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: &PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
            sequence: Some(row.try_get("sequence")?),
        })
    }

    fn row_to_outbox_message(row: &PgRow) -> Result<OutboxMessage> {
        let attempts: i32 = row.try_get("attempts")?;
        Ok(OutboxMessage {
            sequence: row.try_get("outbox_sequence")?,
            event: Self::row_to_event(row)?,
            attempts: attempts.max(0) as u32,
            last_error: row.try_get("last_error")?,
            enqueued_at: row.try_get::<DateTime<Utc>, _>("enqueued_at")?,
        })
    }

    async fn update_outbox(&self, event_id: EventId, sql: &str, text: Option<&str>) -> Result<()> {
        let mut query = sqlx::query(sql).bind(event_id.as_uuid());
        if let Some(text) = text {
            query = query.bind(text);
        }
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM outbox WHERE event_id = $1)")
                    .bind(event_id.as_uuid())
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(EventStoreError::OutboxMessageNotFound(event_id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        if let Some(expected) = options.expected_version {
            let current_version: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                    .bind(aggregate_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;

            let actual = Version::new(current_version.unwrap_or(0));
            if actual != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_version = Version::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent writer committed the same version first.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;

            sqlx::query("INSERT INTO outbox (event_id) VALUES ($1)")
                .bind(event.event_id.as_uuid())
                .execute(&mut *tx)
                .await?;

            last_version = event.version;
        }

        tx.commit().await?;
        tracing::debug!(
            aggregate_id = %aggregate_id,
            count = events.len(),
            version = %last_version,
            "Appended events"
        );
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_after(0).await
    }

    async fn stream_events_after(&self, sequence: i64) -> Result<EventStream> {
        use futures_util::StreamExt;

        let pool = self.pool.clone();
        let stream = async_stream_rows(pool, sequence).map(|result| match result {
            Ok(row) => Self::row_to_event(&row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}

/// Fetches the event rows after `after` in commit order.
fn async_stream_rows(
    pool: PgPool,
    after: i64,
) -> impl futures_core::Stream<Item = std::result::Result<PgRow, sqlx::Error>> + Send {
    use futures_util::{TryStreamExt, stream};

    stream::once(async move {
        sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE sequence > $1 ORDER BY sequence ASC"
        ))
        .bind(after)
        .fetch_all(&pool)
        .await
    })
    .map_ok(|rows| stream::iter(rows.into_iter().map(Ok)))
    .try_flatten()
}

#[async_trait]
impl Outbox for PostgresEventStore {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT o.sequence AS outbox_sequence, o.attempts, o.last_error, o.enqueued_at,
                   e.sequence, e.id, e.event_type, e.aggregate_id, e.aggregate_type, e.version,
                   e.timestamp, e.payload, e.metadata
            FROM outbox o
            JOIN events e ON e.id = o.event_id
            WHERE o.status = 'pending'
            ORDER BY o.sequence ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_outbox_message).collect()
    }

    async fn mark_delivered(&self, event_id: EventId) -> Result<()> {
        self.update_outbox(
            event_id,
            "UPDATE outbox SET status = 'delivered', delivered_at = now() \
             WHERE event_id = $1 AND status = 'pending'",
            None,
        )
        .await
    }

    async fn record_failure(&self, event_id: EventId, error: &str) -> Result<()> {
        self.update_outbox(
            event_id,
            "UPDATE outbox SET attempts = attempts + 1, last_error = $2 WHERE event_id = $1",
            Some(error),
        )
        .await
    }

    async fn dead_letter(&self, event_id: EventId, reason: &str) -> Result<()> {
        tracing::warn!(event_id = %event_id, reason, "Dead-lettering outbox message");
        let sql = format!(
            "UPDATE outbox SET status = '{}', last_error = $2 WHERE event_id = $1",
            OutboxStatus::DeadLettered.as_str()
        );
        self.update_outbox(event_id, &sql, Some(reason)).await
    }

    async fn pending_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresEventStore {
    async fn is_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_messages WHERE consumer = $1 AND message_id = $2)",
        )
        .bind(consumer)
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn mark_processed(&self, consumer: &str, message_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_messages (consumer, message_id) VALUES ($1, $2) \
             ON CONFLICT (consumer, message_id) DO NOTHING",
        )
        .bind(consumer)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

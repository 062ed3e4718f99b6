use common::AggregateId;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Outbox, ProcessedEventStore,
    Version,
};
use uuid::Uuid;

fn enrollment_event(course_id: AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(course_id)
        .aggregate_type("Course")
        .event_type("StudentEnrolled")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "StudentEnrolled",
            "data": {
                "course_id": course_id.to_string(),
                "course_code": "CS101",
                "current_enrollment": version,
                "max_capacity": 500
            }
        }))
        .build()
        .unwrap()
}

fn bench_append_with_outbox(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("event_store/append_with_outbox");

    for batch in [1_i64, 10] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                rt.block_on(async {
                    let store = InMemoryEventStore::new();
                    let id = AggregateId::new();
                    let events: Vec<_> = (1..=batch).map(|v| enrollment_event(id, v)).collect();
                    store.append(events, AppendOptions::expect_new()).await.unwrap();
                });
            });
        });
    }
    group.finish();
}

fn bench_load_course_history(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let id = AggregateId::new();

    rt.block_on(async {
        let events: Vec<_> = (1..=200).map(|v| enrollment_event(id, v)).collect();
        store.append(events, AppendOptions::expect_new()).await.unwrap();
    });

    c.bench_function("event_store/load_200_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.get_events_for_aggregate(id).await.unwrap();
            });
        });
    });
}

fn bench_drain_outbox(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/drain_outbox_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                for _ in 0..10 {
                    let id = AggregateId::new();
                    let events: Vec<_> = (1..=10).map(|v| enrollment_event(id, v)).collect();
                    store.append(events, AppendOptions::expect_new()).await.unwrap();
                }
                loop {
                    let batch = store.pending(25).await.unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    for message in batch {
                        store.mark_delivered(message.event.event_id).await.unwrap();
                    }
                }
            });
        });
    });
}

fn bench_processed_ledger(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();

    c.bench_function("event_store/mark_processed", |b| {
        b.iter(|| {
            rt.block_on(async {
                let message = Uuid::new_v4();
                store
                    .mark_processed("user-deactivated-course-catalog", message)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_with_outbox,
    bench_load_course_history,
    bench_drain_outbox,
    bench_processed_ledger,
);
criterion_main!(benches);

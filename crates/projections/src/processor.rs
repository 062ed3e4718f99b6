//! Projection processor for feeding events to projections.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::{Projection, ProjectionPosition};

/// How long a hole in the commit sequence is waited on before it is
/// treated as an abandoned append.
pub const DEFAULT_GAP_TIMEOUT: Duration = Duration::from_secs(10);

struct Progress {
    positions: Vec<ProjectionPosition>,
    /// First sighting of each open hole, keyed by its first missing sequence.
    gaps: HashMap<i64, Instant>,
}

/// Replays an event store into its registered projections.
///
/// - Catch-up: streams the events after the lowest watermark and delivers
///   each one to every projection that has not handled its sequence yet
/// - Single event delivery to all projections
/// - Rebuild: resets every projection and replays from scratch
///
/// A sequence that shows up late, after later ones were handled, is still
/// delivered. Holes that stay open past the gap timeout are skipped.
/// Catch-up runs are serialized, so callers on different tasks may all ask
/// for a catch-up before reading a view.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    progress: Mutex<Progress>,
    gap_timeout: Duration,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            progress: Mutex::new(Progress {
                positions: Vec::new(),
                gaps: HashMap::new(),
            }),
            gap_timeout: DEFAULT_GAP_TIMEOUT,
        }
    }

    pub fn with_gap_timeout(mut self, gap_timeout: Duration) -> Self {
        self.gap_timeout = gap_timeout;
        self
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
        self.progress
            .get_mut()
            .positions
            .push(ProjectionPosition::zero());
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Position of the projection registered under `name`.
    pub async fn position(&self, name: &str) -> Option<ProjectionPosition> {
        let progress = self.progress.lock().await;
        self.projections
            .iter()
            .position(|p| p.name() == name)
            .map(|index| progress.positions[index].clone())
    }

    /// Brings every projection up to the end of the store.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut progress = self.progress.lock().await;
        let from = progress
            .positions
            .iter()
            .map(ProjectionPosition::watermark)
            .min()
            .unwrap_or(0);

        let mut stream = self.store.stream_events_after(from).await?;
        let mut events_seen: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            let sequence = event
                .sequence
                .ok_or(ProjectionError::Unsequenced(event.event_id))?;
            events_seen += 1;

            for (projection, position) in self.projections.iter().zip(progress.positions.iter_mut())
            {
                if position.has_seen(sequence) {
                    continue;
                }
                projection.handle(&event).await?;
                position.record(sequence);
                delivered += 1;
                metrics::counter!(
                    "projections_events_processed",
                    "projection" => projection.name()
                )
                .increment(1);
            }
        }

        self.settle_gaps(&mut progress);
        tracing::debug!(from, events_seen, delivered, "catch-up complete");

        Ok(())
    }

    fn settle_gaps(&self, progress: &mut Progress) {
        let now = Instant::now();
        let Progress { positions, gaps } = progress;

        let open: HashSet<i64> = positions
            .iter()
            .filter_map(|p| p.gap().map(|(start, _)| start))
            .collect();
        gaps.retain(|start, _| open.contains(start));

        for (projection, position) in self.projections.iter().zip(positions.iter_mut()) {
            while let Some((start, end)) = position.gap() {
                let first_seen = *gaps.entry(start).or_insert(now);
                if now.duration_since(first_seen) < self.gap_timeout {
                    break;
                }
                tracing::warn!(
                    projection = projection.name(),
                    start,
                    end,
                    "Skipping sequence gap"
                );
                position.skip_gap();
            }
        }
    }

    /// Delivers one event to every projection. A stored event that a
    /// projection already handled is not delivered to it again.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        let mut progress = self.progress.lock().await;
        for (projection, position) in self.projections.iter().zip(progress.positions.iter_mut()) {
            if let Some(sequence) = event.sequence {
                if position.has_seen(sequence) {
                    continue;
                }
                projection.handle(event).await?;
                position.record(sequence);
            } else {
                projection.handle(event).await?;
            }
        }
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        {
            let mut progress = self.progress.lock().await;
            for (projection, position) in
                self.projections.iter().zip(progress.positions.iter_mut())
            {
                projection.reset().await?;
                *position = ProjectionPosition::zero();
            }
            progress.gaps.clear();
        }
        self.run_catch_up().await
    }
}

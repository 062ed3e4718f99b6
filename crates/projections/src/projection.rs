//! The projection trait and its replay position.

use std::collections::BTreeSet;

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Which stored events a projection has handled, by commit sequence.
///
/// Every sequence at or below the watermark is handled. Events handled past
/// a hole in the sequence are kept aside until the hole is filled by a late
/// commit or skipped as abandoned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    watermark: i64,
    ahead: BTreeSet<i64>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn has_seen(&self, sequence: i64) -> bool {
        sequence <= self.watermark || self.ahead.contains(&sequence)
    }

    pub fn record(&mut self, sequence: i64) {
        if self.has_seen(sequence) {
            return;
        }
        self.ahead.insert(sequence);
        self.absorb();
    }

    /// The first hole above the watermark, as an inclusive range.
    pub fn gap(&self) -> Option<(i64, i64)> {
        self.ahead
            .first()
            .map(|&next| (self.watermark + 1, next - 1))
    }

    /// Gives up on the first hole and moves the watermark past it.
    pub fn skip_gap(&mut self) {
        if let Some((_, end)) = self.gap() {
            self.watermark = end;
            self.absorb();
        }
    }

    fn absorb(&mut self) {
        while self.ahead.first() == Some(&(self.watermark + 1)) {
            self.ahead.pop_first();
            self.watermark += 1;
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.gap() {
            Some((start, end)) => write!(f, "position({}, waiting on {start}..={end})", self.watermark),
            None => write!(f, "position({})", self.watermark),
        }
    }
}

/// Folds stored events into a read model.
///
/// `handle` is called once per stored event in commit order, including
/// events of aggregates the projection ignores. The processor driving it
/// keeps the position.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Drops all state.
    async fn reset(&self) -> Result<()>;
}

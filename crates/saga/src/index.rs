//! Lookup of the courses a user coordinates.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use event_store::EventStore;
use projections::{CoordinatorAssignmentsView, ProjectionProcessor};

use crate::error::Result;

/// Answers which active courses a user currently coordinates.
#[async_trait]
pub trait AssignmentIndex: Send + Sync {
    async fn active_courses_for(&self, user_id: UserId) -> Result<Vec<AggregateId>>;
}

/// [`AssignmentIndex`] backed by the coordinator assignments projection.
///
/// Every lookup first catches the projection up with the store, so courses
/// created or reassigned just before the lookup are seen.
pub struct ProjectedAssignments<S: EventStore> {
    processor: Arc<ProjectionProcessor<S>>,
    view: CoordinatorAssignmentsView,
}

impl<S: EventStore> ProjectedAssignments<S> {
    /// `view` must be registered with `processor`.
    pub fn new(processor: Arc<ProjectionProcessor<S>>, view: CoordinatorAssignmentsView) -> Self {
        Self { processor, view }
    }

    /// Builds a processor over `store` that feeds a fresh view.
    pub fn over(store: S) -> Self {
        let view = CoordinatorAssignmentsView::new();
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(view.clone()));
        Self::new(Arc::new(processor), view)
    }

    pub fn view(&self) -> &CoordinatorAssignmentsView {
        &self.view
    }
}

#[async_trait]
impl<S: EventStore> AssignmentIndex for ProjectedAssignments<S> {
    async fn active_courses_for(&self, user_id: UserId) -> Result<Vec<AggregateId>> {
        self.processor.run_catch_up().await?;
        Ok(self
            .view
            .active_courses_for(user_id)
            .await
            .into_iter()
            .map(|course| course.course_id)
            .collect())
    }
}

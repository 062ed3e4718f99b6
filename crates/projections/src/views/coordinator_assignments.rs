//! Coordinator assignments read model: which courses each user coordinates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use domain::{Course, CourseEvent};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::Projection;
use crate::read_model::ReadModel;

/// A course and its current coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseAssignment {
    pub course_id: AggregateId,
    pub course_code: String,
    pub title: String,
    pub coordinator_id: UserId,
    pub is_active: bool,
}

struct AssignmentsState {
    courses: HashMap<AggregateId, CourseAssignment>,
}

/// Index of course coordinators, fed from the course catalog's events.
#[derive(Clone)]
pub struct CoordinatorAssignmentsView {
    state: Arc<RwLock<AssignmentsState>>,
}

impl CoordinatorAssignmentsView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AssignmentsState {
                courses: HashMap::new(),
            })),
        }
    }

    pub async fn get(&self, course_id: AggregateId) -> Option<CourseAssignment> {
        self.state.read().await.courses.get(&course_id).cloned()
    }

    /// Active courses coordinated by `user_id`, ordered by course code.
    pub async fn active_courses_for(&self, user_id: UserId) -> Vec<CourseAssignment> {
        let state = self.state.read().await;
        let mut courses: Vec<_> = state
            .courses
            .values()
            .filter(|c| c.is_active && c.coordinator_id == user_id)
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.course_code.cmp(&b.course_code));
        courses
    }

    pub async fn active_count(&self) -> usize {
        self.state
            .read()
            .await
            .courses
            .values()
            .filter(|c| c.is_active)
            .count()
    }
}

impl Default for CoordinatorAssignmentsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for CoordinatorAssignmentsView {
    fn name(&self) -> &'static str {
        "CoordinatorAssignmentsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != <Course as domain::Aggregate>::aggregate_type() {
            return Ok(());
        }

        let course_event: CourseEvent = serde_json::from_value(event.payload.clone())
            .map_err(|e| ProjectionError::undecodable(self.name(), event, e))?;
        let mut state = self.state.write().await;

        match course_event {
            CourseEvent::CourseCreated(data) => {
                state.courses.insert(
                    data.course_id,
                    CourseAssignment {
                        course_id: data.course_id,
                        course_code: data.course_code.to_string(),
                        title: data.title,
                        coordinator_id: data.coordinator_id,
                        is_active: true,
                    },
                );
            }
            CourseEvent::CourseUpdated(data) => {
                if let Some(course) = state.courses.get_mut(&data.course_id) {
                    course.title = data.title;
                }
            }
            CourseEvent::CoordinatorReassigned(data) => {
                if let Some(course) = state.courses.get_mut(&data.course_id) {
                    course.coordinator_id = data.new_coordinator_id;
                }
            }
            CourseEvent::CourseDeactivated(data) => {
                if let Some(course) = state.courses.get_mut(&data.course_id) {
                    course.is_active = false;
                }
            }
            // Enrollment, capacity and prerequisites don't affect assignments
            CourseEvent::StudentEnrolled(_)
            | CourseEvent::StudentDropped(_)
            | CourseEvent::CourseFull(_)
            | CourseEvent::CapacityUpdated(_)
            | CourseEvent::PrerequisiteAdded(_)
            | CourseEvent::PrerequisiteRemoved(_) => {}
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.courses.clear();
        Ok(())
    }
}

impl ReadModel for CoordinatorAssignmentsView {
    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.courses.len())
            .unwrap_or(0)
    }
}

//! Student directory read model: lookup by student number and by user.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, DepartmentId, UserId};
use domain::{Cgpa, Student, StudentEvent, StudentNumber, StudentStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::Projection;
use crate::read_model::ReadModel;

/// Directory entry for one student.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentEntry {
    pub student_id: AggregateId,
    pub student_number: StudentNumber,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub program: String,
    pub status: StudentStatus,
    pub current_cgpa: Cgpa,
}

struct DirectoryState {
    students: HashMap<AggregateId, StudentEntry>,
    by_number: HashMap<StudentNumber, AggregateId>,
    by_user: HashMap<UserId, AggregateId>,
}

/// Directory of student records, fed from the student service's events.
#[derive(Clone)]
pub struct StudentDirectoryView {
    state: Arc<RwLock<DirectoryState>>,
}

impl StudentDirectoryView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState {
                students: HashMap::new(),
                by_number: HashMap::new(),
                by_user: HashMap::new(),
            })),
        }
    }

    pub async fn get(&self, student_id: AggregateId) -> Option<StudentEntry> {
        self.state.read().await.students.get(&student_id).cloned()
    }

    pub async fn find_by_number(&self, number: &StudentNumber) -> Option<StudentEntry> {
        let state = self.state.read().await;
        state
            .by_number
            .get(number)
            .and_then(|id| state.students.get(id))
            .cloned()
    }

    pub async fn find_by_user(&self, user_id: UserId) -> Option<StudentEntry> {
        let state = self.state.read().await;
        state
            .by_user
            .get(&user_id)
            .and_then(|id| state.students.get(id))
            .cloned()
    }

    pub async fn is_number_taken(&self, number: &StudentNumber) -> bool {
        self.state.read().await.by_number.contains_key(number)
    }

    /// Students currently on probation, ordered by student number.
    pub async fn on_probation(&self) -> Vec<StudentEntry> {
        let state = self.state.read().await;
        let mut students: Vec<_> = state
            .students
            .values()
            .filter(|s| s.status == StudentStatus::Probation)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.student_number.cmp(&b.student_number));
        students
    }
}

impl Default for StudentDirectoryView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for StudentDirectoryView {
    fn name(&self) -> &'static str {
        "StudentDirectoryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != <Student as domain::Aggregate>::aggregate_type() {
            return Ok(());
        }

        let student_event: StudentEvent = serde_json::from_value(event.payload.clone())
            .map_err(|e| ProjectionError::undecodable(self.name(), event, e))?;
        let mut state = self.state.write().await;

        match student_event {
            StudentEvent::StudentCreated(data) => {
                state
                    .by_number
                    .insert(data.student_number.clone(), data.student_id);
                state.by_user.insert(data.user_id, data.student_id);
                state.students.insert(
                    data.student_id,
                    StudentEntry {
                        student_id: data.student_id,
                        student_number: data.student_number,
                        user_id: data.user_id,
                        department_id: data.department_id,
                        program: data.program,
                        status: StudentStatus::Active,
                        current_cgpa: Cgpa::ZERO,
                    },
                );
            }
            StudentEvent::CgpaUpdated(data) => {
                if let Some(student) = state.students.get_mut(&data.student_id) {
                    student.current_cgpa = data.new_cgpa;
                }
            }
            StudentEvent::StatusChanged(data) => {
                if let Some(student) = state.students.get_mut(&data.student_id) {
                    student.status = data.new_status;
                }
            }
            StudentEvent::GradeSubmitted(_) => {}
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.students.clear();
        state.by_number.clear();
        state.by_user.clear();
        Ok(())
    }
}

impl ReadModel for StudentDirectoryView {
    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.students.len())
            .unwrap_or(0)
    }
}

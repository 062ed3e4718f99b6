//! Department service. Deactivating a department cascades to its courses.

use common::{AggregateId, DepartmentId};
use event_store::EventStore;
use futures_util::TryStreamExt;

use crate::aggregate::Aggregate;
use crate::command::{Command, CommandHandler, CommandResult};
use crate::course::{Course, CourseEvent, CourseService};
use crate::error::DomainError;

use super::{CreateDepartment, DeactivateDepartment, Department, UpdateDepartmentDetails};

/// Outcome of [`DepartmentService::deactivate_department`].
#[derive(Debug)]
pub struct DepartmentDeactivation {
    pub department: CommandResult<Department>,
    /// Courses this call deactivated, in catalog order.
    pub deactivated_courses: Vec<AggregateId>,
}

/// Service for managing departments.
///
/// Departments live in the course catalog's store, next to their courses.
pub struct DepartmentService<S: EventStore> {
    handler: CommandHandler<S, Department>,
    courses: CourseService<S>,
}

impl<S: EventStore + Clone> DepartmentService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            courses: CourseService::new(store),
        }
    }

    /// Sets how many times a command is retried after a concurrent write.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self.courses = self.courses.with_max_attempts(max_attempts);
        self
    }

    /// Creates a department. A second department with the same code is
    /// rejected.
    #[tracing::instrument(skip(self), fields(code = %cmd.code))]
    pub async fn create_department(
        &self,
        cmd: CreateDepartment,
    ) -> Result<CommandResult<Department>, DomainError> {
        let code = Department::normalize_code(&cmd.code)?;
        let department_id = AggregateId::from_uuid(Department::id_for_code(&code).as_uuid());

        self.handler
            .execute(department_id, |department| {
                department.create(&code, &cmd.name, &cmd.description, cmd.head_of_department_id)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_details(
        &self,
        cmd: UpdateDepartmentDetails,
    ) -> Result<CommandResult<Department>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |department| {
                department.update_details(&cmd.name, &cmd.description, cmd.head_of_department_id)
            })
            .await
    }

    /// Deactivates the department, then every active course in it.
    ///
    /// Each course is deactivated by its own command. If one fails, the
    /// department stays deactivated and [`deactivate_courses_in`] finishes
    /// the cascade.
    ///
    /// [`deactivate_courses_in`]: Self::deactivate_courses_in
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_department(
        &self,
        cmd: DeactivateDepartment,
    ) -> Result<DepartmentDeactivation, DomainError> {
        let department = self
            .handler
            .execute(cmd.aggregate_id(), |department| department.deactivate())
            .await?;
        let deactivated_courses = self.deactivate_courses_in(cmd.department_id).await?;

        tracing::info!(
            department_id = %cmd.department_id,
            courses = deactivated_courses.len(),
            "Department deactivated"
        );
        Ok(DepartmentDeactivation {
            department,
            deactivated_courses,
        })
    }

    /// Deactivates the department's courses that are still active and
    /// returns their ids. Courses already inactive are left alone.
    pub async fn deactivate_courses_in(
        &self,
        department_id: DepartmentId,
    ) -> Result<Vec<AggregateId>, DomainError> {
        let mut deactivated = Vec::new();
        for course_id in self.courses_in(department_id).await? {
            let result = self
                .courses
                .handler()
                .execute(course_id, |course| {
                    if !course.is_active() {
                        return Ok(());
                    }
                    course.deactivate()
                })
                .await?;
            if !result.events.is_empty() {
                deactivated.push(course_id);
            }
        }
        Ok(deactivated)
    }

    /// Ids of every course created in the department, active or not.
    pub async fn courses_in(
        &self,
        department_id: DepartmentId,
    ) -> Result<Vec<AggregateId>, DomainError> {
        let mut stream = self.handler.store().stream_all_events().await?;
        let mut course_ids = Vec::new();
        while let Some(envelope) = stream.try_next().await? {
            if envelope.aggregate_type != Course::aggregate_type()
                || envelope.event_type != "CourseCreated"
            {
                continue;
            }
            let event: CourseEvent = serde_json::from_value(envelope.payload)?;
            if let CourseEvent::CourseCreated(data) = event {
                if data.department_id == department_id {
                    course_ids.push(data.course_id);
                }
            }
        }
        Ok(course_ids)
    }

    /// Loads a department, or `None` if it doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_department(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<Department>, DomainError> {
        self.handler
            .load_existing(AggregateId::from_uuid(department_id.as_uuid()))
            .await
    }
}

//! Course service: the course catalog's command API.

use common::{AggregateId, UserId};
use event_store::EventStore;
use uuid::Uuid;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    ChangePrerequisite, Course, CreateCourse, DeactivateCourse, DropStudent, EnrollStudent,
    ReassignCoordinator, UpdateCapacity, UpdateCourseDetails,
};

/// Service for managing courses.
pub struct CourseService<S: EventStore> {
    handler: CommandHandler<S, Course>,
}

impl<S: EventStore> CourseService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Sets how many times a command is retried after a concurrent write.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, Course> {
        &self.handler
    }

    /// Creates a course. A second course with the same code is rejected.
    #[tracing::instrument(skip(self), fields(course_code = %cmd.course_code))]
    pub async fn create_course(
        &self,
        cmd: CreateCourse,
    ) -> Result<CommandResult<Course>, DomainError> {
        let definition = cmd.definition()?;
        let course_id = Course::id_for_code(&definition.code);

        self.handler
            .execute(course_id, |course| course.create(definition.clone()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_details(
        &self,
        cmd: UpdateCourseDetails,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| {
                course.update_details(&cmd.title, &cmd.description, cmd.credits)
            })
            .await
    }

    /// Takes one seat. Never exceeds capacity, even under concurrent calls.
    #[tracing::instrument(skip(self))]
    pub async fn enroll_student(
        &self,
        cmd: EnrollStudent,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| course.enroll_student())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn drop_student(
        &self,
        cmd: DropStudent,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| course.drop_student())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_capacity(
        &self,
        cmd: UpdateCapacity,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| course.update_capacity(cmd.max_capacity))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_course(
        &self,
        cmd: DeactivateCourse,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| course.deactivate())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reassign_coordinator(
        &self,
        cmd: ReassignCoordinator,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| {
                course.reassign_coordinator(cmd.new_coordinator_id)
            })
            .await
    }

    /// Moves an active course from `current` to `new`.
    ///
    /// The course is re-read under the version check: if it was deactivated
    /// or already handed to someone else, nothing is written and the
    /// returned result has no events.
    #[tracing::instrument(skip(self))]
    pub async fn reassign_coordinator_from(
        &self,
        course_id: AggregateId,
        current: UserId,
        new: UserId,
        causation_id: Option<Uuid>,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute_caused_by(course_id, causation_id, |course| {
                if !course.is_active() || course.coordinator_id() != Some(current) {
                    return Ok(());
                }
                course.reassign_coordinator(new)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_prerequisite(
        &self,
        cmd: ChangePrerequisite,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| {
                course.add_prerequisite(cmd.prerequisite_id)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_prerequisite(
        &self,
        cmd: ChangePrerequisite,
    ) -> Result<CommandResult<Course>, DomainError> {
        self.handler
            .execute(cmd.course_id, |course| {
                course.remove_prerequisite(cmd.prerequisite_id)
            })
            .await
    }

    /// Loads a course by ID.
    ///
    /// Returns None if the course doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_course(&self, course_id: AggregateId) -> Result<Option<Course>, DomainError> {
        self.handler.load_existing(course_id).await
    }
}

//! Registration service.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    ApproveRegistration, CancelRegistration, CompleteRegistration, CourseRegistration,
    RegisterForCourse, RejectRegistration,
};

/// Service for managing course registrations.
pub struct RegistrationService<S: EventStore> {
    handler: CommandHandler<S, CourseRegistration>,
}

impl<S: EventStore> RegistrationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, CourseRegistration> {
        &self.handler
    }

    /// Opens a registration. A second registration for the same student,
    /// course and semester is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn register(
        &self,
        cmd: RegisterForCourse,
    ) -> Result<CommandResult<CourseRegistration>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |registration| {
                registration.create(
                    cmd.student_id,
                    cmd.course_id,
                    &cmd.semester_id,
                    cmd.academic_year,
                    cmd.registration_type,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn approve(
        &self,
        cmd: ApproveRegistration,
    ) -> Result<CommandResult<CourseRegistration>, DomainError> {
        self.handler
            .execute(cmd.registration_id, |registration| {
                registration.approve(cmd.approved_by)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject(
        &self,
        cmd: RejectRegistration,
    ) -> Result<CommandResult<CourseRegistration>, DomainError> {
        self.handler
            .execute(cmd.registration_id, |registration| {
                registration.reject(&cmd.reason)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        cmd: CancelRegistration,
    ) -> Result<CommandResult<CourseRegistration>, DomainError> {
        self.handler
            .execute(cmd.registration_id, |registration| registration.cancel())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        cmd: CompleteRegistration,
    ) -> Result<CommandResult<CourseRegistration>, DomainError> {
        self.handler
            .execute(cmd.registration_id, |registration| registration.complete())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_registration(
        &self,
        registration_id: AggregateId,
    ) -> Result<Option<CourseRegistration>, DomainError> {
        self.handler.load_existing(registration_id).await
    }

    /// True if the student already holds a registration for the course in
    /// the semester.
    pub async fn exists(
        &self,
        student_id: AggregateId,
        course_id: AggregateId,
        semester_id: &str,
    ) -> Result<bool, DomainError> {
        let id = CourseRegistration::id_for(student_id, course_id, semester_id);
        Ok(self.handler.load_existing(id).await?.is_some())
    }
}

//! Student service: the student-academic command API.

use common::{AggregateId, UserId};
use event_store::EventStore;
use uuid::Uuid;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{ChangeStudentStatus, CreateStudent, Student, SubmitGrade};

/// Service for managing student records.
pub struct StudentService<S: EventStore> {
    handler: CommandHandler<S, Student>,
}

impl<S: EventStore> StudentService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, Student> {
        &self.handler
    }

    /// Opens the student record for a user. At most one per user.
    ///
    /// `causation_id` links the new events to the message that caused them.
    #[tracing::instrument(skip(self), fields(user_id = %cmd.user_id))]
    pub async fn create_student(
        &self,
        cmd: CreateStudent,
        causation_id: Option<Uuid>,
    ) -> Result<CommandResult<Student>, DomainError> {
        self.handler
            .execute_caused_by(cmd.aggregate_id(), causation_id, |student| {
                student.create(
                    cmd.user_id,
                    cmd.student_number.clone(),
                    cmd.department_id,
                    &cmd.program,
                    cmd.enrollment_date,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_grade(
        &self,
        cmd: SubmitGrade,
    ) -> Result<CommandResult<Student>, DomainError> {
        self.handler
            .execute(cmd.student_id, |student| {
                student.add_grade(
                    cmd.course_id,
                    cmd.credits,
                    cmd.grade,
                    &cmd.semester,
                    cmd.academic_year,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        cmd: ChangeStudentStatus,
    ) -> Result<CommandResult<Student>, DomainError> {
        self.handler
            .execute(cmd.student_id, |student| {
                student.update_status(cmd.new_status, &cmd.reason)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_student(
        &self,
        student_id: AggregateId,
    ) -> Result<Option<Student>, DomainError> {
        self.handler.load_existing(student_id).await
    }

    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Student>, DomainError> {
        self.handler
            .load_existing(Student::id_for_user(user_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::student::{Grade, StudentError, StudentNumber, StudentStatus};
    use chrono::NaiveDate;
    use common::DepartmentId;
    use event_store::InMemoryEventStore;

    fn create_cmd(user_id: UserId) -> CreateStudent {
        CreateStudent::new(
            user_id,
            StudentNumber::parse("250901-1234").unwrap(),
            DepartmentId::new(),
            "Computer Science",
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn create_records_causation() {
        let store = InMemoryEventStore::new();
        let service = StudentService::new(store.clone());
        let user_id = UserId::new();
        let causation = Uuid::new_v4();

        let result = service
            .create_student(create_cmd(user_id), Some(causation))
            .await
            .unwrap();
        let student_id = result.aggregate.id().unwrap();

        let events = store.get_events_for_aggregate(student_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].causation_id(), Some(causation));

        let loaded = service.get_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(loaded.id(), Some(student_id));
    }

    #[tokio::test]
    async fn second_record_for_user_is_rejected() {
        let service = StudentService::new(InMemoryEventStore::new());
        let user_id = UserId::new();
        service.create_student(create_cmd(user_id), None).await.unwrap();

        let err = service
            .create_student(create_cmd(user_id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Student(StudentError::AlreadyExists)));
        assert_eq!(err.to_string(), "User already has a student record");
    }

    #[tokio::test]
    async fn grades_survive_reload() {
        let service = StudentService::new(InMemoryEventStore::new());
        let student_id = service
            .create_student(create_cmd(UserId::new()), None)
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap();

        service
            .add_grade(SubmitGrade::new(student_id, AggregateId::new(), 3, Grade::A, "Fall", 2025))
            .await
            .unwrap();
        service
            .add_grade(SubmitGrade::new(student_id, AggregateId::new(), 3, Grade::C, "Fall", 2025))
            .await
            .unwrap();

        let student = service.get_student(student_id).await.unwrap().unwrap();
        assert_eq!(student.current_cgpa().to_string(), "3.00");
        assert_eq!(student.grades().len(), 2);
        assert_eq!(student.calculate_cgpa(), student.current_cgpa());
    }

    #[tokio::test]
    async fn status_change_blocks_grades() {
        let service = StudentService::new(InMemoryEventStore::new());
        let student_id = service
            .create_student(create_cmd(UserId::new()), None)
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap();

        service
            .update_status(ChangeStudentStatus::new(
                student_id,
                StudentStatus::LeaveOfAbsence,
                "Medical leave",
            ))
            .await
            .unwrap();

        let err = service
            .add_grade(SubmitGrade::new(student_id, AggregateId::new(), 3, Grade::A, "Fall", 2025))
            .await
            .unwrap_err();
        assert!(err.is_rejection());
    }
}

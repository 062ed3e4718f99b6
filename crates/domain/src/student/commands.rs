//! Student commands.

use chrono::NaiveDate;
use common::{AggregateId, DepartmentId, UserId};

use crate::command::Command;

use super::{Grade, Student, StudentNumber, StudentStatus};

/// Command to open a student record for a user.
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub user_id: UserId,
    pub student_number: StudentNumber,
    pub department_id: DepartmentId,
    pub program: String,
    pub enrollment_date: NaiveDate,
}

impl CreateStudent {
    pub fn new(
        user_id: UserId,
        student_number: StudentNumber,
        department_id: DepartmentId,
        program: impl Into<String>,
        enrollment_date: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            student_number,
            department_id,
            program: program.into(),
            enrollment_date,
        }
    }
}

impl Command for CreateStudent {
    type Aggregate = Student;

    fn aggregate_id(&self) -> AggregateId {
        Student::id_for_user(self.user_id)
    }
}

/// Command to record a course grade.
#[derive(Debug, Clone)]
pub struct SubmitGrade {
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub credits: u32,
    pub grade: Grade,
    pub semester: String,
    pub academic_year: i32,
}

impl SubmitGrade {
    pub fn new(
        student_id: AggregateId,
        course_id: AggregateId,
        credits: u32,
        grade: Grade,
        semester: impl Into<String>,
        academic_year: i32,
    ) -> Self {
        Self {
            student_id,
            course_id,
            credits,
            grade,
            semester: semester.into(),
            academic_year,
        }
    }
}

impl Command for SubmitGrade {
    type Aggregate = Student;

    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }
}

/// Command to change a student's status.
#[derive(Debug, Clone)]
pub struct ChangeStudentStatus {
    pub student_id: AggregateId,
    pub new_status: StudentStatus,
    pub reason: String,
}

impl ChangeStudentStatus {
    pub fn new(student_id: AggregateId, new_status: StudentStatus, reason: impl Into<String>) -> Self {
        Self {
            student_id,
            new_status,
            reason: reason.into(),
        }
    }
}

impl Command for ChangeStudentStatus {
    type Aggregate = Student;

    fn aggregate_id(&self) -> AggregateId {
        self.student_id
    }
}

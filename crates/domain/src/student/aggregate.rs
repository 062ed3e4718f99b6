//! Student aggregate implementation.

use chrono::{Months, NaiveDate, Utc};
use common::{AggregateId, DepartmentId, UserId};
use event_store::Version;
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventBuffer};

use super::{
    Cgpa, CourseGrade, Grade, StudentError, StudentEvent, StudentNumber, StudentStatus,
    events::{CgpaUpdatedData, GradeSubmittedData, StatusChangedData, StudentCreatedData},
};

/// Namespace for student ids derived from user ids.
const STUDENT_NAMESPACE: Uuid = Uuid::from_u128(0x51d0_7e3a_c2b9_4f16_8d4e_0b7a_96c3_12f5);

/// Months from enrollment to expected graduation.
const PROGRAM_LENGTH_MONTHS: u32 = 48;

/// Student aggregate root.
///
/// Owns the transcript. CGPA and credit totals are always derived from the
/// recorded grades.
#[derive(Debug, Clone, Default)]
pub struct Student {
    id: Option<AggregateId>,
    version: Version,
    student_number: Option<StudentNumber>,
    user_id: Option<UserId>,
    department_id: Option<DepartmentId>,
    program: String,
    enrollment_date: Option<NaiveDate>,
    expected_graduation_date: Option<NaiveDate>,
    status: StudentStatus,
    current_cgpa: Cgpa,
    cumulative_credits: u32,
    completed_credits: u32,
    grades: Vec<CourseGrade>,
    pending: EventBuffer<StudentEvent>,
}

impl Aggregate for Student {
    type Event = StudentEvent;
    type Error = StudentError;

    fn aggregate_type() -> &'static str {
        "Student"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            StudentEvent::StudentCreated(data) => {
                self.id = Some(data.student_id);
                self.student_number = Some(data.student_number);
                self.user_id = Some(data.user_id);
                self.department_id = Some(data.department_id);
                self.program = data.program;
                self.enrollment_date = Some(data.enrollment_date);
                self.expected_graduation_date = Some(data.expected_graduation_date);
                self.status = StudentStatus::Active;
            }
            StudentEvent::GradeSubmitted(data) => {
                if data.grade.counts_toward_completed() {
                    self.completed_credits += data.credits;
                }
                self.cumulative_credits += data.credits;
                self.grades.push(CourseGrade {
                    course_id: data.course_id,
                    credits: data.credits,
                    grade: data.grade,
                    semester: data.semester,
                    academic_year: data.academic_year,
                    is_final: true,
                    recorded_at: data.recorded_at,
                });
            }
            StudentEvent::CgpaUpdated(data) => {
                self.current_cgpa = data.new_cgpa;
            }
            StudentEvent::StatusChanged(data) => {
                self.status = data.new_status;
            }
        }
    }

    fn pending_events(&self) -> &EventBuffer<StudentEvent> {
        &self.pending
    }

    fn pending_events_mut(&mut self) -> &mut EventBuffer<StudentEvent> {
        &mut self.pending
    }
}

// Query methods
impl Student {
    /// Id of the student record belonging to `user_id`.
    pub fn id_for_user(user_id: UserId) -> AggregateId {
        AggregateId::derived(&STUDENT_NAMESPACE, &user_id.to_string())
    }

    pub fn student_number(&self) -> Option<&StudentNumber> {
        self.student_number.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.department_id
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn enrollment_date(&self) -> Option<NaiveDate> {
        self.enrollment_date
    }

    pub fn expected_graduation_date(&self) -> Option<NaiveDate> {
        self.expected_graduation_date
    }

    pub fn status(&self) -> StudentStatus {
        self.status
    }

    pub fn current_cgpa(&self) -> Cgpa {
        self.current_cgpa
    }

    pub fn cumulative_credits(&self) -> u32 {
        self.cumulative_credits
    }

    pub fn completed_credits(&self) -> u32 {
        self.completed_credits
    }

    pub fn grades(&self) -> &[CourseGrade] {
        &self.grades
    }

    pub fn grades_for_term<'a>(
        &'a self,
        semester: &'a str,
        academic_year: i32,
    ) -> impl Iterator<Item = &'a CourseGrade> + 'a {
        self.grades
            .iter()
            .filter(move |g| g.in_term(semester, academic_year))
    }

    pub fn calculate_cgpa(&self) -> Cgpa {
        Cgpa::from_grades(&self.grades)
    }

    pub fn semester_gpa(&self, semester: &str, academic_year: i32) -> Cgpa {
        Cgpa::from_grades(self.grades_for_term(semester, academic_year))
    }

    /// True if any recorded grade for the course is worth 2.0 points or more.
    pub fn has_passed(&self, course_id: AggregateId) -> bool {
        self.grades.iter().any(|g| {
            g.course_id == course_id && g.grade.points_tenths().is_some_and(|p| p >= 20)
        })
    }

    pub fn can_receive_grades(&self) -> bool {
        self.id.is_some() && self.status.can_receive_grades()
    }
}

// Command methods
impl Student {
    /// Opens a student record for a user. The student starts `Active`.
    pub fn create(
        &mut self,
        user_id: UserId,
        student_number: StudentNumber,
        department_id: DepartmentId,
        program: &str,
        enrollment_date: NaiveDate,
    ) -> Result<(), StudentError> {
        if self.id.is_some() {
            return Err(StudentError::AlreadyExists);
        }
        let program = program.trim();
        if program.is_empty() {
            return Err(StudentError::ProgramRequired);
        }
        let expected_graduation_date = enrollment_date
            .checked_add_months(Months::new(PROGRAM_LENGTH_MONTHS))
            .ok_or(StudentError::EnrollmentDateOutOfRange(enrollment_date))?;

        self.raise(StudentEvent::StudentCreated(StudentCreatedData {
            student_id: Self::id_for_user(user_id),
            student_number,
            user_id,
            department_id,
            program: program.to_string(),
            enrollment_date,
            expected_graduation_date,
            created_at: Utc::now(),
        }));
        Ok(())
    }

    /// Records a grade, then recomputes CGPA and academic standing.
    pub fn add_grade(
        &mut self,
        course_id: AggregateId,
        credits: u32,
        grade: Grade,
        semester: &str,
        academic_year: i32,
    ) -> Result<(), StudentError> {
        let student_id = self.identity()?;
        if !self.status.can_receive_grades() {
            return Err(StudentError::NotActiveOrProbation);
        }
        if credits == 0 {
            return Err(StudentError::InvalidCredits);
        }
        let semester = semester.trim();
        if semester.is_empty() {
            return Err(StudentError::SemesterRequired);
        }
        if self
            .grades
            .iter()
            .any(|g| g.is_for(course_id, semester, academic_year))
        {
            return Err(StudentError::DuplicateGrade);
        }

        let old_cgpa = self.current_cgpa;
        self.raise(StudentEvent::GradeSubmitted(GradeSubmittedData {
            student_id,
            course_id,
            credits,
            grade,
            semester: semester.to_string(),
            academic_year,
            recorded_at: Utc::now(),
        }));

        let new_cgpa = self.calculate_cgpa();
        if new_cgpa != old_cgpa {
            self.raise(StudentEvent::CgpaUpdated(CgpaUpdatedData {
                student_id,
                old_cgpa,
                new_cgpa,
            }));
        }

        self.apply_standing_rule()?;
        Ok(())
    }

    /// Moves the student to `new_status`. No event if already there.
    pub fn update_status(
        &mut self,
        new_status: StudentStatus,
        reason: &str,
    ) -> Result<(), StudentError> {
        let student_id = self.identity()?;
        if self.status == new_status {
            return Ok(());
        }

        self.raise(StudentEvent::StatusChanged(StatusChangedData {
            student_id,
            old_status: self.status,
            new_status,
            reason: reason.to_string(),
        }));
        Ok(())
    }

    // Below 1.00 puts an active student on probation; 2.00 lifts it.
    fn apply_standing_rule(&mut self) -> Result<(), StudentError> {
        match self.status {
            StudentStatus::Active if self.current_cgpa.is_dismissal() => {
                self.update_status(StudentStatus::Probation, "CGPA below 1.0")
            }
            StudentStatus::Probation if self.current_cgpa.is_good_standing() => {
                self.update_status(StudentStatus::Active, "CGPA improved to 2.0 or above")
            }
            _ => Ok(()),
        }
    }

    fn identity(&self) -> Result<AggregateId, StudentError> {
        self.id.ok_or(StudentError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrolled() -> Student {
        let mut student = Student::default();
        student
            .create(
                UserId::new(),
                StudentNumber::parse("250901-1234").unwrap(),
                DepartmentId::new(),
                "Computer Science",
                NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            )
            .unwrap();
        student.take_pending_events();
        student
    }

    fn event_types(student: &mut Student) -> Vec<&'static str> {
        use crate::aggregate::DomainEvent;
        student
            .take_pending_events()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }

    mod create {
        use super::*;

        #[test]
        fn starts_active_with_zero_cgpa() {
            let student = enrolled();
            assert_eq!(student.status(), StudentStatus::Active);
            assert_eq!(student.current_cgpa(), Cgpa::ZERO);
            assert_eq!(student.cumulative_credits(), 0);
            assert!(student.can_receive_grades());
        }

        #[test]
        fn graduation_is_four_years_after_enrollment() {
            let student = enrolled();
            assert_eq!(
                student.expected_graduation_date(),
                NaiveDate::from_ymd_opt(2029, 9, 1)
            );
        }

        #[test]
        fn id_is_derived_from_user() {
            let user_id = UserId::new();
            let mut student = Student::default();
            student
                .create(
                    user_id,
                    StudentNumber::parse("250901-1234").unwrap(),
                    DepartmentId::new(),
                    "Physics",
                    NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                )
                .unwrap();
            assert_eq!(student.id(), Some(Student::id_for_user(user_id)));
        }

        #[test]
        fn second_create_is_rejected() {
            let mut student = enrolled();
            let result = student.create(
                UserId::new(),
                StudentNumber::parse("250901-4321").unwrap(),
                DepartmentId::new(),
                "Physics",
                NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            );
            assert!(matches!(result, Err(StudentError::AlreadyExists)));
        }

        #[test]
        fn program_is_required() {
            let mut student = Student::default();
            let result = student.create(
                UserId::new(),
                StudentNumber::parse("250901-1234").unwrap(),
                DepartmentId::new(),
                "  ",
                NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            );
            assert!(matches!(result, Err(StudentError::ProgramRequired)));
        }
    }

    mod grades {
        use super::*;

        #[test]
        fn grade_updates_cgpa_and_credits() {
            let mut student = enrolled();
            student
                .add_grade(AggregateId::new(), 3, Grade::A, "Fall", 2025)
                .unwrap();
            student
                .add_grade(AggregateId::new(), 4, Grade::F, "Fall", 2025)
                .unwrap();

            // 12 / 7 = 1.714
            assert_eq!(student.current_cgpa().hundredths(), 171);
            assert_eq!(student.cumulative_credits(), 7);
            assert_eq!(student.completed_credits(), 3);
        }

        #[test]
        fn unchanged_cgpa_raises_no_cgpa_event() {
            let mut student = enrolled();
            student
                .add_grade(AggregateId::new(), 3, Grade::B, "Fall", 2025)
                .unwrap();
            assert_eq!(event_types(&mut student), vec!["GradeSubmitted", "CgpaUpdated"]);

            student
                .add_grade(AggregateId::new(), 3, Grade::B, "Spring", 2026)
                .unwrap();
            assert_eq!(event_types(&mut student), vec!["GradeSubmitted"]);
        }

        #[test]
        fn duplicate_grade_in_same_term_is_rejected() {
            let mut student = enrolled();
            let course = AggregateId::new();
            student.add_grade(course, 3, Grade::C, "Fall", 2025).unwrap();

            let result = student.add_grade(course, 3, Grade::B, "Fall", 2025);
            assert!(matches!(result, Err(StudentError::DuplicateGrade)));

            student.add_grade(course, 3, Grade::B, "Fall", 2026).unwrap();
        }

        #[test]
        fn zero_credits_rejected() {
            let mut student = enrolled();
            let result = student.add_grade(AggregateId::new(), 0, Grade::A, "Fall", 2025);
            assert!(matches!(result, Err(StudentError::InvalidCredits)));
        }

        #[test]
        fn suspended_student_cannot_receive_grades() {
            let mut student = enrolled();
            student
                .update_status(StudentStatus::Suspended, "Conduct")
                .unwrap();
            let result = student.add_grade(AggregateId::new(), 3, Grade::A, "Fall", 2025);
            assert!(matches!(result, Err(StudentError::NotActiveOrProbation)));
        }

        #[test]
        fn semester_gpa_and_passed_courses() {
            let mut student = enrolled();
            let passed = AggregateId::new();
            let barely = AggregateId::new();
            student.add_grade(passed, 3, Grade::C, "Fall", 2025).unwrap();
            student.add_grade(barely, 3, Grade::D, "Fall", 2025).unwrap();
            student
                .add_grade(AggregateId::new(), 3, Grade::A, "Spring", 2026)
                .unwrap();

            assert_eq!(student.semester_gpa("Fall", 2025).hundredths(), 150);
            assert_eq!(student.semester_gpa("Summer", 2025), Cgpa::ZERO);
            assert!(student.has_passed(passed));
            assert!(!student.has_passed(barely));
        }
    }

    mod standing {
        use super::*;

        #[test]
        fn failing_grades_put_student_on_probation() {
            let mut student = enrolled();
            student
                .add_grade(AggregateId::new(), 3, Grade::F, "Fall", 2025)
                .unwrap();

            assert_eq!(student.status(), StudentStatus::Probation);
            assert_eq!(
                event_types(&mut student),
                vec!["GradeSubmitted", "StatusChanged"]
            );
        }

        #[test]
        fn probation_lifts_at_two_point_zero() {
            let mut student = enrolled();
            student
                .add_grade(AggregateId::new(), 3, Grade::F, "Fall", 2025)
                .unwrap();
            student
                .add_grade(AggregateId::new(), 3, Grade::A, "Fall", 2025)
                .unwrap();

            assert_eq!(student.current_cgpa().hundredths(), 200);
            assert_eq!(student.status(), StudentStatus::Active);
        }

        #[test]
        fn between_thresholds_status_is_kept() {
            let mut student = enrolled();
            student
                .add_grade(AggregateId::new(), 3, Grade::F, "Fall", 2025)
                .unwrap();
            // (0 + 3.0 * 1) / 4 = 0.75, then (0 + 3 + 3) / 5 = 1.2
            student
                .add_grade(AggregateId::new(), 1, Grade::B, "Fall", 2025)
                .unwrap();
            student
                .add_grade(AggregateId::new(), 1, Grade::B, "Spring", 2026)
                .unwrap();
            assert_eq!(student.current_cgpa().hundredths(), 120);
            assert_eq!(student.status(), StudentStatus::Probation);

            let mut active = enrolled();
            active
                .add_grade(AggregateId::new(), 3, Grade::D, "Fall", 2025)
                .unwrap();
            assert_eq!(active.status(), StudentStatus::Active);
        }

        #[test]
        fn single_withdrawal_puts_student_on_probation() {
            let mut student = enrolled();
            student
                .add_grade(AggregateId::new(), 3, Grade::W, "Fall", 2025)
                .unwrap();

            assert_eq!(student.current_cgpa(), Cgpa::ZERO);
            assert_eq!(student.status(), StudentStatus::Probation);
            assert_eq!(
                event_types(&mut student),
                vec!["GradeSubmitted", "StatusChanged"]
            );
        }

        #[test]
        fn update_status_to_same_is_noop() {
            let mut student = enrolled();
            student.update_status(StudentStatus::Active, "noop").unwrap();
            assert!(student.pending_events().is_empty());
        }
    }
}

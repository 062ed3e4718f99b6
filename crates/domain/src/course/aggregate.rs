//! Course aggregate implementation.

use std::collections::BTreeSet;

use chrono::Utc;
use common::{AggregateId, DepartmentId, UserId};
use event_store::Version;
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventBuffer};

use super::{
    CourseCode, CourseError, CourseEvent, Semester,
    events::{
        CapacityUpdatedData, CoordinatorReassignedData, CourseCreatedData, CourseDeactivatedData,
        CourseFullData, CourseUpdatedData, EnrollmentChangedData, PrerequisiteChangedData,
    },
};

/// Namespace for course ids derived from course codes.
const COURSE_NAMESPACE: Uuid = Uuid::from_u128(0x3f6c_2a1e_8b4d_5c7f_9e10_a2b3_c4d5_e6f7);

/// Course aggregate root.
///
/// Enrollment never exceeds capacity and only changes while the course is
/// active. Courses are never removed, only deactivated.
#[derive(Debug, Clone, Default)]
pub struct Course {
    id: Option<AggregateId>,
    version: Version,
    code: Option<CourseCode>,
    title: String,
    description: String,
    credits: u32,
    department_id: Option<DepartmentId>,
    coordinator_id: Option<UserId>,
    max_capacity: u32,
    current_enrollment: u32,
    is_active: bool,
    is_borrowable: bool,
    offering_semester: Semester,
    academic_year: i32,
    prerequisites: BTreeSet<AggregateId>,
    pending: EventBuffer<CourseEvent>,
}

impl Aggregate for Course {
    type Event = CourseEvent;
    type Error = CourseError;

    fn aggregate_type() -> &'static str {
        "Course"
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
            CourseEvent::CourseCreated(data) => self.apply_created(data),
            CourseEvent::CourseUpdated(data) => {
                self.title = data.title;
                self.description = data.description;
                self.credits = data.credits;
            }
            CourseEvent::StudentEnrolled(data) | CourseEvent::StudentDropped(data) => {
                self.current_enrollment = data.current_enrollment;
            }
            CourseEvent::CourseFull(_) => {}
            CourseEvent::CapacityUpdated(data) => {
                self.max_capacity = data.max_capacity;
            }
            CourseEvent::CoordinatorReassigned(data) => {
                self.coordinator_id = Some(data.new_coordinator_id);
            }
            CourseEvent::PrerequisiteAdded(data) => {
                self.prerequisites.insert(data.prerequisite_id);
            }
            CourseEvent::PrerequisiteRemoved(data) => {
                self.prerequisites.remove(&data.prerequisite_id);
            }
            CourseEvent::CourseDeactivated(_) => {
                self.is_active = false;
            }
        }
    }

    fn pending_events(&self) -> &EventBuffer<CourseEvent> {
        &self.pending
    }

    fn pending_events_mut(&mut self) -> &mut EventBuffer<CourseEvent> {
        &mut self.pending
    }
}

// Query methods
impl Course {
    /// Id a course with this code has, whether or not it exists yet.
    pub fn id_for_code(code: &CourseCode) -> AggregateId {
        AggregateId::derived(&COURSE_NAMESPACE, code.as_str())
    }

    pub fn code(&self) -> Option<&CourseCode> {
        self.code.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn credits(&self) -> u32 {
        self.credits
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.department_id
    }

    pub fn coordinator_id(&self) -> Option<UserId> {
        self.coordinator_id
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    pub fn current_enrollment(&self) -> u32 {
        self.current_enrollment
    }

    pub fn available_slots(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_enrollment)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_full(&self) -> bool {
        self.current_enrollment >= self.max_capacity
    }

    pub fn is_borrowable(&self) -> bool {
        self.is_borrowable
    }

    pub fn offering_semester(&self) -> Semester {
        self.offering_semester
    }

    pub fn academic_year(&self) -> i32 {
        self.academic_year
    }

    pub fn prerequisites(&self) -> impl Iterator<Item = &AggregateId> {
        self.prerequisites.iter()
    }

    pub fn has_prerequisite(&self, course_id: AggregateId) -> bool {
        self.prerequisites.contains(&course_id)
    }
}

/// Full definition of a new course.
#[derive(Debug, Clone)]
pub struct CourseDefinition {
    pub code: CourseCode,
    pub title: String,
    pub description: String,
    pub credits: u32,
    pub department_id: DepartmentId,
    pub coordinator_id: UserId,
    pub max_capacity: u32,
    pub is_borrowable: bool,
    pub offering_semester: Semester,
    pub academic_year: i32,
    pub prerequisites: Vec<AggregateId>,
}

// Command methods
impl Course {
    /// Creates the course. The aggregate id is derived from the code.
    pub fn create(&mut self, definition: CourseDefinition) -> Result<(), CourseError> {
        if self.id.is_some() {
            return Err(CourseError::DuplicateCourseCode {
                code: definition.code.to_string(),
            });
        }
        if definition.title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        if definition.credits == 0 {
            return Err(CourseError::InvalidCredits);
        }
        if definition.max_capacity == 0 {
            return Err(CourseError::InvalidCapacity);
        }

        let course_id = Self::id_for_code(&definition.code);
        if definition.prerequisites.contains(&course_id) {
            return Err(CourseError::PrerequisiteSelfReference);
        }

        let mut prerequisites = definition.prerequisites;
        prerequisites.sort();
        prerequisites.dedup();

        self.raise(CourseEvent::CourseCreated(CourseCreatedData {
            course_id,
            course_code: definition.code,
            title: definition.title.trim().to_string(),
            description: definition.description,
            credits: definition.credits,
            department_id: definition.department_id,
            coordinator_id: definition.coordinator_id,
            max_capacity: definition.max_capacity,
            is_borrowable: definition.is_borrowable,
            offering_semester: definition.offering_semester,
            academic_year: definition.academic_year,
            prerequisites,
            created_at: Utc::now(),
        }));
        Ok(())
    }

    /// Updates title, description and credits.
    pub fn update_details(
        &mut self,
        title: &str,
        description: &str,
        credits: u32,
    ) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        if credits == 0 {
            return Err(CourseError::InvalidCredits);
        }

        self.raise(CourseEvent::CourseUpdated(CourseUpdatedData {
            course_id,
            course_code,
            title: title.trim().to_string(),
            description: description.to_string(),
            credits,
        }));
        Ok(())
    }

    /// Takes one seat.
    ///
    /// Also raises `CourseFull` when this enrollment fills the last seat.
    pub fn enroll_student(&mut self) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if !self.is_active {
            return Err(CourseError::CourseInactive);
        }
        if self.is_full() {
            return Err(CourseError::CourseFull);
        }

        let current_enrollment = self.current_enrollment + 1;
        self.raise(CourseEvent::StudentEnrolled(EnrollmentChangedData {
            course_id,
            course_code: course_code.clone(),
            current_enrollment,
            max_capacity: self.max_capacity,
        }));

        if current_enrollment == self.max_capacity {
            self.raise(CourseEvent::CourseFull(CourseFullData {
                course_id,
                course_code,
                title: self.title.clone(),
                max_capacity: self.max_capacity,
            }));
        }
        Ok(())
    }

    /// Releases one seat.
    pub fn drop_student(&mut self) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if self.current_enrollment == 0 {
            return Err(CourseError::NoEnrollment);
        }

        self.raise(CourseEvent::StudentDropped(EnrollmentChangedData {
            course_id,
            course_code,
            current_enrollment: self.current_enrollment - 1,
            max_capacity: self.max_capacity,
        }));
        Ok(())
    }

    pub fn update_capacity(&mut self, max_capacity: u32) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if max_capacity == 0 {
            return Err(CourseError::InvalidCapacity);
        }
        if max_capacity < self.current_enrollment {
            return Err(CourseError::CapacityBelowEnrollment {
                requested: max_capacity,
                current_enrollment: self.current_enrollment,
            });
        }
        self.raise(CourseEvent::CapacityUpdated(CapacityUpdatedData {
            course_id,
            course_code: course_code.clone(),
            max_capacity,
            current_enrollment: self.current_enrollment,
        }));

        if max_capacity == self.current_enrollment {
            self.raise(CourseEvent::CourseFull(CourseFullData {
                course_id,
                course_code,
                title: self.title.clone(),
                max_capacity,
            }));
        }
        Ok(())
    }

    /// Hands the course to another coordinator. Reassigning to the current
    /// coordinator raises nothing.
    pub fn reassign_coordinator(&mut self, new_coordinator_id: UserId) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        let previous = self.coordinator_id.unwrap_or(new_coordinator_id);
        if previous == new_coordinator_id {
            return Ok(());
        }

        self.raise(CourseEvent::CoordinatorReassigned(CoordinatorReassignedData {
            course_id,
            course_code,
            previous_coordinator_id: previous,
            new_coordinator_id,
        }));
        Ok(())
    }

    pub fn add_prerequisite(&mut self, prerequisite_id: AggregateId) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if prerequisite_id == course_id {
            return Err(CourseError::PrerequisiteSelfReference);
        }
        if self.prerequisites.contains(&prerequisite_id) {
            return Err(CourseError::PrerequisiteAlreadyExists { prerequisite_id });
        }

        self.raise(CourseEvent::PrerequisiteAdded(PrerequisiteChangedData {
            course_id,
            course_code,
            prerequisite_id,
        }));
        Ok(())
    }

    pub fn remove_prerequisite(&mut self, prerequisite_id: AggregateId) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if !self.prerequisites.contains(&prerequisite_id) {
            return Err(CourseError::PrerequisiteNotFound { prerequisite_id });
        }

        self.raise(CourseEvent::PrerequisiteRemoved(PrerequisiteChangedData {
            course_id,
            course_code,
            prerequisite_id,
        }));
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), CourseError> {
        let (course_id, course_code) = self.identity()?;
        if !self.is_active {
            return Err(CourseError::AlreadyDeactivated);
        }

        self.raise(CourseEvent::CourseDeactivated(CourseDeactivatedData {
            course_id,
            course_code,
            title: self.title.clone(),
        }));
        Ok(())
    }

    fn identity(&self) -> Result<(AggregateId, CourseCode), CourseError> {
        match (self.id, &self.code) {
            (Some(id), Some(code)) => Ok((id, code.clone())),
            _ => Err(CourseError::NotFound),
        }
    }
}

// Apply event helpers
impl Course {
    fn apply_created(&mut self, data: CourseCreatedData) {
        self.id = Some(data.course_id);
        self.code = Some(data.course_code);
        self.title = data.title;
        self.description = data.description;
        self.credits = data.credits;
        self.department_id = Some(data.department_id);
        self.coordinator_id = Some(data.coordinator_id);
        self.max_capacity = data.max_capacity;
        self.current_enrollment = 0;
        self.is_active = true;
        self.is_borrowable = data.is_borrowable;
        self.offering_semester = data.offering_semester;
        self.academic_year = data.academic_year;
        self.prerequisites = data.prerequisites.into_iter().collect();
    }
}

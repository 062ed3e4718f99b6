//! Course commands.

use common::{AggregateId, DepartmentId, UserId};

use crate::command::Command;

use super::{Course, CourseCode, CourseDefinition, CourseError, Semester};

/// Command to create a course.
#[derive(Debug, Clone)]
pub struct CreateCourse {
    /// Raw code; normalized before use.
    pub course_code: String,
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

impl CreateCourse {
    /// Creates a command with no description or prerequisites.
    pub fn new(
        course_code: impl Into<String>,
        title: impl Into<String>,
        credits: u32,
        department_id: DepartmentId,
        coordinator_id: UserId,
        max_capacity: u32,
    ) -> Self {
        Self {
            course_code: course_code.into(),
            title: title.into(),
            description: String::new(),
            credits,
            department_id,
            coordinator_id,
            max_capacity,
            is_borrowable: false,
            offering_semester: Semester::Fall,
            academic_year: 2025,
            prerequisites: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn offered(mut self, semester: Semester, academic_year: i32) -> Self {
        self.offering_semester = semester;
        self.academic_year = academic_year;
        self
    }

    pub fn borrowable(mut self, is_borrowable: bool) -> Self {
        self.is_borrowable = is_borrowable;
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<AggregateId>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Validates the code and produces the aggregate-level definition.
    pub fn definition(&self) -> Result<CourseDefinition, CourseError> {
        Ok(CourseDefinition {
            code: CourseCode::parse(&self.course_code)?,
            title: self.title.clone(),
            description: self.description.clone(),
            credits: self.credits,
            department_id: self.department_id,
            coordinator_id: self.coordinator_id,
            max_capacity: self.max_capacity,
            is_borrowable: self.is_borrowable,
            offering_semester: self.offering_semester,
            academic_year: self.academic_year,
            prerequisites: self.prerequisites.clone(),
        })
    }
}

/// Command to update a course's descriptive fields.
#[derive(Debug, Clone)]
pub struct UpdateCourseDetails {
    pub course_id: AggregateId,
    pub title: String,
    pub description: String,
    pub credits: u32,
}

impl UpdateCourseDetails {
    pub fn new(
        course_id: AggregateId,
        title: impl Into<String>,
        description: impl Into<String>,
        credits: u32,
    ) -> Self {
        Self {
            course_id,
            title: title.into(),
            description: description.into(),
            credits,
        }
    }
}

impl Command for UpdateCourseDetails {
    type Aggregate = Course;

    fn aggregate_id(&self) -> AggregateId {
        self.course_id
    }
}

/// Generates a command struct that only targets a course.
macro_rules! course_command {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name {
            pub course_id: AggregateId,
        }

        impl $name {
            pub fn new(course_id: AggregateId) -> Self {
                Self { course_id }
            }
        }

        impl Command for $name {
            type Aggregate = Course;

            fn aggregate_id(&self) -> AggregateId {
                self.course_id
            }
        }
    };
}

course_command!(
    /// Command to take one seat in a course.
    EnrollStudent
);

course_command!(
    /// Command to release one seat in a course.
    DropStudent
);

course_command!(
    /// Command to deactivate a course.
    DeactivateCourse
);

/// Command to change a course's capacity.
#[derive(Debug, Clone, Copy)]
pub struct UpdateCapacity {
    pub course_id: AggregateId,
    pub max_capacity: u32,
}

impl UpdateCapacity {
    pub fn new(course_id: AggregateId, max_capacity: u32) -> Self {
        Self {
            course_id,
            max_capacity,
        }
    }
}

impl Command for UpdateCapacity {
    type Aggregate = Course;

    fn aggregate_id(&self) -> AggregateId {
        self.course_id
    }
}

/// Command to hand a course to another coordinator.
#[derive(Debug, Clone, Copy)]
pub struct ReassignCoordinator {
    pub course_id: AggregateId,
    pub new_coordinator_id: UserId,
}

impl ReassignCoordinator {
    pub fn new(course_id: AggregateId, new_coordinator_id: UserId) -> Self {
        Self {
            course_id,
            new_coordinator_id,
        }
    }
}

impl Command for ReassignCoordinator {
    type Aggregate = Course;

    fn aggregate_id(&self) -> AggregateId {
        self.course_id
    }
}

/// Command to add or remove a prerequisite.
#[derive(Debug, Clone, Copy)]
pub struct ChangePrerequisite {
    pub course_id: AggregateId,
    pub prerequisite_id: AggregateId,
}

impl ChangePrerequisite {
    pub fn new(course_id: AggregateId, prerequisite_id: AggregateId) -> Self {
        Self {
            course_id,
            prerequisite_id,
        }
    }
}

impl Command for ChangePrerequisite {
    type Aggregate = Course;

    fn aggregate_id(&self) -> AggregateId {
        self.course_id
    }
}

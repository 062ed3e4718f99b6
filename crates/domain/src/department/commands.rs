//! Department commands.

use common::{AggregateId, DepartmentId, UserId};

use crate::command::Command;

use super::Department;

/// Command to create a department.
#[derive(Debug, Clone)]
pub struct CreateDepartment {
    /// Raw code; normalized before use.
    pub code: String,
    pub name: String,
    pub description: String,
    pub head_of_department_id: UserId,
}

impl CreateDepartment {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        head_of_department_id: UserId,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            head_of_department_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Command to change a department's name, description and head.
#[derive(Debug, Clone)]
pub struct UpdateDepartmentDetails {
    pub department_id: DepartmentId,
    pub name: String,
    pub description: String,
    pub head_of_department_id: UserId,
}

impl UpdateDepartmentDetails {
    pub fn new(
        department_id: DepartmentId,
        name: impl Into<String>,
        description: impl Into<String>,
        head_of_department_id: UserId,
    ) -> Self {
        Self {
            department_id,
            name: name.into(),
            description: description.into(),
            head_of_department_id,
        }
    }
}

impl Command for UpdateDepartmentDetails {
    type Aggregate = Department;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.department_id.as_uuid())
    }
}

/// Command to deactivate a department and its courses.
#[derive(Debug, Clone, Copy)]
pub struct DeactivateDepartment {
    pub department_id: DepartmentId,
}

impl DeactivateDepartment {
    pub fn new(department_id: DepartmentId) -> Self {
        Self { department_id }
    }
}

impl Command for DeactivateDepartment {
    type Aggregate = Department;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.department_id.as_uuid())
    }
}

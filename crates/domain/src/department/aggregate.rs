//! Department aggregate implementation.

use chrono::Utc;
use common::{AggregateId, DepartmentId, UserId};
use event_store::Version;
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventBuffer};

use super::{
    DepartmentError, DepartmentEvent,
    events::{DepartmentCreatedData, DepartmentDeactivatedData, DepartmentUpdatedData},
};

/// Namespace for department ids derived from department codes.
const DEPARTMENT_NAMESPACE: Uuid = Uuid::from_u128(0x7d2e_41b9_0c6a_4f38_a5e1_93b7_2c4d_8f06);

const MAX_CODE_LEN: usize = 10;

/// Department aggregate root.
///
/// The aggregate id and the [`DepartmentId`] courses refer to share one
/// UUID, derived from the upper-cased code.
#[derive(Debug, Clone, Default)]
pub struct Department {
    id: Option<AggregateId>,
    version: Version,
    code: String,
    name: String,
    description: String,
    head_of_department_id: Option<UserId>,
    is_active: bool,
    pending: EventBuffer<DepartmentEvent>,
}

impl Aggregate for Department {
    type Event = DepartmentEvent;
    type Error = DepartmentError;

    fn aggregate_type() -> &'static str {
        "Department"
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
            DepartmentEvent::DepartmentCreated(data) => {
                self.id = Some(AggregateId::from_uuid(data.department_id.as_uuid()));
                self.code = data.code;
                self.name = data.name;
                self.description = data.description;
                self.head_of_department_id = Some(data.head_of_department_id);
                self.is_active = true;
            }
            DepartmentEvent::DepartmentUpdated(data) => {
                self.name = data.name;
                self.description = data.description;
                self.head_of_department_id = Some(data.head_of_department_id);
            }
            DepartmentEvent::DepartmentDeactivated(_) => {
                self.is_active = false;
            }
        }
    }

    fn pending_events(&self) -> &EventBuffer<DepartmentEvent> {
        &self.pending
    }

    fn pending_events_mut(&mut self) -> &mut EventBuffer<DepartmentEvent> {
        &mut self.pending
    }
}

impl Department {
    /// Normalizes a raw code such as `" cs "` to `"CS"`.
    pub fn normalize_code(raw: &str) -> Result<String, DepartmentError> {
        let code = raw.trim().to_uppercase();
        if code.is_empty()
            || code.len() > MAX_CODE_LEN
            || !code.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DepartmentError::InvalidDepartmentCode {
                code: raw.to_string(),
            });
        }
        Ok(code)
    }

    /// Id a department with this normalized code has, whether or not it
    /// exists yet.
    pub fn id_for_code(code: &str) -> DepartmentId {
        DepartmentId::from_uuid(AggregateId::derived(&DEPARTMENT_NAMESPACE, code).as_uuid())
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.id.map(|id| DepartmentId::from_uuid(id.as_uuid()))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn head_of_department_id(&self) -> Option<UserId> {
        self.head_of_department_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

// Command methods
impl Department {
    pub fn create(
        &mut self,
        code: &str,
        name: &str,
        description: &str,
        head_of_department_id: UserId,
    ) -> Result<(), DepartmentError> {
        let code = Self::normalize_code(code)?;
        if self.id.is_some() {
            return Err(DepartmentError::DuplicateDepartmentCode { code });
        }
        if name.trim().is_empty() {
            return Err(DepartmentError::EmptyName);
        }

        self.raise(DepartmentEvent::DepartmentCreated(DepartmentCreatedData {
            department_id: Self::id_for_code(&code),
            code,
            name: name.trim().to_string(),
            description: description.to_string(),
            head_of_department_id,
            created_at: Utc::now(),
        }));
        Ok(())
    }

    /// Allowed on an inactive department too.
    pub fn update_details(
        &mut self,
        name: &str,
        description: &str,
        head_of_department_id: UserId,
    ) -> Result<(), DepartmentError> {
        let department_id = self.identity()?;
        if name.trim().is_empty() {
            return Err(DepartmentError::EmptyName);
        }

        self.raise(DepartmentEvent::DepartmentUpdated(DepartmentUpdatedData {
            department_id,
            code: self.code.clone(),
            name: name.trim().to_string(),
            description: description.to_string(),
            head_of_department_id,
            updated_at: Utc::now(),
        }));
        Ok(())
    }

    /// Deactivates the department itself. Its courses are deactivated by
    /// [`DepartmentService::deactivate_department`](super::DepartmentService::deactivate_department).
    pub fn deactivate(&mut self) -> Result<(), DepartmentError> {
        let department_id = self.identity()?;
        if !self.is_active {
            return Err(DepartmentError::AlreadyDeactivated);
        }

        self.raise(DepartmentEvent::DepartmentDeactivated(
            DepartmentDeactivatedData {
                department_id,
                code: self.code.clone(),
                name: self.name.clone(),
                deactivated_at: Utc::now(),
            },
        ));
        Ok(())
    }

    fn identity(&self) -> Result<DepartmentId, DepartmentError> {
        self.department_id().ok_or(DepartmentError::NotFound)
    }
}

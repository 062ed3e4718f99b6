//! Course registration aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventBuffer};

use super::{
    RegistrationError, RegistrationEvent, RegistrationStatus, RegistrationType,
    events::{
        RegistrationApprovedData, RegistrationClosedData, RegistrationCreatedData,
        RegistrationRejectedData,
    },
};

const REGISTRATION_NAMESPACE: Uuid = Uuid::from_u128(0x8a21_64cf_0d3e_4b59_a7f2_1c9e_5d0b_3e84);

/// A student's registration for one course in one semester.
#[derive(Debug, Clone, Default)]
pub struct CourseRegistration {
    id: Option<AggregateId>,
    version: Version,
    student_id: Option<AggregateId>,
    course_id: Option<AggregateId>,
    semester_id: String,
    academic_year: i32,
    registration_type: RegistrationType,
    status: RegistrationStatus,
    registered_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    rejection_reason: Option<String>,
    is_active: bool,
    pending: EventBuffer<RegistrationEvent>,
}

impl Aggregate for CourseRegistration {
    type Event = RegistrationEvent;
    type Error = RegistrationError;

    fn aggregate_type() -> &'static str {
        "CourseRegistration"
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
            RegistrationEvent::RegistrationCreated(data) => {
                self.id = Some(data.registration_id);
                self.student_id = Some(data.student_id);
                self.course_id = Some(data.course_id);
                self.semester_id = data.semester_id;
                self.academic_year = data.academic_year;
                self.registration_type = data.registration_type;
                self.registered_at = Some(data.registered_at);
                self.status = RegistrationStatus::Pending;
                self.is_active = true;
            }
            RegistrationEvent::RegistrationApproved(data) => {
                self.status = RegistrationStatus::Approved;
                self.approved_at = Some(data.approved_at);
                self.approved_by = Some(data.approved_by);
            }
            RegistrationEvent::RegistrationRejected(data) => {
                self.status = RegistrationStatus::Rejected;
                self.rejection_reason = Some(data.reason);
            }
            RegistrationEvent::RegistrationCancelled(_) => {
                self.status = RegistrationStatus::Cancelled;
                self.is_active = false;
            }
            RegistrationEvent::RegistrationCompleted(_) => {
                self.status = RegistrationStatus::Completed;
            }
        }
    }

    fn pending_events(&self) -> &EventBuffer<RegistrationEvent> {
        &self.pending
    }

    fn pending_events_mut(&mut self) -> &mut EventBuffer<RegistrationEvent> {
        &mut self.pending
    }
}

// Query methods
impl CourseRegistration {
    /// Id of the one registration a student may hold for a course in a semester.
    pub fn id_for(student_id: AggregateId, course_id: AggregateId, semester_id: &str) -> AggregateId {
        let key = format!("{student_id}/{course_id}/{}", semester_id.trim());
        AggregateId::derived(&REGISTRATION_NAMESPACE, &key)
    }

    pub fn student_id(&self) -> Option<AggregateId> {
        self.student_id
    }

    pub fn course_id(&self) -> Option<AggregateId> {
        self.course_id
    }

    pub fn semester_id(&self) -> &str {
        &self.semester_id
    }

    pub fn academic_year(&self) -> i32 {
        self.academic_year
    }

    pub fn registration_type(&self) -> RegistrationType {
        self.registration_type
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

// Command methods
impl CourseRegistration {
    /// Opens a registration in `Pending`.
    pub fn create(
        &mut self,
        student_id: AggregateId,
        course_id: AggregateId,
        semester_id: &str,
        academic_year: i32,
        registration_type: RegistrationType,
    ) -> Result<(), RegistrationError> {
        if self.id.is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }
        let semester_id = semester_id.trim();
        if semester_id.is_empty() {
            return Err(RegistrationError::SemesterRequired);
        }

        self.raise(RegistrationEvent::RegistrationCreated(RegistrationCreatedData {
            registration_id: Self::id_for(student_id, course_id, semester_id),
            student_id,
            course_id,
            semester_id: semester_id.to_string(),
            academic_year,
            registration_type,
            registered_at: Utc::now(),
        }));
        Ok(())
    }

    pub fn approve(&mut self, approved_by: UserId) -> Result<(), RegistrationError> {
        let (registration_id, student_id, course_id) = self.identity()?;
        self.ensure(self.status.can_approve(), "approve")?;

        self.raise(RegistrationEvent::RegistrationApproved(RegistrationApprovedData {
            registration_id,
            student_id,
            course_id,
            approved_by,
            approved_at: Utc::now(),
        }));
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<(), RegistrationError> {
        let (registration_id, student_id, course_id) = self.identity()?;
        self.ensure(self.status.can_reject(), "reject")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RegistrationError::RejectionReasonRequired);
        }

        self.raise(RegistrationEvent::RegistrationRejected(RegistrationRejectedData {
            registration_id,
            student_id,
            course_id,
            reason: reason.to_string(),
        }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), RegistrationError> {
        let (registration_id, student_id, course_id) = self.identity()?;
        self.ensure(self.status.can_cancel(), "cancel")?;

        self.raise(RegistrationEvent::RegistrationCancelled(RegistrationClosedData {
            registration_id,
            student_id,
            course_id,
        }));
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), RegistrationError> {
        let (registration_id, student_id, course_id) = self.identity()?;
        self.ensure(self.status.can_complete(), "complete")?;

        self.raise(RegistrationEvent::RegistrationCompleted(RegistrationClosedData {
            registration_id,
            student_id,
            course_id,
        }));
        Ok(())
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), RegistrationError> {
        if allowed {
            Ok(())
        } else {
            Err(RegistrationError::InvalidStateTransition {
                current_status: self.status,
                action,
            })
        }
    }

    fn identity(&self) -> Result<(AggregateId, AggregateId, AggregateId), RegistrationError> {
        match (self.id, self.student_id, self.course_id) {
            (Some(id), Some(student), Some(course)) => Ok((id, student, course)),
            _ => Err(RegistrationError::NotFound),
        }
    }
}

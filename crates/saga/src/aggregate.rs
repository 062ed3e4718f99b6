//! Reassignment saga aggregate.

use common::{AggregateId, UserId};
use domain::{Aggregate, EventBuffer};
use event_store::Version;
use uuid::Uuid;

use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::reassignment::{ReassignmentOutcome, ReassignmentTrigger, SAGA_TYPE};
use crate::state::SagaState;

const SAGA_NAMESPACE: Uuid = Uuid::from_u128(0xc04d_93b1_6e2a_47f8_b5d1_72e0_4a9c_6b38);

/// Event-sourced progress of one coordinator reassignment.
///
/// Tracks which courses were identified and what happened to each of them,
/// so a resumed run only touches the courses that are still outstanding.
#[derive(Debug, Default)]
pub struct ReassignmentSaga {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    trigger: Option<ReassignmentTrigger>,
    correlation_id: Option<Uuid>,
    state: SagaState,
    attempt: u32,
    identified: Vec<AggregateId>,
    reassigned: Vec<AggregateId>,
    skipped: Vec<AggregateId>,
    failed: Vec<AggregateId>,
    failure_reason: Option<String>,
    pending: EventBuffer<SagaEvent>,
}

impl Aggregate for ReassignmentSaga {
    type Event = SagaEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        SAGA_TYPE
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
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.user_id = Some(data.user_id);
                self.trigger = Some(data.trigger);
                self.correlation_id = Some(data.correlation_id);
                self.state = SagaState::Running;
                self.attempt = 1;
            }
            SagaEvent::SagaResumed(data) => {
                self.state = SagaState::Running;
                self.attempt = data.attempt;
                self.failed.clear();
                self.failure_reason = None;
            }
            SagaEvent::CoursesIdentified(data) => {
                for course_id in data.course_ids {
                    if !self.identified.contains(&course_id) {
                        self.identified.push(course_id);
                    }
                }
            }
            SagaEvent::CourseReassigned(data) => {
                self.reassigned.push(data.course_id);
            }
            SagaEvent::CourseSkipped(data) => {
                self.skipped.push(data.course_id);
            }
            SagaEvent::StepFailed(data) => {
                self.failed.push(data.course_id);
            }
            SagaEvent::SagaCompleted(_) => {
                self.state = SagaState::Completed;
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }

    fn pending_events(&self) -> &EventBuffer<Self::Event> {
        &self.pending
    }

    fn pending_events_mut(&mut self) -> &mut EventBuffer<Self::Event> {
        &mut self.pending
    }
}

// Queries
impl ReassignmentSaga {
    /// Saga id for a triggering event: the same correlation id always maps
    /// to the same saga.
    pub fn id_for(correlation_id: Uuid) -> AggregateId {
        AggregateId::derived(&SAGA_NAMESPACE, &correlation_id.to_string())
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn trigger(&self) -> Option<&ReassignmentTrigger> {
        self.trigger.as_ref()
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }

    /// 1 for the first run, incremented by each resume.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn identified(&self) -> &[AggregateId] {
        &self.identified
    }

    pub fn reassigned(&self) -> &[AggregateId] {
        &self.reassigned
    }

    pub fn skipped(&self) -> &[AggregateId] {
        &self.skipped
    }

    /// Courses that failed during the current attempt.
    pub fn failed(&self) -> &[AggregateId] {
        &self.failed
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Identified courses with no recorded result yet.
    pub fn outstanding(&self) -> Vec<AggregateId> {
        self.identified
            .iter()
            .filter(|id| !self.is_settled(**id))
            .copied()
            .collect()
    }

    pub fn outcome(&self, saga_id: AggregateId, already_completed: bool) -> ReassignmentOutcome {
        ReassignmentOutcome {
            saga_id,
            reassigned: self.reassigned.clone(),
            skipped: self.skipped.clone(),
            already_completed,
        }
    }

    fn is_settled(&self, course_id: AggregateId) -> bool {
        self.reassigned.contains(&course_id) || self.skipped.contains(&course_id)
    }

    fn require_running(&self) -> Result<(), SagaError> {
        if self.state == SagaState::Running {
            Ok(())
        } else {
            Err(SagaError::InvalidState {
                expected: SagaState::Running.to_string(),
                actual: self.state,
            })
        }
    }
}

// Commands
impl ReassignmentSaga {
    pub fn start(
        &mut self,
        user_id: UserId,
        trigger: ReassignmentTrigger,
        correlation_id: Uuid,
    ) -> Result<(), SagaError> {
        if !self.state.can_start() {
            return Err(SagaError::InvalidState {
                expected: SagaState::NotStarted.to_string(),
                actual: self.state,
            });
        }

        self.raise(SagaEvent::saga_started(
            Self::id_for(correlation_id),
            user_id,
            trigger,
            correlation_id,
        ));
        Ok(())
    }

    /// Picks up a failed or interrupted saga for another attempt.
    pub fn resume(&mut self) -> Result<(), SagaError> {
        if !self.state.can_resume() {
            return Err(SagaError::InvalidState {
                expected: "Running or Failed".to_string(),
                actual: self.state,
            });
        }

        self.raise(SagaEvent::saga_resumed(self.attempt + 1));
        Ok(())
    }

    /// Records the user's current courses. Courses already known are not
    /// recorded twice.
    pub fn identify(&mut self, course_ids: Vec<AggregateId>) -> Result<(), SagaError> {
        self.require_running()?;

        let new: Vec<_> = course_ids
            .into_iter()
            .filter(|id| !self.identified.contains(id))
            .collect();
        if !new.is_empty() {
            self.raise(SagaEvent::courses_identified(new));
        }
        Ok(())
    }

    pub fn record_reassigned(
        &mut self,
        course_id: AggregateId,
        previous_coordinator_id: UserId,
        new_coordinator_id: UserId,
    ) -> Result<(), SagaError> {
        self.require_running()?;
        if self.is_settled(course_id) {
            return Ok(());
        }

        self.raise(SagaEvent::course_reassigned(
            course_id,
            previous_coordinator_id,
            new_coordinator_id,
        ));
        Ok(())
    }

    pub fn record_skipped(
        &mut self,
        course_id: AggregateId,
        reason: impl Into<String>,
    ) -> Result<(), SagaError> {
        self.require_running()?;
        if self.is_settled(course_id) {
            return Ok(());
        }

        self.raise(SagaEvent::course_skipped(course_id, reason));
        Ok(())
    }

    pub fn record_step_failed(
        &mut self,
        course_id: AggregateId,
        error: impl Into<String>,
    ) -> Result<(), SagaError> {
        self.require_running()?;
        self.raise(SagaEvent::step_failed(course_id, error));
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), SagaError> {
        self.require_running()?;
        if !self.failed.is_empty() {
            return Err(SagaError::InvalidState {
                expected: "no failed steps".to_string(),
                actual: self.state,
            });
        }

        self.raise(SagaEvent::saga_completed(self.reassigned.len()));
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SagaError> {
        self.require_running()?;
        self.raise(SagaEvent::saga_failed(reason));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> ReassignmentSaga {
        let mut saga = ReassignmentSaga::default();
        saga.start(
            UserId::new(),
            ReassignmentTrigger::UserDeactivated,
            Uuid::new_v4(),
        )
        .unwrap();
        saga.take_pending_events();
        saga
    }

    #[test]
    fn default_saga() {
        let saga = ReassignmentSaga::default();
        assert!(saga.id().is_none());
        assert_eq!(saga.state(), SagaState::NotStarted);
        assert_eq!(saga.attempt(), 0);
    }

    #[test]
    fn id_is_derived_from_correlation_id() {
        let correlation = Uuid::new_v4();
        assert_eq!(
            ReassignmentSaga::id_for(correlation),
            ReassignmentSaga::id_for(correlation)
        );
        assert_ne!(
            ReassignmentSaga::id_for(correlation),
            ReassignmentSaga::id_for(Uuid::new_v4())
        );
    }

    #[test]
    fn start_sets_identity() {
        let mut saga = ReassignmentSaga::default();
        let user = UserId::new();
        let correlation = Uuid::new_v4();

        saga.start(user, ReassignmentTrigger::UserDeactivated, correlation)
            .unwrap();

        assert_eq!(saga.id(), Some(ReassignmentSaga::id_for(correlation)));
        assert_eq!(saga.user_id(), Some(user));
        assert_eq!(saga.correlation_id(), Some(correlation));
        assert_eq!(saga.state(), SagaState::Running);
        assert_eq!(saga.attempt(), 1);
        assert_eq!(saga.pending_events().len(), 1);
    }

    #[test]
    fn cannot_start_twice() {
        let mut saga = started();
        let err = saga
            .start(UserId::new(), ReassignmentTrigger::UserDeactivated, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(
            err,
            SagaError::InvalidState {
                actual: SagaState::Running,
                ..
            }
        ));
    }

    #[test]
    fn outstanding_excludes_settled_courses() {
        let mut saga = started();
        let (a, b, c) = (AggregateId::new(), AggregateId::new(), AggregateId::new());

        saga.identify(vec![a, b, c]).unwrap();
        saga.record_reassigned(a, UserId::new(), UserId::new()).unwrap();
        saga.record_skipped(b, "course is inactive").unwrap();

        assert_eq!(saga.outstanding(), vec![c]);
    }

    #[test]
    fn identify_ignores_known_courses() {
        let mut saga = started();
        let a = AggregateId::new();
        saga.identify(vec![a]).unwrap();
        saga.take_pending_events();

        saga.identify(vec![a]).unwrap();
        assert!(saga.pending_events().is_empty());
        assert_eq!(saga.identified(), &[a]);
    }

    #[test]
    fn settled_course_is_not_recorded_twice() {
        let mut saga = started();
        let a = AggregateId::new();
        saga.identify(vec![a]).unwrap();
        saga.record_reassigned(a, UserId::new(), UserId::new()).unwrap();
        saga.take_pending_events();

        saga.record_skipped(a, "already moved").unwrap();
        assert!(saga.pending_events().is_empty());
        assert_eq!(saga.reassigned(), &[a]);
        assert!(saga.skipped().is_empty());
    }

    #[test]
    fn failure_then_resume_retries_failed_course() {
        let mut saga = started();
        let a = AggregateId::new();
        saga.identify(vec![a]).unwrap();
        saga.record_step_failed(a, "store unavailable").unwrap();

        assert!(saga.complete().is_err());
        saga.fail("1 course(s) could not be reassigned").unwrap();
        assert_eq!(saga.state(), SagaState::Failed);
        assert!(saga.record_skipped(a, "x").is_err());

        saga.resume().unwrap();
        assert_eq!(saga.state(), SagaState::Running);
        assert_eq!(saga.attempt(), 2);
        assert!(saga.failed().is_empty());
        assert!(saga.failure_reason().is_none());
        assert_eq!(saga.outstanding(), vec![a]);

        saga.record_reassigned(a, UserId::new(), UserId::new()).unwrap();
        saga.complete().unwrap();
        assert!(saga.state().is_terminal());
    }

    #[test]
    fn completed_saga_cannot_resume() {
        let mut saga = started();
        saga.complete().unwrap();
        assert!(saga.resume().is_err());

        let outcome = saga.outcome(saga.id().unwrap(), true);
        assert!(outcome.already_completed);
        assert!(outcome.reassigned.is_empty());
    }

    #[test]
    fn replaying_events_rebuilds_progress() {
        let mut saga = started();
        let a = AggregateId::new();
        let correlation = saga.correlation_id().unwrap();

        let mut events = vec![SagaEvent::saga_started(
            ReassignmentSaga::id_for(correlation),
            saga.user_id().unwrap(),
            ReassignmentTrigger::UserDeactivated,
            correlation,
        )];
        saga.identify(vec![a]).unwrap();
        saga.record_reassigned(a, UserId::new(), UserId::new()).unwrap();
        saga.complete().unwrap();
        events.extend(saga.take_pending_events());

        let mut rebuilt = ReassignmentSaga::default();
        rebuilt.apply_events(events);

        assert_eq!(rebuilt.state(), SagaState::Completed);
        assert_eq!(rebuilt.reassigned(), &[a]);
        assert!(rebuilt.outstanding().is_empty());
    }
}

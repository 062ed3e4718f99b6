//! Course catalog consumers of user lifecycle events.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::EventStore;
use messaging::{ConsumerError, IntegrationEvent, IntegrationEventHandler, IntegrationPayload};
use saga::{
    AssignmentIndex, COORDINATOR_ROLE, ReassignmentRequest, ReassignmentTrigger,
    ReassignmentWorkflow,
};

pub const SERVICE: &str = "course-catalog";

/// User kinds issued by the authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    CourseCoordinator,
    Student,
    Staff,
    Administrator,
}

impl UserType {
    /// Case-insensitive; `None` for kinds this service does not know.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "coursecoordinator" => Some(UserType::CourseCoordinator),
            "student" => Some(UserType::Student),
            "staff" => Some(UserType::Staff),
            "administrator" => Some(UserType::Administrator),
            _ => None,
        }
    }
}

fn unexpected(event: &IntegrationEvent) -> ConsumerError {
    ConsumerError::UnexpectedEvent(event.event_type().to_string())
}

/// Notes new users. The catalog keeps no user state.
#[derive(Debug, Default)]
pub struct UserCreatedHandler;

#[async_trait]
impl IntegrationEventHandler for UserCreatedHandler {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        let IntegrationPayload::UserCreated {
            user_id,
            email,
            user_type,
            ..
        } = &event.payload
        else {
            return Err(unexpected(event));
        };

        match UserType::parse(user_type) {
            Some(UserType::CourseCoordinator) => {
                tracing::info!(%user_id, %email, "New course coordinator")
            }
            Some(UserType::Student) => tracing::info!(%user_id, %email, "New student"),
            Some(UserType::Staff | UserType::Administrator) => {
                tracing::info!(%user_id, %email, %user_type, "New staff member")
            }
            None => tracing::warn!(%user_id, %user_type, "Unknown user type"),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct UserUpdatedHandler;

#[async_trait]
impl IntegrationEventHandler for UserUpdatedHandler {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        let IntegrationPayload::UserUpdated {
            user_id,
            update_type,
            ..
        } = &event.payload
        else {
            return Err(unexpected(event));
        };

        tracing::info!(%user_id, %update_type, "User updated");
        Ok(())
    }
}

/// Hands the courses of a deactivated user, or of a user who stopped being
/// a coordinator, to the default coordinator.
///
/// Bound to both the `user-deactivated` and `user-role-changed` endpoints.
/// A failed reassignment is returned so the bus redelivers the event, and
/// the redelivery resumes the same saga.
pub struct CoordinatorDepartureHandler<S: EventStore, I: AssignmentIndex> {
    workflow: Arc<ReassignmentWorkflow<S, I>>,
}

impl<S: EventStore, I: AssignmentIndex> CoordinatorDepartureHandler<S, I> {
    pub fn new(workflow: Arc<ReassignmentWorkflow<S, I>>) -> Self {
        Self { workflow }
    }

    fn request_for(event: &IntegrationEvent) -> Result<Option<ReassignmentRequest>, ConsumerError> {
        match &event.payload {
            IntegrationPayload::UserDeactivated { user_id, .. } => Ok(Some(
                ReassignmentRequest::user_deactivated(*user_id, event.correlation_id),
            )),
            IntegrationPayload::UserRoleChanged {
                user_id,
                previous_role,
                new_role,
                ..
            } => {
                if ReassignmentTrigger::leaves_coordinator_role(previous_role, new_role) {
                    return Ok(Some(ReassignmentRequest::role_changed(
                        *user_id,
                        previous_role.as_str(),
                        new_role.as_str(),
                        event.correlation_id,
                    )));
                }
                if new_role.eq_ignore_ascii_case(COORDINATOR_ROLE) {
                    tracing::info!(%user_id, "User became a course coordinator");
                }
                Ok(None)
            }
            _ => Err(unexpected(event)),
        }
    }
}

#[async_trait]
impl<S, I> IntegrationEventHandler for CoordinatorDepartureHandler<S, I>
where
    S: EventStore + Clone + 'static,
    I: AssignmentIndex + 'static,
{
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        let Some(request) = Self::request_for(event)? else {
            return Ok(());
        };

        let user_id = request.user_id;
        let outcome = self
            .workflow
            .run(request)
            .await
            .map_err(ConsumerError::handler)?;

        tracing::info!(
            %user_id,
            saga_id = %outcome.saga_id,
            reassigned = outcome.reassigned.len(),
            skipped = outcome.skipped.len(),
            already_completed = outcome.already_completed,
            "Coordinator departure handled"
        );
        Ok(())
    }
}

//! Compensating coordinator reassignment workflow.

use std::time::Instant;

use common::{AggregateId, UserId};
use domain::{Aggregate, Course, CourseService, DomainEvent};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use uuid::Uuid;

use crate::aggregate::ReassignmentSaga;
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::index::AssignmentIndex;
use crate::reassignment::{ReassignmentOutcome, ReassignmentRequest};

/// Hands every active course of a departing coordinator to the default
/// coordinator.
///
/// Progress is recorded as a [`ReassignmentSaga`] whose id is derived from the
/// request's correlation id. A failed run leaves the saga `Failed` and returns
/// an error; running the same request again resumes it and only retries the
/// courses without a recorded result. Running a completed request again
/// changes nothing.
pub struct ReassignmentWorkflow<S: EventStore, I: AssignmentIndex> {
    store: S,
    courses: CourseService<S>,
    index: I,
    default_coordinator: UserId,
}

impl<S: EventStore + Clone, I: AssignmentIndex> ReassignmentWorkflow<S, I> {
    pub fn new(store: S, index: I, default_coordinator: UserId) -> Self {
        Self {
            courses: CourseService::new(store.clone()),
            store,
            index,
            default_coordinator,
        }
    }

    /// Sets how many times each course write is retried after a concurrent
    /// write.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.courses = self.courses.with_max_attempts(max_attempts);
        self
    }

    pub fn default_coordinator(&self) -> UserId {
        self.default_coordinator
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            user_id = %request.user_id,
            correlation_id = %request.correlation_id,
            trigger = request.trigger.kind(),
        )
    )]
    pub async fn run(&self, request: ReassignmentRequest) -> Result<ReassignmentOutcome> {
        metrics::counter!("reassignment_runs_total", "trigger" => request.trigger.kind())
            .increment(1);
        let started = Instant::now();

        let result = self.execute(&request).await;

        metrics::histogram!("reassignment_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if let Err(error) = &result {
            metrics::counter!("reassignment_failures_total").increment(1);
            tracing::error!(error = %error, "Coordinator reassignment failed");
        }
        result
    }

    /// Loads the saga recorded for `correlation_id`, if any.
    pub async fn get_saga(&self, correlation_id: Uuid) -> Result<Option<ReassignmentSaga>> {
        let saga = self.load(ReassignmentSaga::id_for(correlation_id)).await?;
        Ok(saga.id().is_some().then_some(saga))
    }

    async fn execute(&self, request: &ReassignmentRequest) -> Result<ReassignmentOutcome> {
        let saga_id = ReassignmentSaga::id_for(request.correlation_id);
        let mut saga = self.load(saga_id).await?;

        if saga.state().is_terminal() {
            tracing::info!(%saga_id, "Reassignment already completed");
            return Ok(saga.outcome(saga_id, true));
        }

        if saga.state().can_start() {
            saga.start(
                request.user_id,
                request.trigger.clone(),
                request.correlation_id,
            )?;
        } else {
            saga.resume()?;
            tracing::info!(%saga_id, attempt = saga.attempt(), "Resuming reassignment");
        }
        self.persist(saga_id, &mut saga, request.correlation_id)
            .await?;

        let course_ids = match self.index.active_courses_for(request.user_id).await {
            Ok(course_ids) => course_ids,
            Err(error) => {
                saga.fail(format!("could not look up courses: {error}"))?;
                self.persist(saga_id, &mut saga, request.correlation_id)
                    .await?;
                return Err(error);
            }
        };
        saga.identify(course_ids)?;
        self.persist(saga_id, &mut saga, request.correlation_id)
            .await?;

        for course_id in saga.outstanding() {
            self.reassign_course(&mut saga, course_id, request).await?;
            self.persist(saga_id, &mut saga, request.correlation_id)
                .await?;
        }

        let failed = saga.failed().len();
        if failed > 0 {
            saga.fail(format!("{failed} course(s) could not be reassigned"))?;
            self.persist(saga_id, &mut saga, request.correlation_id)
                .await?;
            return Err(SagaError::StepsFailed { saga_id, failed });
        }

        saga.complete()?;
        self.persist(saga_id, &mut saga, request.correlation_id)
            .await?;

        tracing::info!(
            %saga_id,
            reassigned = saga.reassigned().len(),
            skipped = saga.skipped().len(),
            "Reassignment completed"
        );
        Ok(saga.outcome(saga_id, false))
    }

    /// Moves one course and records what happened in `saga`.
    async fn reassign_course(
        &self,
        saga: &mut ReassignmentSaga,
        course_id: AggregateId,
        request: &ReassignmentRequest,
    ) -> Result<()> {
        let result = self
            .courses
            .reassign_coordinator_from(
                course_id,
                request.user_id,
                self.default_coordinator,
                Some(request.correlation_id),
            )
            .await;

        match result {
            Ok(result) if !result.events.is_empty() => {
                metrics::counter!("reassignment_courses_reassigned_total").increment(1);
                tracing::info!(
                    %course_id,
                    new_coordinator_id = %self.default_coordinator,
                    "Course reassigned"
                );
                saga.record_reassigned(course_id, request.user_id, self.default_coordinator)
            }
            Ok(result) => {
                let reason = skip_reason(&result.aggregate, request.user_id);
                tracing::info!(%course_id, reason, "Course skipped");
                saga.record_skipped(course_id, reason)
            }
            Err(error) if error.is_rejection() => {
                tracing::warn!(%course_id, reason = %error, "Course skipped");
                saga.record_skipped(course_id, error.to_string())
            }
            Err(error) => {
                tracing::error!(%course_id, error = %error, "Course reassignment failed");
                saga.record_step_failed(course_id, error.to_string())
            }
        }
    }

    async fn load(&self, saga_id: AggregateId) -> Result<ReassignmentSaga> {
        let mut saga = ReassignmentSaga::default();
        for envelope in self.store.get_events_for_aggregate(saga_id).await? {
            let event: SagaEvent = serde_json::from_value(envelope.payload)?;
            saga.apply(event);
            saga.set_version(envelope.version);
        }
        Ok(saga)
    }

    /// Appends the saga's pending events, caused by the triggering event.
    async fn persist(
        &self,
        saga_id: AggregateId,
        saga: &mut ReassignmentSaga,
        correlation_id: Uuid,
    ) -> Result<()> {
        let events = saga.take_pending_events();
        if events.is_empty() {
            return Ok(());
        }

        let current_version = saga.version();
        let mut version = current_version;
        let mut envelopes = Vec::with_capacity(events.len());
        for event in &events {
            version = version.next();
            envelopes.push(
                EventEnvelope::builder()
                    .event_type(event.event_type())
                    .aggregate_id(saga_id)
                    .aggregate_type(ReassignmentSaga::aggregate_type())
                    .version(version)
                    .payload(event)?
                    .caused_by(correlation_id)
                    .build()?,
            );
        }

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };
        let new_version = self.store.append(envelopes, options).await?;
        saga.set_version(new_version);
        Ok(())
    }
}

fn skip_reason(course: &Course, user_id: UserId) -> &'static str {
    if !course.is_active() {
        "course is inactive"
    } else if course.coordinator_id() != Some(user_id) {
        "course is coordinated by another user"
    } else {
        "user is already the default coordinator"
    }
}

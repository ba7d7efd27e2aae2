//! The enrollment engine: the combined entry point callers use.
//!
//! `reserve` chains the eligibility check, the capacity-gated reservation
//! transaction, and post-commit domain event dispatch. Dispatch failures are
//! logged and never unwind the reservation: by the time handlers run the
//! transaction has already committed.

use crate::bus::DomainEventBus;
use crate::eligibility::{EligibilityEvaluator, EligibilityOutcome};
use crate::environment::Clock;
use crate::error::{EligibilityError, LifecycleError, ReserveError, StorageError};
use crate::event::{
    Criticality, DomainEvent, IntegrationEvent, ENROLLMENT_CANCELLED, ENROLLMENT_CONFIRMED,
    ENROLLMENT_RESERVED,
};
use crate::store::EnrollmentStore;
use crate::types::{
    Area, Enrollment, EnrollmentId, GuardianId, ParticipantId, ProgramId, Remaining,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Orchestrates reservations and the enrollment lifecycle.
///
/// One instance is built at startup with its dependencies passed explicitly,
/// then shared (`Arc`) across request workers; it holds no per-request
/// state.
pub struct EnrollmentService {
    store: Arc<dyn EnrollmentStore>,
    eligibility: EligibilityEvaluator,
    bus: Arc<DomainEventBus>,
    clock: Arc<dyn Clock>,
}

impl EnrollmentService {
    /// Wire the service to its store, evaluator, bus, and clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        eligibility: EligibilityEvaluator,
        bus: Arc<DomainEventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            eligibility,
            bus,
            clock,
        }
    }

    /// Reserve a seat for a participant.
    ///
    /// Eligibility is checked first; an ineligible participant never reaches
    /// the reservation transaction. On success the `enrollment.reserved`
    /// domain event is dispatched to the enrollment area's handlers.
    ///
    /// # Errors
    ///
    /// [`ReserveError::Ineligible`] listing every violated predicate,
    /// [`ReserveError::Full`], [`ReserveError::Duplicate`],
    /// [`ReserveError::Busy`], [`ReserveError::NotFound`], or a storage
    /// fault. These are expected business outcomes for the caller to
    /// present; they are never escalated here.
    pub async fn reserve(
        &self,
        program_id: ProgramId,
        participant_id: ParticipantId,
        requested_by: GuardianId,
    ) -> Result<Enrollment, ReserveError> {
        match self.eligibility.check(program_id, participant_id).await {
            Ok(EligibilityOutcome::Eligible) => {}
            Ok(EligibilityOutcome::Ineligible(reasons)) => {
                return Err(ReserveError::Ineligible(reasons));
            }
            Err(EligibilityError::UnknownParticipant | EligibilityError::UnknownProgram) => {
                return Err(ReserveError::NotFound);
            }
            Err(EligibilityError::Storage(fault)) => return Err(ReserveError::Storage(fault)),
        }

        let enrollment = self
            .store
            .reserve(program_id, participant_id, requested_by, self.clock.now())
            .await?;

        tracing::info!(
            enrollment_id = %enrollment.id,
            program_id = %program_id,
            participant_id = %participant_id,
            "seat reserved"
        );

        self.dispatch_after_commit(&DomainEvent::enrollment_reserved(&enrollment))
            .await;
        Ok(enrollment)
    }

    /// Check eligibility without reserving.
    ///
    /// # Errors
    ///
    /// See [`EligibilityEvaluator::check`].
    pub async fn check_eligibility(
        &self,
        program_id: ProgramId,
        participant_id: ParticipantId,
    ) -> Result<EligibilityOutcome, EligibilityError> {
        self.eligibility.check(program_id, participant_id).await
    }

    /// Confirm a pending enrollment.
    ///
    /// # Errors
    ///
    /// See [`EnrollmentStore::confirm`].
    pub async fn confirm(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, LifecycleError> {
        let enrollment = self.store.confirm(enrollment_id).await?;
        self.dispatch_after_commit(&DomainEvent::enrollment_confirmed(
            &enrollment,
            self.clock.now(),
        ))
        .await;
        Ok(enrollment)
    }

    /// Complete a confirmed enrollment. Terminal; no domain event is raised,
    /// completion is a bookkeeping transition nothing currently reacts to.
    ///
    /// # Errors
    ///
    /// See [`EnrollmentStore::complete`].
    pub async fn complete(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, LifecycleError> {
        self.store.complete(enrollment_id).await
    }

    /// Cancel an active enrollment, freeing its seat.
    ///
    /// # Errors
    ///
    /// See [`EnrollmentStore::cancel`].
    pub async fn cancel(
        &self,
        enrollment_id: EnrollmentId,
        reason: &str,
    ) -> Result<Enrollment, LifecycleError> {
        let enrollment = self.store.cancel(enrollment_id, reason, self.clock.now()).await?;
        self.dispatch_after_commit(&DomainEvent::enrollment_cancelled(
            &enrollment,
            self.clock.now(),
        ))
        .await;
        Ok(enrollment)
    }

    /// Seats still available in one program.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    pub async fn remaining_capacity(
        &self,
        program_id: ProgramId,
    ) -> Result<Remaining, StorageError> {
        self.store.remaining_capacity(program_id).await
    }

    /// Remaining capacity for many programs in one round trip.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    pub async fn remaining_capacity_for(
        &self,
        program_ids: &[ProgramId],
    ) -> Result<HashMap<ProgramId, Remaining>, StorageError> {
        self.store.remaining_capacity_for(program_ids).await
    }

    /// Dispatch post-commit. Aggregated handler failures are logged here and
    /// go no further; the state change is already durable and dispatch is
    /// never retried.
    async fn dispatch_after_commit(&self, event: &DomainEvent) {
        if let Err(err) = self.bus.dispatch(Area::Enrollment, event).await {
            tracing::warn!(
                event_type = %event.event_type,
                aggregate_id = %event.aggregate_id,
                failed = err.failures.len(),
                total = err.total,
                "handlers failed after commit; state is durable, not retrying"
            );
        }
    }
}

/// The enrollment area's promotion mapping: which domain events cross the
/// area boundary, and as what.
///
/// Cancellations are `Critical` — refund and notification cascades hang off
/// them — while reservations and confirmations are advisory `BestEffort`
/// fan-out to dashboards and messaging.
#[must_use]
pub fn promote_enrollment_event(event: &DomainEvent) -> Option<IntegrationEvent> {
    let (versioned, criticality) = match event.event_type.as_str() {
        ENROLLMENT_RESERVED => ("enrollment.reserved.v1", Criticality::BestEffort),
        ENROLLMENT_CONFIRMED => ("enrollment.confirmed.v1", Criticality::BestEffort),
        ENROLLMENT_CANCELLED => ("enrollment.cancelled.v1", Criticality::Critical),
        _ => return None,
    };

    IntegrationEvent::new(
        versioned,
        Area::Enrollment,
        &event.aggregate_type,
        &event.aggregate_id.to_string(),
        event.payload.clone(),
        criticality,
    )
    .map(|integration| integration.correlated(event.aggregate_id, None))
    .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::types::EnrollmentStatus;
    use chrono::Utc;

    fn sample_enrollment(status: EnrollmentStatus) -> Enrollment {
        Enrollment {
            id: EnrollmentId::new(),
            program_id: ProgramId::new(),
            participant_id: ParticipantId::new(),
            requested_by: GuardianId::new(),
            status,
            created_at: Utc::now(),
            cancellation_reason: None,
        }
    }

    #[test]
    fn reserved_promotes_as_best_effort() {
        let enrollment = sample_enrollment(EnrollmentStatus::Pending);
        let event = DomainEvent::enrollment_reserved(&enrollment);
        let integration = promote_enrollment_event(&event).expect("promoted");

        assert_eq!(integration.event_type, "enrollment.reserved.v1");
        assert_eq!(integration.criticality, Criticality::BestEffort);
        assert_eq!(integration.entity_id, enrollment.id.to_string());
        assert_eq!(integration.correlation_id, Some(*enrollment.id.as_uuid()));
    }

    #[test]
    fn cancelled_promotes_as_critical() {
        let mut enrollment = sample_enrollment(EnrollmentStatus::Cancelled);
        enrollment.cancellation_reason = Some("injury".to_string());
        let event = DomainEvent::enrollment_cancelled(&enrollment, Utc::now());
        let integration = promote_enrollment_event(&event).expect("promoted");

        assert_eq!(integration.event_type, "enrollment.cancelled.v1");
        assert_eq!(integration.criticality, Criticality::Critical);
    }

    #[test]
    fn local_only_events_stay_local() {
        let event = DomainEvent::new(
            "enrollment.note_added",
            "enrollment",
            uuid::Uuid::new_v4(),
            serde_json::Map::new(),
            Utc::now(),
        );
        assert!(promote_enrollment_event(&event).is_none());
    }
}

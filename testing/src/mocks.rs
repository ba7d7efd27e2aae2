//! In-memory fakes for the core's ports.
//!
//! The enrollment store emulates the storage transaction with one mutex held
//! across the count-and-insert window, so the no-overselling and duplicate
//! invariants hold under concurrent `reserve` calls exactly as they do
//! against the real database. No fake performs I/O; everything is
//! deterministic.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::acl::{AclError, ParticipantDirectory, ProgramCatalog};
use rollcall_core::environment::Clock;
use rollcall_core::error::{
    ConsentError, LifecycleError, PolicyError, PublishError, ReserveError, StorageError,
};
use rollcall_core::event::IntegrationEvent;
use rollcall_core::publish::IntegrationEventPublisher;
use rollcall_core::store::{
    CapacityPolicyStore, ConsentStore, EligibilityPolicyStore, EnrollmentStore,
};
use rollcall_core::types::{
    CapacityPolicy, ConsentId, ConsentRecord, ConsentType, EligibilityPolicy, Enrollment,
    EnrollmentId, EnrollmentStatus, GuardianId, ParticipantAttributes, ParticipantId, ProgramId,
    Remaining,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed clock for deterministic tests: always returns the same time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-06-01 00:00:00 UTC).
///
/// # Panics
///
/// Panics if the hardcoded timestamp fails to parse, which should never
/// happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

#[derive(Default)]
struct EnrollmentState {
    capacity: HashMap<ProgramId, CapacityPolicy>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
}

/// In-memory [`EnrollmentStore`] and [`CapacityPolicyStore`] over shared
/// state, with transaction semantics provided by one mutex.
#[derive(Default)]
pub struct InMemoryEnrollmentStore {
    state: Mutex<EnrollmentState>,
}

impl InMemoryEnrollmentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored enrollment, for assertions.
    #[must_use]
    pub fn all_enrollments(&self) -> Vec<Enrollment> {
        locked(&self.state).enrollments.values().cloned().collect()
    }

    /// Active enrollments for a program, for assertions.
    #[must_use]
    pub fn active_count(&self, program_id: ProgramId) -> usize {
        locked(&self.state)
            .enrollments
            .values()
            .filter(|e| e.program_id == program_id && e.status.is_active())
            .count()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn reserve(
        &self,
        program_id: ProgramId,
        participant_id: ParticipantId,
        requested_by: GuardianId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ReserveError> {
        // The guard spans check and insert, like the row lock does.
        let mut state = locked(&self.state);

        // Duplicate before capacity: "already booked" beats "program full"
        // when both hold, matching the real store.
        let duplicate = state.enrollments.values().any(|e| {
            e.program_id == program_id
                && e.participant_id == participant_id
                && e.status.is_active()
        });
        if duplicate {
            return Err(ReserveError::Duplicate);
        }

        let maximum = state.capacity.get(&program_id).and_then(|p| p.maximum);
        let active = state
            .enrollments
            .values()
            .filter(|e| e.program_id == program_id && e.status.is_active())
            .count();

        if let Some(maximum) = maximum {
            if u32::try_from(active).unwrap_or(u32::MAX) >= maximum {
                return Err(ReserveError::Full);
            }
        }

        let enrollment = Enrollment {
            id: EnrollmentId::new(),
            program_id,
            participant_id,
            requested_by,
            status: EnrollmentStatus::Pending,
            created_at: now,
            cancellation_reason: None,
        };
        state.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn confirm(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, LifecycleError> {
        self.transition(enrollment_id, EnrollmentStatus::Confirmed, None)
    }

    async fn complete(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, LifecycleError> {
        self.transition(enrollment_id, EnrollmentStatus::Completed, None)
    }

    async fn cancel(
        &self,
        enrollment_id: EnrollmentId,
        reason: &str,
        _now: DateTime<Utc>,
    ) -> Result<Enrollment, LifecycleError> {
        self.transition(enrollment_id, EnrollmentStatus::Cancelled, Some(reason))
    }

    async fn remaining_capacity(&self, program_id: ProgramId) -> Result<Remaining, StorageError> {
        let state = locked(&self.state);
        Ok(Self::remaining_locked(&state, program_id))
    }

    async fn remaining_capacity_for(
        &self,
        program_ids: &[ProgramId],
    ) -> Result<HashMap<ProgramId, Remaining>, StorageError> {
        let state = locked(&self.state);
        Ok(program_ids
            .iter()
            .map(|id| (*id, Self::remaining_locked(&state, *id)))
            .collect())
    }
}

impl InMemoryEnrollmentStore {
    fn transition(
        &self,
        enrollment_id: EnrollmentId,
        to: EnrollmentStatus,
        reason: Option<&str>,
    ) -> Result<Enrollment, LifecycleError> {
        let mut state = locked(&self.state);
        let enrollment = state
            .enrollments
            .get_mut(&enrollment_id)
            .ok_or(LifecycleError::NotFound)?;
        enrollment.status = enrollment.status.transition(to)?;
        enrollment.cancellation_reason = reason.map(ToString::to_string);
        Ok(enrollment.clone())
    }

    fn remaining_locked(state: &EnrollmentState, program_id: ProgramId) -> Remaining {
        match state.capacity.get(&program_id).and_then(|p| p.maximum) {
            None => Remaining::Unlimited,
            Some(maximum) => {
                let active = state
                    .enrollments
                    .values()
                    .filter(|e| e.program_id == program_id && e.status.is_active())
                    .count();
                let active = u32::try_from(active).unwrap_or(u32::MAX);
                Remaining::Seats(maximum.saturating_sub(active))
            }
        }
    }
}

#[async_trait]
impl CapacityPolicyStore for InMemoryEnrollmentStore {
    async fn upsert(&self, policy: CapacityPolicy) -> Result<(), PolicyError> {
        policy.validate().map_err(PolicyError::Validation)?;
        locked(&self.state).capacity.insert(policy.program_id, policy);
        Ok(())
    }

    async fn get(&self, program_id: ProgramId) -> Result<Option<CapacityPolicy>, StorageError> {
        Ok(locked(&self.state).capacity.get(&program_id).cloned())
    }
}

/// In-memory [`EligibilityPolicyStore`].
#[derive(Default)]
pub struct InMemoryEligibilityPolicyStore {
    policies: Mutex<HashMap<ProgramId, EligibilityPolicy>>,
}

impl InMemoryEligibilityPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EligibilityPolicyStore for InMemoryEligibilityPolicyStore {
    async fn upsert(&self, policy: EligibilityPolicy) -> Result<(), PolicyError> {
        policy.validate().map_err(PolicyError::Validation)?;
        locked(&self.policies).insert(policy.program_id, policy);
        Ok(())
    }

    async fn get(&self, program_id: ProgramId) -> Result<Option<EligibilityPolicy>, StorageError> {
        Ok(locked(&self.policies).get(&program_id).cloned())
    }
}

/// In-memory [`ConsentStore`]; rows are kept after withdrawal like the real
/// store keeps them.
#[derive(Default)]
pub struct InMemoryConsentStore {
    records: Mutex<HashMap<ConsentId, ConsentRecord>>,
}

impl InMemoryConsentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, withdrawn ones included, for audit assertions.
    #[must_use]
    pub fn all_records(&self) -> Vec<ConsentRecord> {
        locked(&self.records).values().cloned().collect()
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn grant(
        &self,
        grantor_id: GuardianId,
        participant_id: ParticipantId,
        consent_type: ConsentType,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, ConsentError> {
        let mut records = locked(&self.records);
        let already_active = records.values().any(|r| {
            r.participant_id == participant_id && r.consent_type == consent_type && r.is_active()
        });
        if already_active {
            return Err(ConsentError::AlreadyActive);
        }

        let record = ConsentRecord {
            id: ConsentId::new(),
            grantor_id,
            participant_id,
            consent_type,
            granted_at: at,
            withdrawn_at: None,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn withdraw(
        &self,
        consent_id: ConsentId,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, ConsentError> {
        let mut records = locked(&self.records);
        let record = records.get_mut(&consent_id).ok_or(ConsentError::NotFound)?;
        if record.withdrawn_at.is_none() {
            record.withdrawn_at = Some(at);
        }
        Ok(record.clone())
    }

    async fn is_active(
        &self,
        participant_id: ParticipantId,
        consent_type: ConsentType,
    ) -> Result<bool, StorageError> {
        Ok(locked(&self.records).values().any(|r| {
            r.participant_id == participant_id && r.consent_type == consent_type && r.is_active()
        }))
    }
}

/// Static [`ParticipantDirectory`] seeded with attribute fixtures.
#[derive(Default)]
pub struct StaticDirectory {
    participants: Mutex<HashMap<ParticipantId, (ParticipantAttributes, String)>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a participant's attributes and display name.
    pub fn insert(
        &self,
        participant_id: ParticipantId,
        attributes: ParticipantAttributes,
        display_name: &str,
    ) {
        locked(&self.participants)
            .insert(participant_id, (attributes, display_name.to_string()));
    }
}

#[async_trait]
impl ParticipantDirectory for StaticDirectory {
    async fn resolve_attributes(
        &self,
        participant_id: ParticipantId,
    ) -> Result<ParticipantAttributes, AclError> {
        locked(&self.participants)
            .get(&participant_id)
            .map(|(attributes, _)| attributes.clone())
            .ok_or(AclError::NotFound)
    }

    async fn resolve_display_name(
        &self,
        participant_id: ParticipantId,
    ) -> Result<String, AclError> {
        locked(&self.participants)
            .get(&participant_id)
            .map(|(_, name)| name.clone())
            .ok_or(AclError::NotFound)
    }
}

/// Static [`ProgramCatalog`] seeded with start dates.
#[derive(Default)]
pub struct StaticCatalog {
    start_dates: Mutex<HashMap<ProgramId, Option<NaiveDate>>>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a program's start date (`None` for "exists but unscheduled").
    pub fn insert(&self, program_id: ProgramId, start_date: Option<NaiveDate>) {
        locked(&self.start_dates).insert(program_id, start_date);
    }
}

#[async_trait]
impl ProgramCatalog for StaticCatalog {
    async fn resolve_start_date(
        &self,
        program_id: ProgramId,
    ) -> Result<Option<NaiveDate>, AclError> {
        locked(&self.start_dates)
            .get(&program_id)
            .copied()
            .ok_or(AclError::NotFound)
    }
}

/// Captures published integration events; optionally fails every publish.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<IntegrationEvent>>,
    fail_with: Option<String>,
}

impl RecordingPublisher {
    /// A publisher that accepts and records everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every publish fails with the given message.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    /// Events recorded so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<IntegrationEvent> {
        locked(&self.published).clone()
    }
}

#[async_trait]
impl IntegrationEventPublisher for RecordingPublisher {
    async fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError> {
        if let Some(message) = &self.fail_with {
            return Err(PublishError::Transport(message.clone()));
        }
        locked(&self.published).push(event.clone());
        Ok(())
    }
}

//! Storage ports consumed by the enrollment core.
//!
//! Implementations own the transactional guarantees: the postgres crate
//! backs these with row locks and partial unique indexes, the testing crate
//! with a mutex over in-memory maps. The core only depends on the contracts
//! spelled out here.

use crate::error::{ConsentError, LifecycleError, PolicyError, ReserveError, StorageError};
use crate::types::{
    CapacityPolicy, ConsentId, ConsentRecord, ConsentType, EligibilityPolicy, Enrollment,
    EnrollmentId, GuardianId, ParticipantId, ProgramId, Remaining,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The capacity-gated reservation transaction and enrollment lifecycle.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Atomically reserve a seat: lock the program's capacity row, count
    /// active enrollments, and insert a pending enrollment only while the
    /// count is below the configured maximum.
    ///
    /// The lock-count-insert ordering inside one storage transaction is the
    /// correctness-critical invariant; without it two concurrent requests
    /// can both observe one free seat and oversell. Locks are scoped per
    /// program, never global, and the lock wait is bounded.
    ///
    /// # Errors
    ///
    /// [`ReserveError::Full`] at capacity, [`ReserveError::Duplicate`] when
    /// the participant already holds an active enrollment,
    /// [`ReserveError::Busy`] on lock-wait timeout, [`ReserveError::Storage`]
    /// on connectivity faults. In every error case nothing was written.
    async fn reserve(
        &self,
        program_id: ProgramId,
        participant_id: ParticipantId,
        requested_by: GuardianId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ReserveError>;

    /// Transition a pending enrollment to confirmed.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::InvalidTransition`].
    async fn confirm(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, LifecycleError>;

    /// Transition a confirmed enrollment to completed.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::InvalidTransition`].
    async fn complete(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, LifecycleError>;

    /// Cancel an active enrollment, recording the reason. Frees the seat:
    /// cancelled enrollments count against neither capacity nor the
    /// duplicate invariant.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] or [`LifecycleError::InvalidTransition`].
    async fn cancel(
        &self,
        enrollment_id: EnrollmentId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, LifecycleError>;

    /// Seats still available in one program: `maximum − active_count` when a
    /// maximum is configured, unlimited otherwise.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    async fn remaining_capacity(&self, program_id: ProgramId) -> Result<Remaining, StorageError>;

    /// Batched form of [`Self::remaining_capacity`] for listings: one round
    /// trip for all requested programs, never one query per program.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    async fn remaining_capacity_for(
        &self,
        program_ids: &[ProgramId],
    ) -> Result<HashMap<ProgramId, Remaining>, StorageError>;
}

/// Per-program occupancy configuration, upsert-keyed on the program.
#[async_trait]
pub trait CapacityPolicyStore: Send + Sync {
    /// Create or replace the program's capacity policy.
    ///
    /// # Errors
    ///
    /// [`PolicyError::Validation`] when the policy violates its invariants.
    async fn upsert(&self, policy: CapacityPolicy) -> Result<(), PolicyError>;

    /// Fetch the program's capacity policy, if one is stored.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    async fn get(&self, program_id: ProgramId) -> Result<Option<CapacityPolicy>, StorageError>;
}

/// Per-program admission predicates, upsert-keyed on the program.
#[async_trait]
pub trait EligibilityPolicyStore: Send + Sync {
    /// Create or replace the program's eligibility policy.
    ///
    /// # Errors
    ///
    /// [`PolicyError::Validation`] when the policy violates its invariants.
    async fn upsert(&self, policy: EligibilityPolicy) -> Result<(), PolicyError>;

    /// Fetch the program's eligibility policy, if one is stored.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    async fn get(&self, program_id: ProgramId) -> Result<Option<EligibilityPolicy>, StorageError>;
}

/// Consent records: grant, withdraw, and the activity query behind the gate.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Record a new consent grant. At most one active consent may exist per
    /// (participant, type); the store enforces this, not the caller.
    ///
    /// # Errors
    ///
    /// [`ConsentError::AlreadyActive`] when an active grant of this type
    /// already exists for the participant.
    async fn grant(
        &self,
        grantor_id: GuardianId,
        participant_id: ParticipantId,
        consent_type: ConsentType,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, ConsentError>;

    /// Withdraw a consent by setting `withdrawn_at`. The row is kept for
    /// audit. Withdrawing an already-withdrawn consent is a no-op returning
    /// the record as stored.
    ///
    /// # Errors
    ///
    /// [`ConsentError::NotFound`] when no record has this identifier.
    async fn withdraw(
        &self,
        consent_id: ConsentId,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, ConsentError>;

    /// Whether an active consent of this type exists for the participant.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    async fn is_active(
        &self,
        participant_id: ParticipantId,
        consent_type: ConsentType,
    ) -> Result<bool, StorageError>;
}

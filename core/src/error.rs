//! Error taxonomy for the enrollment core.
//!
//! Business outcomes (full program, duplicate enrollment, ineligibility,
//! active consent already present) are ordinary `Err` values the immediate
//! caller renders to the user. Storage connectivity faults ride the
//! `Storage` passthrough variants up to the supervising runtime; nothing in
//! this crate swallows them.

use crate::eligibility::IneligibilityReason;
use crate::types::EnrollmentStatus;
use thiserror::Error;

/// A plain storage fault, carried verbatim from the backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Outcome of a failed reservation attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReserveError {
    /// The program's configured maximum occupancy is reached.
    #[error("program is full")]
    Full,

    /// An active enrollment already exists for this (program, participant).
    #[error("participant already has an active enrollment in this program")]
    Duplicate,

    /// The participant fails one or more admission predicates.
    /// Every violated predicate is listed, not just the first.
    #[error("participant is not eligible: {0:?}")]
    Ineligible(Vec<IneligibilityReason>),

    /// The program or participant does not exist.
    #[error("not found")]
    NotFound,

    /// The capacity row lock could not be acquired within the bounded wait.
    /// Transient; callers should retry with backoff.
    #[error("capacity lock wait timed out")]
    Busy,

    /// Storage connectivity fault; propagated, not handled here.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure to store a capacity or eligibility policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The policy violates its own invariants (e.g., minimum > maximum).
    #[error("invalid policy: {0}")]
    Validation(String),

    /// Storage connectivity fault.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure while resolving eligibility inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    /// The identity area has no record of this participant.
    #[error("unknown participant")]
    UnknownParticipant,

    /// The catalog area has no record of this program.
    #[error("unknown program")]
    UnknownProgram,

    /// Storage or boundary connectivity fault.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of a consent mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsentError {
    /// An active consent of this type already exists for the participant.
    /// Withdraw it first; grants never stack.
    #[error("an active consent of this type already exists")]
    AlreadyActive,

    /// No consent record with the given identifier.
    #[error("consent record not found")]
    NotFound,

    /// Storage connectivity fault.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An illegal enrollment lifecycle transition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot transition enrollment from {from} to {to}")]
pub struct InvalidTransition {
    /// Status before the attempted transition.
    pub from: EnrollmentStatus,
    /// Status the caller asked for.
    pub to: EnrollmentStatus,
}

/// Failure of an enrollment lifecycle mutation (confirm, complete, cancel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No enrollment with the given identifier.
    #[error("enrollment not found")]
    NotFound,

    /// The requested transition is not legal from the current status.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Storage connectivity fault.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A single domain event handler failure, as reported by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Name of the handler that failed.
    pub handler: &'static str,
    /// What went wrong, in the handler's own words.
    pub message: String,
}

/// Aggregated handler failures from one dispatch.
///
/// The bus never stops early: every registered handler ran, and this lists
/// exactly the ones that failed. The triggering transaction has already
/// committed, so callers log and move on; they never retry dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} of {total} handlers failed", failures.len())]
pub struct DispatchError {
    /// The handlers that failed, in registration order.
    pub failures: Vec<HandlerFailure>,
    /// How many handlers were invoked in total.
    pub total: usize,
}

/// An error raised by a single domain event handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    /// What went wrong.
    pub message: String,
}

impl HandlerError {
    /// Build a handler error from anything displayable.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to publish an integration event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The transport rejected or lost the event.
    #[error("publish failed: {0}")]
    Transport(String),

    /// The event could not be serialized for the wire.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The payload contains non-primitive values; integration payloads must
    /// stay flat to preserve area-boundary isolation.
    #[error("integration payload values must be primitives, found {0}")]
    NonPrimitivePayload(String),
}

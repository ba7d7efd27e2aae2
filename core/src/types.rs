//! Domain types for the enrollment core.
//!
//! This module contains the identifiers, value objects, and entities shared by
//! every component: capacity and eligibility policies, the enrollment record
//! itself, consent records, and the business-area tag used by the event bus.
//!
//! Lifecycle status is a closed sum type rather than a validated string, so
//! illegal states are unrepresentable and transition logic is checked
//! exhaustively by the compiler.

use crate::error::InvalidTransition;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a program (the capacity-gated resource).
    ProgramId
);
uuid_id!(
    /// Unique identifier for a participant (the subject being enrolled).
    ParticipantId
);
uuid_id!(
    /// Unique identifier for the guardian or member who requested the enrollment.
    GuardianId
);
uuid_id!(
    /// Unique identifier for an enrollment.
    EnrollmentId
);
uuid_id!(
    /// Unique identifier for a consent record.
    ConsentId
);

/// An independently-evolving business area.
///
/// Areas communicate only through the domain event bus (within an area) and
/// integration events (across areas); they never share internal types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Area {
    /// Capacity-gated enrollment of participants into programs.
    Enrollment,
    /// Program catalog and session scheduling.
    Scheduling,
    /// Threads and notifications between members and staff.
    Messaging,
    /// Member, guardian, and participant profiles.
    Identity,
}

impl Area {
    /// Stable string form, used in topic names and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollment => "enrollment",
            Self::Scheduling => "scheduling",
            Self::Messaging => "messaging",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an enrollment.
///
/// `Pending` and `Confirmed` are the *active* statuses: they occupy a seat
/// and participate in the one-active-enrollment-per-(program, participant)
/// invariant. `Completed` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    /// Reserved, awaiting confirmation.
    Pending,
    /// Confirmed by staff; still occupies a seat.
    Confirmed,
    /// The program ran and the participant attended.
    Completed,
    /// Withdrawn before completion.
    Cancelled,
}

impl EnrollmentStatus {
    /// Whether this status counts against capacity and the duplicate invariant.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Stable database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a status from its stable string form.
    ///
    /// # Errors
    ///
    /// Returns the offending string if it names no known status.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(other.to_string()),
        }
    }

    /// Attempt a lifecycle transition.
    ///
    /// Legal transitions: pending → confirmed | cancelled,
    /// confirmed → completed | cancelled. Terminal statuses reject everything.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any other pair.
    pub const fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        match (self, to) {
            (Self::Pending, Self::Confirmed | Self::Cancelled)
            | (Self::Confirmed, Self::Completed | Self::Cancelled) => Ok(to),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reserved seat in a program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// Unique identifier.
    pub id: EnrollmentId,
    /// The program the seat belongs to.
    pub program_id: ProgramId,
    /// The participant occupying the seat.
    pub participant_id: ParticipantId,
    /// Who requested the enrollment.
    pub requested_by: GuardianId,
    /// Current lifecycle status.
    pub status: EnrollmentStatus,
    /// When the reservation was created.
    pub created_at: DateTime<Utc>,
    /// Why the enrollment was cancelled, when it was.
    pub cancellation_reason: Option<String>,
}

/// Per-program occupancy configuration.
///
/// At most one policy exists per program (upsert semantics). A program
/// without a policy row, or with `maximum` unset, has unlimited capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    /// The program this policy applies to.
    pub program_id: ProgramId,
    /// Minimum viable occupancy, if any. Informational for planning; not
    /// enforced at reservation time.
    pub minimum: Option<u32>,
    /// Maximum occupancy, if any. Enforced by the reservation transaction.
    pub maximum: Option<u32>,
}

impl CapacityPolicy {
    /// Validate the policy invariants: bounds are ≥ 1 and minimum ≤ maximum
    /// when both are present.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.minimum == Some(0) || self.maximum == Some(0) {
            return Err("occupancy bounds must be at least 1".to_string());
        }
        if let (Some(min), Some(max)) = (self.minimum, self.maximum) {
            if min > max {
                return Err(format!("minimum {min} exceeds maximum {max}"));
            }
        }
        Ok(())
    }
}

/// Seats still available in a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Remaining {
    /// A configured maximum exists; this many seats are left.
    Seats(u32),
    /// No maximum is configured.
    Unlimited,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seats(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Which moment a participant's attributes are evaluated at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationReference {
    /// Evaluate at the moment the reservation is requested.
    AtRequestTime,
    /// Evaluate at the program's scheduled start date.
    AtProgramStart,
}

impl EvaluationReference {
    /// Stable database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AtRequestTime => "at_request_time",
            Self::AtProgramStart => "at_program_start",
        }
    }

    /// Parse from the stable string form.
    ///
    /// # Errors
    ///
    /// Returns the offending string if it names no known reference.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "at_request_time" => Ok(Self::AtRequestTime),
            "at_program_start" => Ok(Self::AtProgramStart),
            other => Err(other.to_string()),
        }
    }
}

/// Per-program admission predicates.
///
/// Every predicate field is optional; an absent field means "no constraint
/// on that dimension". A program without a policy admits everyone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    /// The program this policy gates.
    pub program_id: ProgramId,
    /// When the participant's attributes are measured.
    pub evaluation_reference: EvaluationReference,
    /// Minimum age in months, inclusive.
    pub min_age_months: Option<u32>,
    /// Maximum age in months, inclusive.
    pub max_age_months: Option<u32>,
    /// Categories admitted to the program. `None` admits every category.
    pub allowed_categories: Option<BTreeSet<String>>,
    /// Minimum rank (e.g., school grade), inclusive.
    pub min_rank: Option<i32>,
    /// Maximum rank, inclusive.
    pub max_rank: Option<i32>,
}

impl EligibilityPolicy {
    /// An unrestricted policy for the given program; useful as an upsert base.
    #[must_use]
    pub const fn unrestricted(program_id: ProgramId) -> Self {
        Self {
            program_id,
            evaluation_reference: EvaluationReference::AtRequestTime,
            min_age_months: None,
            max_age_months: None,
            allowed_categories: None,
            min_rank: None,
            max_rank: None,
        }
    }

    /// Validate window invariants (min ≤ max where both are present).
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_age_months, self.max_age_months) {
            if min > max {
                return Err(format!("min_age_months {min} exceeds max_age_months {max}"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_rank, self.max_rank) {
            if min > max {
                return Err(format!("min_rank {min} exceeds max_rank {max}"));
            }
        }
        if let Some(categories) = &self.allowed_categories {
            if categories.is_empty() {
                return Err("allowed_categories must not be empty when present".to_string());
            }
        }
        Ok(())
    }
}

/// The kinds of sensitive data a guardian can consent to sharing across areas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentType {
    /// Emergency contact details.
    EmergencyContact,
    /// Medical notes and allergies.
    MedicalNotes,
    /// Photographs taken during sessions.
    PhotoRelease,
    /// Sharing contact details with other members.
    ContactSharing,
}

impl ConsentType {
    /// Stable database/string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyContact => "emergency_contact",
            Self::MedicalNotes => "medical_notes",
            Self::PhotoRelease => "photo_release",
            Self::ContactSharing => "contact_sharing",
        }
    }

    /// Parse from the stable string form.
    ///
    /// # Errors
    ///
    /// Returns the offending string if it names no known consent type.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "emergency_contact" => Ok(Self::EmergencyContact),
            "medical_notes" => Ok(Self::MedicalNotes),
            "photo_release" => Ok(Self::PhotoRelease),
            "contact_sharing" => Ok(Self::ContactSharing),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ConsentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grant of consent by a guardian on behalf of a participant.
///
/// Rows are never deleted: withdrawal sets `withdrawn_at` so the grant
/// remains auditable. A record is *active* while `withdrawn_at` is `None`,
/// and at most one active record exists per (participant, type).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Unique identifier.
    pub id: ConsentId,
    /// The guardian who granted consent.
    pub grantor_id: GuardianId,
    /// The participant the consent covers.
    pub participant_id: ParticipantId,
    /// What is being consented to.
    pub consent_type: ConsentType,
    /// When consent was granted.
    pub granted_at: DateTime<Utc>,
    /// When consent was withdrawn, if it was.
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl ConsentRecord {
    /// Whether this consent is currently in force.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.withdrawn_at.is_none()
    }
}

/// A participant's protected attributes, as translated through the identity
/// area's anti-corruption boundary.
///
/// Deliberately a flat value object: none of the identity area's internal
/// representation leaks through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAttributes {
    /// Date of birth used for age-in-months computations.
    pub age_reference_date: NaiveDate,
    /// Membership category (e.g., "junior", "senior").
    pub category: String,
    /// Rank or grade level.
    pub rank: i32,
}

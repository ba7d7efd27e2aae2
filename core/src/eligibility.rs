//! Policy-based eligibility evaluation.
//!
//! A program without a stored [`EligibilityPolicy`] admits everyone. With a
//! policy, every configured predicate is evaluated independently against the
//! participant's attributes at the policy's reference time, and *all*
//! violations are accumulated so callers can show a user every reason they
//! are ineligible in one pass.

use crate::acl::{AclError, ParticipantDirectory, ProgramCatalog};
use crate::environment::Clock;
use crate::error::EligibilityError;
use crate::store::EligibilityPolicyStore;
use crate::types::{
    EligibilityPolicy, EvaluationReference, ParticipantAttributes, ParticipantId, ProgramId,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single violated admission predicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IneligibilityReason {
    /// Participant is younger than the configured minimum.
    AgeTooLow {
        /// Configured minimum age in months.
        min_months: u32,
        /// Participant's age in months at the reference time.
        actual_months: u32,
    },
    /// Participant is older than the configured maximum.
    AgeTooHigh {
        /// Configured maximum age in months.
        max_months: u32,
        /// Participant's age in months at the reference time.
        actual_months: u32,
    },
    /// Participant's category is not in the allowed set.
    CategoryNotAllowed {
        /// The participant's category.
        category: String,
    },
    /// Participant's rank is below the configured minimum.
    RankTooLow {
        /// Configured minimum rank.
        min_rank: i32,
        /// The participant's rank.
        actual_rank: i32,
    },
    /// Participant's rank is above the configured maximum.
    RankTooHigh {
        /// Configured maximum rank.
        max_rank: i32,
        /// The participant's rank.
        actual_rank: i32,
    },
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AgeTooLow {
                min_months,
                actual_months,
            } => write!(f, "age too low ({actual_months} months, minimum {min_months})"),
            Self::AgeTooHigh {
                max_months,
                actual_months,
            } => write!(f, "age too high ({actual_months} months, maximum {max_months})"),
            Self::CategoryNotAllowed { category } => {
                write!(f, "category \"{category}\" not allowed")
            }
            Self::RankTooLow {
                min_rank,
                actual_rank,
            } => write!(f, "rank too low ({actual_rank}, minimum {min_rank})"),
            Self::RankTooHigh {
                max_rank,
                actual_rank,
            } => write!(f, "rank too high ({actual_rank}, maximum {max_rank})"),
        }
    }
}

/// Result of an eligibility check. Total: every check produces one of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityOutcome {
    /// The participant may proceed to reserve a seat.
    Eligible,
    /// The participant may not; every violated predicate is listed.
    Ineligible(Vec<IneligibilityReason>),
}

impl EligibilityOutcome {
    /// Whether the participant may proceed.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Completed months between `born` and `at`. Saturates at zero when `at`
/// precedes `born`.
#[must_use]
pub fn age_in_months(born: NaiveDate, at: NaiveDate) -> u32 {
    let years = i64::from(at.year()) - i64::from(born.year());
    let months = i64::from(at.month()) - i64::from(born.month());
    let mut total = years * 12 + months;
    if at.day() < born.day() {
        total -= 1;
    }
    u32::try_from(total).unwrap_or(0)
}

/// Evaluate every configured predicate, accumulating all violations.
/// No short-circuiting: a participant failing age and category gets both
/// reasons.
#[must_use]
pub fn evaluate(
    policy: &EligibilityPolicy,
    attributes: &ParticipantAttributes,
    reference_date: NaiveDate,
) -> Vec<IneligibilityReason> {
    let mut reasons = Vec::new();
    let actual_months = age_in_months(attributes.age_reference_date, reference_date);

    if let Some(min_months) = policy.min_age_months {
        if actual_months < min_months {
            reasons.push(IneligibilityReason::AgeTooLow {
                min_months,
                actual_months,
            });
        }
    }
    if let Some(max_months) = policy.max_age_months {
        if actual_months > max_months {
            reasons.push(IneligibilityReason::AgeTooHigh {
                max_months,
                actual_months,
            });
        }
    }
    if let Some(allowed) = &policy.allowed_categories {
        if !allowed.contains(&attributes.category) {
            reasons.push(IneligibilityReason::CategoryNotAllowed {
                category: attributes.category.clone(),
            });
        }
    }
    if let Some(min_rank) = policy.min_rank {
        if attributes.rank < min_rank {
            reasons.push(IneligibilityReason::RankTooLow {
                min_rank,
                actual_rank: attributes.rank,
            });
        }
    }
    if let Some(max_rank) = policy.max_rank {
        if attributes.rank > max_rank {
            reasons.push(IneligibilityReason::RankTooHigh {
                max_rank,
                actual_rank: attributes.rank,
            });
        }
    }

    reasons
}

/// Resolves a participant's attributes through the anti-corruption boundary
/// and evaluates them against the program's stored policy.
pub struct EligibilityEvaluator {
    policies: Arc<dyn EligibilityPolicyStore>,
    directory: Arc<dyn ParticipantDirectory>,
    catalog: Arc<dyn ProgramCatalog>,
    clock: Arc<dyn Clock>,
}

impl EligibilityEvaluator {
    /// Wire the evaluator to its policy store, boundary ports, and clock.
    #[must_use]
    pub fn new(
        policies: Arc<dyn EligibilityPolicyStore>,
        directory: Arc<dyn ParticipantDirectory>,
        catalog: Arc<dyn ProgramCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policies,
            directory,
            catalog,
            clock,
        }
    }

    /// Check whether a participant may enroll in a program.
    ///
    /// No stored policy means unconditionally eligible; the participant's
    /// attributes are not even resolved in that case.
    ///
    /// # Errors
    ///
    /// [`EligibilityError::UnknownParticipant`] /
    /// [`EligibilityError::UnknownProgram`] when a boundary lookup finds
    /// nothing; [`EligibilityError::Storage`] on connectivity faults.
    pub async fn check(
        &self,
        program_id: ProgramId,
        participant_id: ParticipantId,
    ) -> Result<EligibilityOutcome, EligibilityError> {
        let Some(policy) = self.policies.get(program_id).await? else {
            return Ok(EligibilityOutcome::Eligible);
        };

        let attributes = self
            .directory
            .resolve_attributes(participant_id)
            .await
            .map_err(|err| match err {
                AclError::NotFound => EligibilityError::UnknownParticipant,
                AclError::Unavailable(fault) => EligibilityError::Storage(fault),
            })?;

        let reference_date = self.reference_date(&policy).await?;
        let reasons = evaluate(&policy, &attributes, reference_date);

        if reasons.is_empty() {
            Ok(EligibilityOutcome::Eligible)
        } else {
            tracing::debug!(
                program_id = %program_id,
                participant_id = %participant_id,
                reasons = reasons.len(),
                "participant ineligible"
            );
            Ok(EligibilityOutcome::Ineligible(reasons))
        }
    }

    /// Resolve the moment the policy measures attributes at. A program with
    /// no scheduled start date yet falls back to the request time.
    async fn reference_date(
        &self,
        policy: &EligibilityPolicy,
    ) -> Result<NaiveDate, EligibilityError> {
        match policy.evaluation_reference {
            EvaluationReference::AtRequestTime => Ok(self.clock.now().date_naive()),
            EvaluationReference::AtProgramStart => {
                let start = self
                    .catalog
                    .resolve_start_date(policy.program_id)
                    .await
                    .map_err(|err| match err {
                        AclError::NotFound => EligibilityError::UnknownProgram,
                        AclError::Unavailable(fault) => EligibilityError::Storage(fault),
                    })?;
                Ok(start.unwrap_or_else(|| self.clock.now().date_naive()))
            }
        }
    }
}

//! `PostgreSQL` stores for capacity and eligibility policies.
//!
//! Both are upsert-keyed on the program: at most one policy row per program,
//! `ON CONFLICT ... DO UPDATE` replacing the previous configuration.

use crate::error::storage;
use async_trait::async_trait;
use rollcall_core::error::{PolicyError, StorageError};
use rollcall_core::store::{CapacityPolicyStore, EligibilityPolicyStore};
use rollcall_core::types::{
    CapacityPolicy, EligibilityPolicy, EvaluationReference, ProgramId,
};
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;

/// `PostgreSQL` implementation of [`CapacityPolicyStore`].
pub struct PgCapacityPolicyStore {
    pool: PgPool,
}

impl PgCapacityPolicyStore {
    /// Create a store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CapacityPolicyStore for PgCapacityPolicyStore {
    async fn upsert(&self, policy: CapacityPolicy) -> Result<(), PolicyError> {
        policy.validate().map_err(PolicyError::Validation)?;

        sqlx::query(
            r"
            INSERT INTO capacity_policies (program_id, minimum, maximum)
            VALUES ($1, $2, $3)
            ON CONFLICT (program_id)
            DO UPDATE SET minimum = EXCLUDED.minimum, maximum = EXCLUDED.maximum
            ",
        )
        .bind(policy.program_id.as_uuid())
        .bind(policy.minimum.map(int_bound))
        .bind(policy.maximum.map(int_bound))
        .execute(&self.pool)
        .await
        .map_err(|err| PolicyError::Storage(storage(err)))?;

        tracing::info!(program_id = %policy.program_id, "capacity policy upserted");
        Ok(())
    }

    async fn get(&self, program_id: ProgramId) -> Result<Option<CapacityPolicy>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT minimum, maximum
            FROM capacity_policies
            WHERE program_id = $1
            ",
        )
        .bind(program_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(|row| CapacityPolicy {
            program_id,
            minimum: uint_bound(row.get("minimum")),
            maximum: uint_bound(row.get("maximum")),
        }))
    }
}

/// `PostgreSQL` implementation of [`EligibilityPolicyStore`].
pub struct PgEligibilityPolicyStore {
    pool: PgPool,
}

impl PgEligibilityPolicyStore {
    /// Create a store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EligibilityPolicyStore for PgEligibilityPolicyStore {
    async fn upsert(&self, policy: EligibilityPolicy) -> Result<(), PolicyError> {
        policy.validate().map_err(PolicyError::Validation)?;

        let categories: Option<Vec<String>> = policy
            .allowed_categories
            .as_ref()
            .map(|set| set.iter().cloned().collect());

        sqlx::query(
            r"
            INSERT INTO eligibility_policies
                (program_id, evaluation_reference, min_age_months, max_age_months,
                 allowed_categories, min_rank, max_rank)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (program_id)
            DO UPDATE SET
                evaluation_reference = EXCLUDED.evaluation_reference,
                min_age_months = EXCLUDED.min_age_months,
                max_age_months = EXCLUDED.max_age_months,
                allowed_categories = EXCLUDED.allowed_categories,
                min_rank = EXCLUDED.min_rank,
                max_rank = EXCLUDED.max_rank
            ",
        )
        .bind(policy.program_id.as_uuid())
        .bind(policy.evaluation_reference.as_str())
        .bind(policy.min_age_months.map(int_bound))
        .bind(policy.max_age_months.map(int_bound))
        .bind(categories)
        .bind(policy.min_rank)
        .bind(policy.max_rank)
        .execute(&self.pool)
        .await
        .map_err(|err| PolicyError::Storage(storage(err)))?;

        tracing::info!(program_id = %policy.program_id, "eligibility policy upserted");
        Ok(())
    }

    async fn get(&self, program_id: ProgramId) -> Result<Option<EligibilityPolicy>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT evaluation_reference, min_age_months, max_age_months,
                   allowed_categories, min_rank, max_rank
            FROM eligibility_policies
            WHERE program_id = $1
            ",
        )
        .bind(program_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(|row| {
            let reference_str: String = row.get("evaluation_reference");
            let evaluation_reference = EvaluationReference::parse(&reference_str)
                .map_err(|bad| StorageError(format!("invalid evaluation reference: {bad}")))?;
            let categories: Option<Vec<String>> = row.get("allowed_categories");

            Ok(EligibilityPolicy {
                program_id,
                evaluation_reference,
                min_age_months: uint_bound(row.get("min_age_months")),
                max_age_months: uint_bound(row.get("max_age_months")),
                allowed_categories: categories.map(|list| list.into_iter().collect::<BTreeSet<_>>()),
                min_rank: row.get("min_rank"),
                max_rank: row.get("max_rank"),
            })
        })
        .transpose()
    }
}

/// Bounds are validated non-negative and small; stored as plain INTEGER.
#[allow(clippy::cast_possible_wrap)]
const fn int_bound(value: u32) -> i32 {
    value as i32
}

fn uint_bound(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

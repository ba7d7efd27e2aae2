//! `PostgreSQL`-backed reservation transaction and enrollment lifecycle.
//!
//! The reservation is the correctness-critical path: inside one transaction
//! it locks the program's capacity row, counts active enrollments, and only
//! then inserts. Holding the row lock across the count and the insert is
//! what prevents two concurrent requests from both observing one free seat
//! and overselling by one. The lock is per program — contention on program A
//! never serializes reservations on program B — and the wait is bounded by
//! `lock_timeout`, surfacing as a transient busy error.
//!
//! The duplicate invariant (one active enrollment per program/participant)
//! is not locked for; the partial unique index enforces it and a violation
//! is an expected, recoverable outcome.

use crate::error::{map_lifecycle_error, map_reserve_error, storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::error::{LifecycleError, ReserveError, StorageError};
use rollcall_core::store::EnrollmentStore;
use rollcall_core::types::{
    Enrollment, EnrollmentId, EnrollmentStatus, GuardianId, ParticipantId, ProgramId, Remaining,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// `PostgreSQL` implementation of [`EnrollmentStore`].
pub struct PgEnrollmentStore {
    pool: PgPool,
    lock_timeout_ms: u32,
}

impl PgEnrollmentStore {
    /// Create a store over the given pool with a bounded capacity-lock wait.
    #[must_use]
    pub const fn new(pool: PgPool, lock_timeout_ms: u32) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    /// Lock the capacity row for a program, creating the default unlimited
    /// anchor row first so every program has something to lock.
    async fn lock_capacity_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        program_id: ProgramId,
    ) -> Result<Option<i32>, ReserveError> {
        // lock_timeout takes no bind parameter; the value is a validated u32.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut **tx)
            .await
            .map_err(map_reserve_error)?;

        sqlx::query(
            r"
            INSERT INTO capacity_policies (program_id)
            VALUES ($1)
            ON CONFLICT (program_id) DO NOTHING
            ",
        )
        .bind(program_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(map_reserve_error)?;

        let row = sqlx::query(
            r"
            SELECT maximum
            FROM capacity_policies
            WHERE program_id = $1
            FOR UPDATE
            ",
        )
        .bind(program_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(map_reserve_error)?;

        Ok(row.get("maximum"))
    }

    async fn has_active_enrollment(
        tx: &mut Transaction<'_, Postgres>,
        program_id: ProgramId,
        participant_id: ParticipantId,
    ) -> Result<bool, ReserveError> {
        let (exists,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM enrollments
                WHERE program_id = $1
                  AND participant_id = $2
                  AND status IN ('pending', 'confirmed')
            )
            ",
        )
        .bind(program_id.as_uuid())
        .bind(participant_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(map_reserve_error)?;
        Ok(exists)
    }

    async fn count_active(
        tx: &mut Transaction<'_, Postgres>,
        program_id: ProgramId,
    ) -> Result<i64, ReserveError> {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM enrollments
            WHERE program_id = $1
              AND status IN ('pending', 'confirmed')
            ",
        )
        .bind(program_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(map_reserve_error)?;
        Ok(count)
    }

    async fn load_for_update(
        tx: &mut Transaction<'_, Postgres>,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, LifecycleError> {
        let row = sqlx::query(
            r"
            SELECT id, program_id, participant_id, requested_by, status,
                   created_at, cancellation_reason
            FROM enrollments
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(enrollment_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_lifecycle_error)?
        .ok_or(LifecycleError::NotFound)?;

        row_to_enrollment(&row).map_err(LifecycleError::Storage)
    }

    /// Shared body for confirm/complete/cancel: load under lock, run the
    /// exhaustive-checked transition, persist the new status.
    async fn transition(
        &self,
        enrollment_id: EnrollmentId,
        to: EnrollmentStatus,
        cancellation_reason: Option<&str>,
    ) -> Result<Enrollment, LifecycleError> {
        let mut tx = self.pool.begin().await.map_err(map_lifecycle_error)?;

        let mut enrollment = Self::load_for_update(&mut tx, enrollment_id).await?;
        enrollment.status = enrollment.status.transition(to)?;
        enrollment.cancellation_reason = cancellation_reason.map(ToString::to_string);

        sqlx::query(
            r"
            UPDATE enrollments
            SET status = $2, cancellation_reason = $3
            WHERE id = $1
            ",
        )
        .bind(enrollment_id.as_uuid())
        .bind(enrollment.status.as_str())
        .bind(&enrollment.cancellation_reason)
        .execute(&mut *tx)
        .await
        .map_err(map_lifecycle_error)?;

        tx.commit().await.map_err(map_lifecycle_error)?;

        tracing::info!(
            enrollment_id = %enrollment_id,
            status = enrollment.status.as_str(),
            "enrollment transitioned"
        );
        Ok(enrollment)
    }
}

#[async_trait]
impl EnrollmentStore for PgEnrollmentStore {
    async fn reserve(
        &self,
        program_id: ProgramId,
        participant_id: ParticipantId,
        requested_by: GuardianId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ReserveError> {
        let mut tx = self.pool.begin().await.map_err(map_reserve_error)?;

        let maximum = self.lock_capacity_row(&mut tx, program_id).await?;

        // Duplicate before capacity: a participant who already holds the
        // program's last seat must hear "already booked", not "full". The
        // partial unique index stays as the backstop for concurrent
        // same-participant races.
        if Self::has_active_enrollment(&mut tx, program_id, participant_id).await? {
            let _ = tx.rollback().await;
            metrics::counter!("enrollment.reserve.rejected", "reason" => "duplicate")
                .increment(1);
            return Err(ReserveError::Duplicate);
        }

        let active = Self::count_active(&mut tx, program_id).await?;

        if let Some(maximum) = maximum {
            if active >= i64::from(maximum) {
                // Nothing written yet; release the lock without a commit.
                let _ = tx.rollback().await;
                metrics::counter!("enrollment.reserve.rejected", "reason" => "full").increment(1);
                tracing::info!(
                    program_id = %program_id,
                    participant_id = %participant_id,
                    maximum,
                    "reservation rejected, program full"
                );
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

        let inserted = sqlx::query(
            r"
            INSERT INTO enrollments
                (id, program_id, participant_id, requested_by, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(enrollment.id.as_uuid())
        .bind(program_id.as_uuid())
        .bind(participant_id.as_uuid())
        .bind(requested_by.as_uuid())
        .bind(enrollment.status.as_str())
        .bind(enrollment.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            let _ = tx.rollback().await;
            let mapped = map_reserve_error(err);
            if matches!(mapped, ReserveError::Duplicate) {
                metrics::counter!("enrollment.reserve.rejected", "reason" => "duplicate")
                    .increment(1);
            }
            return Err(mapped);
        }

        tx.commit().await.map_err(map_reserve_error)?;
        metrics::counter!("enrollment.reserve.accepted").increment(1);
        Ok(enrollment)
    }

    async fn confirm(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, LifecycleError> {
        self.transition(enrollment_id, EnrollmentStatus::Confirmed, None)
            .await
    }

    async fn complete(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, LifecycleError> {
        self.transition(enrollment_id, EnrollmentStatus::Completed, None)
            .await
    }

    async fn cancel(
        &self,
        enrollment_id: EnrollmentId,
        reason: &str,
        _now: DateTime<Utc>,
    ) -> Result<Enrollment, LifecycleError> {
        self.transition(enrollment_id, EnrollmentStatus::Cancelled, Some(reason))
            .await
    }

    async fn remaining_capacity(&self, program_id: ProgramId) -> Result<Remaining, StorageError> {
        let row = sqlx::query(
            r"
            SELECT cp.maximum,
                   (SELECT COUNT(*)
                    FROM enrollments e
                    WHERE e.program_id = cp.program_id
                      AND e.status IN ('pending', 'confirmed')) AS active
            FROM capacity_policies cp
            WHERE cp.program_id = $1
            ",
        )
        .bind(program_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map_or(Remaining::Unlimited, |row| {
            remaining(row.get("maximum"), row.get("active"))
        }))
    }

    async fn remaining_capacity_for(
        &self,
        program_ids: &[ProgramId],
    ) -> Result<HashMap<ProgramId, Remaining>, StorageError> {
        let ids: Vec<Uuid> = program_ids.iter().map(|id| *id.as_uuid()).collect();

        // One round trip for the whole listing; programs without a policy
        // row fall out of the join and default to unlimited below.
        let rows = sqlx::query(
            r"
            SELECT cp.program_id,
                   cp.maximum,
                   COUNT(e.id) FILTER (WHERE e.status IN ('pending', 'confirmed')) AS active
            FROM capacity_policies cp
            LEFT JOIN enrollments e ON e.program_id = cp.program_id
            WHERE cp.program_id = ANY($1)
            GROUP BY cp.program_id, cp.maximum
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut result: HashMap<ProgramId, Remaining> = program_ids
            .iter()
            .map(|id| (*id, Remaining::Unlimited))
            .collect();
        for row in rows {
            let program_id = ProgramId::from_uuid(row.get("program_id"));
            result.insert(program_id, remaining(row.get("maximum"), row.get("active")));
        }
        Ok(result)
    }
}

fn remaining(maximum: Option<i32>, active: i64) -> Remaining {
    match maximum {
        None => Remaining::Unlimited,
        Some(maximum) => {
            let left = i64::from(maximum) - active;
            Remaining::Seats(u32::try_from(left).unwrap_or(0))
        }
    }
}

fn row_to_enrollment(row: &PgRow) -> Result<Enrollment, StorageError> {
    let status_str: String = row.get("status");
    let status = EnrollmentStatus::parse(&status_str)
        .map_err(|bad| StorageError(format!("invalid enrollment status in storage: {bad}")))?;

    Ok(Enrollment {
        id: EnrollmentId::from_uuid(row.get("id")),
        program_id: ProgramId::from_uuid(row.get("program_id")),
        participant_id: ParticipantId::from_uuid(row.get("participant_id")),
        requested_by: GuardianId::from_uuid(row.get("requested_by")),
        status,
        created_at: row.get("created_at"),
        cancellation_reason: row.get("cancellation_reason"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_subtracts_active_from_maximum() {
        assert_eq!(remaining(Some(12), 5), Remaining::Seats(7));
        assert_eq!(remaining(Some(12), 12), Remaining::Seats(0));
        assert_eq!(remaining(None, 40), Remaining::Unlimited);
    }

    #[test]
    fn remaining_never_goes_negative() {
        // Possible transiently if a maximum is lowered below the active count.
        assert_eq!(remaining(Some(3), 5), Remaining::Seats(0));
    }
}

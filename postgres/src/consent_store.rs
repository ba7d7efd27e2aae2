//! `PostgreSQL`-backed consent records.
//!
//! The one-active-consent-per-(participant, type) invariant is a partial
//! unique index over rows with `withdrawn_at IS NULL`; a violation maps to
//! the already-active outcome. Withdrawal only ever sets `withdrawn_at` —
//! rows are never deleted, the history is the audit trail.

use crate::error::{storage, UNIQUE_VIOLATION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::error::{ConsentError, StorageError};
use rollcall_core::store::ConsentStore;
use rollcall_core::types::{ConsentId, ConsentRecord, ConsentType, GuardianId, ParticipantId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PostgreSQL` implementation of [`ConsentStore`].
pub struct PgConsentStore {
    pool: PgPool,
}

impl PgConsentStore {
    /// Create a store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsentStore for PgConsentStore {
    async fn grant(
        &self,
        grantor_id: GuardianId,
        participant_id: ParticipantId,
        consent_type: ConsentType,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, ConsentError> {
        let record = ConsentRecord {
            id: ConsentId::new(),
            grantor_id,
            participant_id,
            consent_type,
            granted_at: at,
            withdrawn_at: None,
        };

        let inserted = sqlx::query(
            r"
            INSERT INTO consents (id, grantor_id, participant_id, consent_type, granted_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(record.id.as_uuid())
        .bind(grantor_id.as_uuid())
        .bind(participant_id.as_uuid())
        .bind(consent_type.as_str())
        .bind(at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(record),
            Err(err) => {
                if let sqlx::Error::Database(db) = &err {
                    if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                        return Err(ConsentError::AlreadyActive);
                    }
                }
                Err(ConsentError::Storage(storage(err)))
            }
        }
    }

    async fn withdraw(
        &self,
        consent_id: ConsentId,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, ConsentError> {
        // Idempotent: an already-withdrawn record is returned as stored.
        let row = sqlx::query(
            r"
            UPDATE consents
            SET withdrawn_at = COALESCE(withdrawn_at, $2)
            WHERE id = $1
            RETURNING id, grantor_id, participant_id, consent_type, granted_at, withdrawn_at
            ",
        )
        .bind(consent_id.as_uuid())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| ConsentError::Storage(storage(err)))?
        .ok_or(ConsentError::NotFound)?;

        row_to_consent(&row).map_err(ConsentError::Storage)
    }

    async fn is_active(
        &self,
        participant_id: ParticipantId,
        consent_type: ConsentType,
    ) -> Result<bool, StorageError> {
        let (active,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM consents
                WHERE participant_id = $1
                  AND consent_type = $2
                  AND withdrawn_at IS NULL
            )
            ",
        )
        .bind(participant_id.as_uuid())
        .bind(consent_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(active)
    }
}

fn row_to_consent(row: &PgRow) -> Result<ConsentRecord, StorageError> {
    let type_str: String = row.get("consent_type");
    let consent_type = ConsentType::parse(&type_str)
        .map_err(|bad| StorageError(format!("invalid consent type in storage: {bad}")))?;

    Ok(ConsentRecord {
        id: ConsentId::from_uuid(row.get("id")),
        grantor_id: GuardianId::from_uuid(row.get("grantor_id")),
        participant_id: ParticipantId::from_uuid(row.get("participant_id")),
        consent_type,
        granted_at: row.get("granted_at"),
        withdrawn_at: row.get("withdrawn_at"),
    })
}

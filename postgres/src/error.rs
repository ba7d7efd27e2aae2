//! Mapping from `PostgreSQL` faults to core error types.
//!
//! Two database errors are expected business outcomes, not faults:
//! `55P03` (`lock_not_available`, the bounded capacity-lock wait expired)
//! becomes the transient busy signal, and `23505` (`unique_violation` on the
//! active-enrollment partial index) becomes the duplicate outcome.
//! Everything else is a connectivity fault carried through verbatim.

use rollcall_core::error::{LifecycleError, ReserveError, StorageError};

const LOCK_NOT_AVAILABLE: &str = "55P03";
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn storage(err: sqlx::Error) -> StorageError {
    StorageError(err.to_string())
}

/// The business outcome a SQLSTATE code stands for on the reservation path,
/// if any.
fn reserve_outcome(code: Option<&str>) -> Option<ReserveError> {
    match code {
        Some(LOCK_NOT_AVAILABLE) => Some(ReserveError::Busy),
        Some(UNIQUE_VIOLATION) => Some(ReserveError::Duplicate),
        _ => None,
    }
}

pub(crate) fn map_reserve_error(err: sqlx::Error) -> ReserveError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(outcome) = reserve_outcome(db.code().as_deref()) {
            if matches!(outcome, ReserveError::Busy) {
                metrics::counter!("enrollment.reserve.lock_timeout").increment(1);
                tracing::warn!("capacity lock wait timed out");
            }
            return outcome;
        }
    }
    ReserveError::Storage(storage(err))
}

pub(crate) fn map_lifecycle_error(err: sqlx::Error) -> LifecycleError {
    LifecycleError::Storage(storage(err))
}

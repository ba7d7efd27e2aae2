//! # Rollcall Postgres
//!
//! `PostgreSQL`-backed implementations of the `rollcall-core` storage ports.
//!
//! The reservation path in [`PgEnrollmentStore`] carries the system's
//! central concurrency guarantee: a per-program row lock held across the
//! count-and-insert window, with a bounded lock wait that degrades to a
//! retryable busy signal instead of exhausting the connection pool.
//!
//! Schema lives in `migrations/`; apply with `sqlx migrate run`.

pub mod config;
pub mod consent_store;
pub mod enrollment_store;
mod error;
pub mod policy_store;

pub use config::PostgresConfig;
pub use consent_store::PgConsentStore;
pub use enrollment_store::PgEnrollmentStore;
pub use policy_store::{PgCapacityPolicyStore, PgEligibilityPolicyStore};

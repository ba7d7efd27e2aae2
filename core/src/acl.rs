//! Anti-corruption boundaries into the identity and catalog areas.
//!
//! The enrollment core never reads another area's tables or types directly.
//! These narrow ports translate what it needs (a participant's protected
//! attributes, a program's start date, a display name) into flat value
//! objects owned by this crate. Implementations live with the owning areas;
//! tests use the static fakes in `rollcall-testing`.

use crate::error::StorageError;
use crate::types::{ParticipantAttributes, ParticipantId, ProgramId};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Failure of an anti-corruption boundary read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclError {
    /// The owning area has no record of the requested entity.
    #[error("not found")]
    NotFound,

    /// The owning area could not be reached.
    #[error(transparent)]
    Unavailable(#[from] StorageError),
}

/// Read port into the identity area.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Resolve a participant's protected attributes.
    ///
    /// # Errors
    ///
    /// [`AclError::NotFound`] if the identity area has no such participant.
    async fn resolve_attributes(
        &self,
        participant_id: ParticipantId,
    ) -> Result<ParticipantAttributes, AclError>;

    /// Resolve a participant's display name. Presentation only; core logic
    /// never branches on it.
    ///
    /// # Errors
    ///
    /// [`AclError::NotFound`] if the identity area has no such participant.
    async fn resolve_display_name(
        &self,
        participant_id: ParticipantId,
    ) -> Result<String, AclError>;
}

/// Read port into the scheduling/catalog area.
#[async_trait]
pub trait ProgramCatalog: Send + Sync {
    /// Resolve a program's scheduled start date.
    ///
    /// Returns `Ok(None)` when the program exists but has no start date yet.
    ///
    /// # Errors
    ///
    /// [`AclError::NotFound`] if the catalog has no such program.
    async fn resolve_start_date(
        &self,
        program_id: ProgramId,
    ) -> Result<Option<NaiveDate>, AclError>;
}

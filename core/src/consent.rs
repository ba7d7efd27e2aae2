//! Consent grants and the cross-area visibility gate.
//!
//! Consent is a visibility control, not a storage control: the owning area
//! always keeps the full data for its own direct use. Cross-area readers of
//! sensitive fields (emergency contact, medical notes) must check the gate
//! first and substitute `None` for every gated field rather than omit the
//! whole record.

use crate::environment::Clock;
use crate::error::{ConsentError, StorageError};
use crate::store::ConsentStore;
use crate::types::{ConsentId, ConsentRecord, ConsentType, GuardianId, ParticipantId};
use std::sync::Arc;

/// Grant/withdraw mutations plus the gate query.
pub struct ConsentService {
    store: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
}

impl ConsentService {
    /// Wire the service to its store and clock.
    #[must_use]
    pub fn new(store: Arc<dyn ConsentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Grant consent on behalf of a participant.
    ///
    /// # Errors
    ///
    /// [`ConsentError::AlreadyActive`] when an active grant of this type
    /// already exists; withdraw it first, grants never stack.
    pub async fn grant(
        &self,
        grantor_id: GuardianId,
        participant_id: ParticipantId,
        consent_type: ConsentType,
    ) -> Result<ConsentRecord, ConsentError> {
        let record = self
            .store
            .grant(grantor_id, participant_id, consent_type, self.clock.now())
            .await?;
        tracing::info!(
            consent_id = %record.id,
            participant_id = %participant_id,
            consent_type = %consent_type,
            "consent granted"
        );
        Ok(record)
    }

    /// Withdraw a consent. The record is retained with `withdrawn_at` set;
    /// nothing is ever deleted (audit requirement).
    ///
    /// # Errors
    ///
    /// [`ConsentError::NotFound`] when no record has this identifier.
    pub async fn withdraw(&self, consent_id: ConsentId) -> Result<ConsentRecord, ConsentError> {
        let record = self.store.withdraw(consent_id, self.clock.now()).await?;
        tracing::info!(
            consent_id = %record.id,
            participant_id = %record.participant_id,
            consent_type = %record.consent_type,
            "consent withdrawn"
        );
        Ok(record)
    }

    /// The gate: whether a cross-area reader may see fields of this type for
    /// this participant.
    ///
    /// # Errors
    ///
    /// [`StorageError`] on connectivity faults.
    pub async fn is_active(
        &self,
        participant_id: ParticipantId,
        consent_type: ConsentType,
    ) -> Result<bool, StorageError> {
        self.store.is_active(participant_id, consent_type).await
    }
}

/// Blank a gated field unless the gate is open.
///
/// Cross-area readers apply this per field, so an ungated record shape is
/// preserved and only the protected values disappear.
#[must_use]
pub fn redact_unless<T>(gate_open: bool, value: Option<T>) -> Option<T> {
    if gate_open { value } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_blanks_only_when_gate_closed() {
        assert_eq!(redact_unless(true, Some("044-555")), Some("044-555"));
        assert_eq!(redact_unless(false, Some("044-555")), None);
        assert_eq!(redact_unless(true, None::<&str>), None);
        assert_eq!(redact_unless(false, None::<&str>), None);
    }
}

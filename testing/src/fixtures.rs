//! Pre-wired service fixtures for integration tests.

use crate::mocks::{
    FixedClock, InMemoryConsentStore, InMemoryEligibilityPolicyStore, InMemoryEnrollmentStore,
    StaticCatalog, StaticDirectory, test_clock,
};
use rollcall_core::acl::{ParticipantDirectory, ProgramCatalog};
use rollcall_core::bus::DomainEventBus;
use rollcall_core::consent::ConsentService;
use rollcall_core::eligibility::EligibilityEvaluator;
use rollcall_core::engine::EnrollmentService;
use rollcall_core::environment::Clock;
use rollcall_core::store::{ConsentStore, EligibilityPolicyStore, EnrollmentStore};
use rollcall_core::types::{ParticipantAttributes, ParticipantId};
use chrono::NaiveDate;
use std::sync::Arc;

/// An [`EnrollmentService`] wired to in-memory fakes, with handles to every
/// fake kept for seeding and assertions.
pub struct EnrollmentFixture {
    /// Enrollment and capacity policy storage.
    pub store: Arc<InMemoryEnrollmentStore>,
    /// Eligibility policy storage.
    pub eligibility_policies: Arc<InMemoryEligibilityPolicyStore>,
    /// Consent storage.
    pub consents: Arc<InMemoryConsentStore>,
    /// Identity-area boundary fake.
    pub directory: Arc<StaticDirectory>,
    /// Catalog-area boundary fake.
    pub catalog: Arc<StaticCatalog>,
    /// Deterministic clock shared by every component.
    pub clock: Arc<FixedClock>,
    /// The service under test.
    pub service: EnrollmentService,
    /// Consent service over the same store and clock.
    pub consent_service: ConsentService,
}

impl EnrollmentFixture {
    /// Build a fixture with no registered handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bus(DomainEventBus::new())
    }

    /// Build a fixture dispatching to the given bus.
    #[must_use]
    pub fn with_bus(bus: DomainEventBus) -> Self {
        let store = Arc::new(InMemoryEnrollmentStore::new());
        let eligibility_policies = Arc::new(InMemoryEligibilityPolicyStore::new());
        let consents = Arc::new(InMemoryConsentStore::new());
        let directory = Arc::new(StaticDirectory::new());
        let catalog = Arc::new(StaticCatalog::new());
        let clock = Arc::new(test_clock());

        let evaluator = EligibilityEvaluator::new(
            Arc::clone(&eligibility_policies) as Arc<dyn EligibilityPolicyStore>,
            Arc::clone(&directory) as Arc<dyn ParticipantDirectory>,
            Arc::clone(&catalog) as Arc<dyn ProgramCatalog>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let service = EnrollmentService::new(
            Arc::clone(&store) as Arc<dyn EnrollmentStore>,
            evaluator,
            Arc::new(bus),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let consent_service = ConsentService::new(
            Arc::clone(&consents) as Arc<dyn ConsentStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );

        Self {
            store,
            eligibility_policies,
            consents,
            directory,
            catalog,
            clock,
            service,
            consent_service,
        }
    }

    /// Seed a participant and return their id.
    #[must_use]
    pub fn seed_participant(&self, born: NaiveDate, category: &str, rank: i32) -> ParticipantId {
        let participant_id = ParticipantId::new();
        self.directory.insert(
            participant_id,
            ParticipantAttributes {
                age_reference_date: born,
                category: category.to_string(),
                rank,
            },
            "Test Participant",
        );
        participant_id
    }
}

impl Default for EnrollmentFixture {
    fn default() -> Self {
        Self::new()
    }
}

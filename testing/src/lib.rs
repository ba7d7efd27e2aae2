//! # Rollcall Testing
//!
//! Testing utilities for the Rollcall enrollment core.
//!
//! This crate provides:
//! - In-memory fakes for every storage port and boundary port
//! - A deterministic clock
//! - A recording integration-event publisher
//! - Pre-wired service fixtures
//!
//! The crate-level integration tests under `tests/` exercise the core's
//! observable properties end to end against these fakes: no overselling
//! under concurrency, duplicate prevention, accumulated ineligibility
//! reasons, consent gating, and event-bus failure isolation.

pub mod fixtures;
pub mod mocks;

pub use fixtures::EnrollmentFixture;
pub use mocks::{
    FixedClock, InMemoryConsentStore, InMemoryEligibilityPolicyStore, InMemoryEnrollmentStore,
    RecordingPublisher, StaticCatalog, StaticDirectory, test_clock,
};

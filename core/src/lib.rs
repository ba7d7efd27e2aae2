//! # Rollcall Core
//!
//! Domain types and engine for a capacity-gated program enrollment system.
//!
//! The hard problems this crate owns:
//!
//! - **Capacity-gated reservation** — the atomic "lock, count, insert"
//!   transaction that keeps a program with N seats from ever holding N+1
//!   active enrollments under concurrent requests ([`store::EnrollmentStore`],
//!   orchestrated by [`engine::EnrollmentService`]).
//! - **Eligibility** — a fixed set of typed admission predicates evaluated
//!   through anti-corruption boundaries, accumulating every violation
//!   ([`eligibility`]).
//! - **Consent gating** — the boolean visibility filter cross-area readers
//!   of protected fields must pass ([`consent`]).
//! - **Event propagation** — the synchronous in-process domain event bus
//!   with isolated failure domains ([`bus`]), and promotion of selected
//!   domain events into stable, versioned integration events ([`publish`]).
//!
//! ## Architecture Principles
//!
//! - Business outcomes are typed `Err` values; infrastructure faults
//!   propagate to the supervising runtime
//! - Dependency injection via constructor-passed trait objects
//! - Closed sum types for lifecycle status; illegal states unrepresentable
//! - No global registries: build the bus and services at startup, share
//!   them behind `Arc`

pub mod acl;
pub mod bus;
pub mod consent;
pub mod eligibility;
pub mod engine;
pub mod environment;
pub mod error;
pub mod event;
pub mod publish;
pub mod store;
pub mod types;

pub use bus::{DomainEventBus, DomainEventHandler};
pub use consent::{ConsentService, redact_unless};
pub use eligibility::{EligibilityEvaluator, EligibilityOutcome, IneligibilityReason};
pub use engine::{EnrollmentService, promote_enrollment_event};
pub use environment::{Clock, SystemClock};
pub use error::{
    ConsentError, DispatchError, EligibilityError, HandlerError, HandlerFailure, LifecycleError,
    PolicyError, PublishError, ReserveError, StorageError,
};
pub use event::{Criticality, DeliveryShape, DomainEvent, IntegrationEvent};
pub use publish::{BroadcastPublisher, IntegrationEventPublisher, PromotionHandler, publish_guarded};
pub use types::{
    Area, CapacityPolicy, ConsentId, ConsentRecord, ConsentType, EligibilityPolicy, Enrollment,
    EnrollmentId, EnrollmentStatus, EvaluationReference, GuardianId, ParticipantAttributes,
    ParticipantId, ProgramId, Remaining,
};

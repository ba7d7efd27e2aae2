//! Domain and integration event types.
//!
//! A [`DomainEvent`] is an ephemeral, in-process notification of a committed
//! state change, consumed only within its originating area. It is never
//! persisted: if the process dies between commit and dispatch the
//! notification is lost, so handlers must be idempotent and re-derivable
//! from persisted state.
//!
//! An [`IntegrationEvent`] is the stable, versioned contract other areas see.
//! It is derived from exactly one domain event by a promotion handler, and
//! its payload holds only primitive values so no internal types leak across
//! the area boundary.
//!
//! # Event Naming Convention
//!
//! Integration event types carry a version suffix so schemas can evolve:
//! `"enrollment.reserved.v1"`, `"enrollment.cancelled.v1"`.

use crate::error::PublishError;
use crate::types::{Area, Enrollment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Event type raised when a seat is reserved.
pub const ENROLLMENT_RESERVED: &str = "enrollment.reserved";
/// Event type raised when a pending enrollment is confirmed.
pub const ENROLLMENT_CONFIRMED: &str = "enrollment.confirmed";
/// Event type raised when an enrollment is cancelled.
pub const ENROLLMENT_CANCELLED: &str = "enrollment.cancelled";

/// A notification of a state change, dispatched synchronously within the
/// originating area after the change has committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Stable event type name (e.g., `"enrollment.reserved"`).
    pub event_type: String,
    /// Identifier of the aggregate the event is about.
    pub aggregate_id: Uuid,
    /// Kind of aggregate (e.g., `"enrollment"`).
    pub aggregate_type: String,
    /// Event data. May reference the area's own types via their serialized
    /// form; never crosses the area boundary as-is.
    pub payload: Map<String, Value>,
    /// When the state change occurred.
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Create a domain event.
    #[must_use]
    pub fn new(
        event_type: &str,
        aggregate_type: &str,
        aggregate_id: Uuid,
        payload: Map<String, Value>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            payload,
            occurred_at,
        }
    }

    /// The `enrollment.reserved` event for a freshly reserved seat.
    #[must_use]
    pub fn enrollment_reserved(enrollment: &Enrollment) -> Self {
        Self::new(
            ENROLLMENT_RESERVED,
            "enrollment",
            *enrollment.id.as_uuid(),
            enrollment_payload(enrollment),
            enrollment.created_at,
        )
    }

    /// The `enrollment.confirmed` event.
    #[must_use]
    pub fn enrollment_confirmed(enrollment: &Enrollment, occurred_at: DateTime<Utc>) -> Self {
        Self::new(
            ENROLLMENT_CONFIRMED,
            "enrollment",
            *enrollment.id.as_uuid(),
            enrollment_payload(enrollment),
            occurred_at,
        )
    }

    /// The `enrollment.cancelled` event.
    #[must_use]
    pub fn enrollment_cancelled(enrollment: &Enrollment, occurred_at: DateTime<Utc>) -> Self {
        let mut payload = enrollment_payload(enrollment);
        if let Some(reason) = &enrollment.cancellation_reason {
            payload.insert("cancellation_reason".to_string(), Value::from(reason.clone()));
        }
        Self::new(
            ENROLLMENT_CANCELLED,
            "enrollment",
            *enrollment.id.as_uuid(),
            payload,
            occurred_at,
        )
    }
}

fn enrollment_payload(enrollment: &Enrollment) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(
        "enrollment_id".to_string(),
        Value::from(enrollment.id.to_string()),
    );
    payload.insert(
        "program_id".to_string(),
        Value::from(enrollment.program_id.to_string()),
    );
    payload.insert(
        "participant_id".to_string(),
        Value::from(enrollment.participant_id.to_string()),
    );
    payload.insert(
        "requested_by".to_string(),
        Value::from(enrollment.requested_by.to_string()),
    );
    payload.insert(
        "status".to_string(),
        Value::from(enrollment.status.as_str()),
    );
    payload
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {{ {}: {} }}",
            self.event_type, self.aggregate_type, self.aggregate_id
        )
    }
}

/// Whether a notification's delivery failure must be escalated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criticality {
    /// Failure sits on a compliance-relevant cascade; surface loudly.
    Critical,
    /// Advisory only; the state change is already durable. Log and move on.
    BestEffort,
}

impl Criticality {
    /// Stable string form, used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::BestEffort => "best_effort",
        }
    }
}

/// How an integration event fans out to subscribers, which determines its
/// topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryShape {
    /// One topic per (source area, event type); aggregate-scoped events.
    #[default]
    Point,
    /// One topic per (entity type, entity id); fan-out events such as
    /// "notify every participant of a newly created thread".
    PerEntity,
}

/// A stable, versioned, cross-area notification derived from one domain
/// event. This flat record is the only wire-equivalent format the core
/// defines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    /// Versioned event type (e.g., `"enrollment.reserved.v1"`).
    pub event_type: String,
    /// The area that raised the originating domain event.
    pub source_area: Area,
    /// Kind of entity the event is about (e.g., `"enrollment"`).
    pub entity_type: String,
    /// Identifier of that entity, stringly-typed on purpose: subscribers
    /// never see the source area's ID newtypes.
    pub entity_id: String,
    /// Flat payload; primitive values only.
    pub payload: Map<String, Value>,
    /// Delivery-failure escalation class.
    pub criticality: Criticality,
    /// Links related events across areas.
    pub correlation_id: Option<Uuid>,
    /// The domain event occurrence this was promoted from.
    pub causation_id: Option<Uuid>,
    /// Routing hint for topic derivation; not part of the wire record.
    #[serde(skip, default)]
    pub shape: DeliveryShape,
}

impl IntegrationEvent {
    /// Build an integration event, validating that the payload holds only
    /// primitive values (null, bool, number, string).
    ///
    /// # Errors
    ///
    /// [`PublishError::NonPrimitivePayload`] naming the first offending key.
    pub fn new(
        event_type: &str,
        source_area: Area,
        entity_type: &str,
        entity_id: &str,
        payload: Map<String, Value>,
        criticality: Criticality,
    ) -> Result<Self, PublishError> {
        validate_flat(&payload)?;
        Ok(Self {
            event_type: event_type.to_string(),
            source_area,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            payload,
            criticality,
            correlation_id: None,
            causation_id: None,
            shape: DeliveryShape::Point,
        })
    }

    /// Switch the event to per-entity fan-out delivery.
    #[must_use]
    pub fn per_entity(mut self) -> Self {
        self.shape = DeliveryShape::PerEntity;
        self
    }

    /// Attach correlation/causation identifiers.
    #[must_use]
    pub fn correlated(mut self, correlation_id: Uuid, causation_id: Option<Uuid>) -> Self {
        self.correlation_id = Some(correlation_id);
        self.causation_id = causation_id;
        self
    }

    /// The topic this event is delivered on. Deterministic: point topics are
    /// `{source_area}.{event_type}`, per-entity topics are
    /// `{entity_type}.{entity_id}`. Within one topic, delivery preserves
    /// publish order per publisher.
    #[must_use]
    pub fn topic(&self) -> String {
        match self.shape {
            DeliveryShape::Point => format!("{}.{}", self.source_area, self.event_type),
            DeliveryShape::PerEntity => format!("{}.{}", self.entity_type, self.entity_id),
        }
    }
}

impl fmt::Display for IntegrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {{ {}: {} }}",
            self.event_type,
            self.criticality.as_str(),
            self.entity_type,
            self.entity_id
        )
    }
}

fn validate_flat(payload: &Map<String, Value>) -> Result<(), PublishError> {
    for (key, value) in payload {
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            return Err(PublishError::NonPrimitivePayload(key.clone()));
        }
    }
    Ok(())
}

//! Integration event publishing.
//!
//! Promotion handlers sit on the domain event bus, derive one
//! [`IntegrationEvent`] from the triggering [`DomainEvent`], and hand it to
//! an [`IntegrationEventPublisher`]. Delivery goes to the topic the event
//! derives deterministically from its shape (see
//! [`IntegrationEvent::topic`]); per-topic publish order is preserved per
//! publisher, with no cross-topic guarantees.
//!
//! Failure policy follows the event's criticality: `Critical` failures sit
//! on compliance-relevant cascades and are logged at error level and
//! surfaced to the caller; `BestEffort` failures are logged at warn and
//! swallowed, since the state change is already durable and the
//! notification is advisory.

use crate::bus::DomainEventHandler;
use crate::error::{HandlerError, PublishError};
use crate::event::{Criticality, DomainEvent, IntegrationEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Publish/subscribe transport for integration events.
#[async_trait]
pub trait IntegrationEventPublisher: Send + Sync {
    /// Deliver the event to its derived topic.
    ///
    /// # Errors
    ///
    /// [`PublishError`] when the transport rejects or loses the event.
    async fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<P> IntegrationEventPublisher for Arc<P>
where
    P: IntegrationEventPublisher + ?Sized,
{
    async fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}

/// Publish with the criticality-appropriate failure policy.
///
/// # Errors
///
/// Propagates the underlying [`PublishError`] only for `Critical` events;
/// `BestEffort` failures are logged and swallowed.
pub async fn publish_guarded(
    publisher: &dyn IntegrationEventPublisher,
    event: &IntegrationEvent,
) -> Result<(), PublishError> {
    match publisher.publish(event).await {
        Ok(()) => Ok(()),
        Err(err) => match event.criticality {
            Criticality::Critical => {
                tracing::error!(
                    event_type = %event.event_type,
                    topic = %event.topic(),
                    error = %err,
                    "critical integration event failed to publish"
                );
                Err(err)
            }
            Criticality::BestEffort => {
                tracing::warn!(
                    event_type = %event.event_type,
                    topic = %event.topic(),
                    error = %err,
                    "best-effort integration event dropped"
                );
                Ok(())
            }
        },
    }
}

/// A bus handler that promotes selected domain events into integration
/// events.
///
/// The mapping function returns `None` for domain events that stay local.
/// Register promotion handlers *last* on their area so every local handler
/// observes the event before it crosses the boundary.
pub struct PromotionHandler<P, F> {
    name: &'static str,
    publisher: P,
    promote: F,
}

impl<P, F> PromotionHandler<P, F>
where
    P: IntegrationEventPublisher,
    F: Fn(&DomainEvent) -> Option<IntegrationEvent> + Send + Sync,
{
    /// Create a promotion handler with the given mapping.
    pub const fn new(name: &'static str, publisher: P, promote: F) -> Self {
        Self {
            name,
            publisher,
            promote,
        }
    }
}

#[async_trait]
impl<P, F> DomainEventHandler for PromotionHandler<P, F>
where
    P: IntegrationEventPublisher,
    F: Fn(&DomainEvent) -> Option<IntegrationEvent> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let Some(integration) = (self.promote)(event) else {
            return Ok(());
        };
        publish_guarded(&self.publisher, &integration)
            .await
            .map_err(|err| HandlerError::new(err.to_string()))
    }
}

/// Channel capacity for each broadcast topic.
const TOPIC_CAPACITY: usize = 256;

/// In-process publish/subscribe transport over per-topic broadcast channels.
///
/// Every subscriber to a topic sees events in publish order; slow
/// subscribers that fall more than [`TOPIC_CAPACITY`] events behind observe
/// a lag error on their receiver rather than blocking the publisher.
pub struct BroadcastPublisher {
    topics: Mutex<HashMap<String, broadcast::Sender<IntegrationEvent>>>,
}

impl BroadcastPublisher {
    /// Create a transport with no topics yet; topics appear on first use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic, creating it if needed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<IntegrationEvent> {
        self.sender(topic).subscribe()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<IntegrationEvent> {
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationEventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError> {
        let topic = event.topic();
        let sender = self.sender(&topic);
        // A topic with no subscribers delivers to zero receivers; that is a
        // successful publish, not a transport fault.
        let receivers = sender.send(event.clone()).unwrap_or(0);
        tracing::debug!(
            topic = %topic,
            event_type = %event.event_type,
            receivers,
            "integration event published"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::types::Area;
    use serde_json::Map;

    fn sample_integration(event_type: &str, criticality: Criticality) -> IntegrationEvent {
        IntegrationEvent::new(
            event_type,
            Area::Enrollment,
            "enrollment",
            "e-1",
            Map::new(),
            criticality,
        )
        .expect("flat payload")
    }

    struct FailingPublisher;

    #[async_trait]
    impl IntegrationEventPublisher for FailingPublisher {
        async fn publish(&self, _event: &IntegrationEvent) -> Result<(), PublishError> {
            Err(PublishError::Transport("broker unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn broadcast_delivers_in_publish_order() {
        let publisher = BroadcastPublisher::new();
        let mut receiver = publisher.subscribe("enrollment.enrollment.reserved.v1");

        for n in 0..3 {
            let mut event = sample_integration("enrollment.reserved.v1", Criticality::BestEffort);
            event.payload.insert("n".to_string(), serde_json::Value::from(n));
            publisher.publish(&event).await.expect("in-process publish");
        }

        for n in 0..3 {
            let received = receiver.recv().await.expect("event available");
            assert_eq!(received.payload.get("n"), Some(&serde_json::Value::from(n)));
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let publisher = BroadcastPublisher::new();
        let event = sample_integration("enrollment.reserved.v1", Criticality::BestEffort);
        assert!(publisher.publish(&event).await.is_ok());
    }

    #[tokio::test]
    async fn best_effort_failure_is_swallowed() {
        let event = sample_integration("enrollment.reserved.v1", Criticality::BestEffort);
        let outcome = publish_guarded(&FailingPublisher, &event).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn critical_failure_is_surfaced() {
        let event = sample_integration("enrollment.cancelled.v1", Criticality::Critical);
        let outcome = publish_guarded(&FailingPublisher, &event).await;
        assert_eq!(
            outcome,
            Err(PublishError::Transport("broker unreachable".to_string()))
        );
    }

    #[tokio::test]
    async fn promotion_skips_unmapped_events() {
        let handler = PromotionHandler::new("promote-nothing", BroadcastPublisher::new(), |_| None);
        let event = DomainEvent::new(
            "enrollment.reserved",
            "enrollment",
            uuid::Uuid::new_v4(),
            Map::new(),
            chrono::Utc::now(),
        );
        assert!(handler.handle(&event).await.is_ok());
    }
}

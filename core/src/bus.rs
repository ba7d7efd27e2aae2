//! In-process domain event bus.
//!
//! Each business area registers a fixed, ordered list of handlers at process
//! start. Dispatch invokes every handler for the event's area synchronously,
//! in registration order, on the caller's task. A failing handler is
//! recorded and skipped over; it never stops the handlers after it and never
//! rolls back the triggering transaction, which has already committed by the
//! time dispatch runs.
//!
//! Dispatch is not durable. A crash between commit and dispatch loses the
//! notification, so handlers must be idempotent and anything that cannot
//! tolerate a lost notification must be re-derivable from persisted state.
//! Handlers should enqueue slow work rather than perform it inline: dispatch
//! blocks the caller until every handler returns.

use crate::error::{DispatchError, HandlerError, HandlerFailure};
use crate::event::DomainEvent;
use crate::types::Area;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A reaction to a domain event within its originating area.
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Stable handler name, used in failure reports and log fields.
    fn name(&self) -> &'static str;

    /// React to the event.
    ///
    /// # Errors
    ///
    /// Any [`HandlerError`] is caught by the bus, aggregated, and reported
    /// to the dispatching caller; it does not affect other handlers.
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

/// The per-area handler registry.
///
/// Built once at startup, then shared immutably (`Arc`) across workers.
/// Registration order is dispatch order; promotion handlers that forward
/// events across areas must be registered last so local handlers observe
/// the event first.
#[derive(Default)]
pub struct DomainEventBus {
    handlers: HashMap<Area, Vec<Arc<dyn DomainEventHandler>>>,
}

impl DomainEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to an area's dispatch list.
    pub fn register(&mut self, area: Area, handler: Arc<dyn DomainEventHandler>) -> &mut Self {
        tracing::debug!(
            area = area.as_str(),
            handler = handler.name(),
            "domain event handler registered"
        );
        self.handlers.entry(area).or_default().push(handler);
        self
    }

    /// Number of handlers registered for an area.
    #[must_use]
    pub fn handler_count(&self, area: Area) -> usize {
        self.handlers.get(&area).map_or(0, Vec::len)
    }

    /// Dispatch an event to every handler registered for `area`, in order.
    ///
    /// All handlers run even when earlier ones fail. The caller logs the
    /// aggregated failures; it must never retry dispatch, since successful
    /// handlers would observe the event twice.
    ///
    /// # Errors
    ///
    /// [`DispatchError`] listing exactly the handlers that failed, in
    /// registration order.
    pub async fn dispatch(&self, area: Area, event: &DomainEvent) -> Result<(), DispatchError> {
        let handlers = match self.handlers.get(&area) {
            Some(handlers) => handlers,
            None => {
                tracing::debug!(
                    area = area.as_str(),
                    event_type = %event.event_type,
                    "no handlers registered; event dropped"
                );
                return Ok(());
            }
        };

        let mut failures = Vec::new();
        for handler in handlers {
            if let Err(err) = handler.handle(event).await {
                metrics::counter!("domain_event.handler_failed", "handler" => handler.name())
                    .increment(1);
                tracing::warn!(
                    area = area.as_str(),
                    handler = handler.name(),
                    event_type = %event.event_type,
                    error = %err,
                    "domain event handler failed; continuing with remaining handlers"
                );
                failures.push(HandlerFailure {
                    handler: handler.name(),
                    message: err.message,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError {
                failures,
                total: handlers.len(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    struct RecordingHandler {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl DomainEventHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(HandlerError::new("boom"))
            } else {
                Ok(())
            }
        }
    }

    fn sample_event() -> DomainEvent {
        DomainEvent::new(
            "enrollment.reserved",
            "enrollment",
            uuid::Uuid::new_v4(),
            serde_json::Map::new(),
            Utc::now(),
        )
    }

    fn handler(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Arc<dyn DomainEventHandler> {
        Arc::new(RecordingHandler {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = DomainEventBus::new();
        bus.register(Area::Enrollment, handler("first", &log, false))
            .register(Area::Enrollment, handler("second", &log, false))
            .register(Area::Enrollment, handler("third", &log, false));

        bus.dispatch(Area::Enrollment, &sample_event())
            .await
            .expect("no handler fails");

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = DomainEventBus::new();
        bus.register(Area::Enrollment, handler("first", &log, false))
            .register(Area::Enrollment, handler("second", &log, true))
            .register(Area::Enrollment, handler("third", &log, false));

        let err = bus
            .dispatch(Area::Enrollment, &sample_event())
            .await
            .unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(err.total, 3);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].handler, "second");
        assert_eq!(err.failures[0].message, "boom");
    }

    #[tokio::test]
    async fn dispatch_without_handlers_is_ok() {
        let bus = DomainEventBus::new();
        assert!(bus.dispatch(Area::Messaging, &sample_event()).await.is_ok());
    }

    #[tokio::test]
    async fn areas_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = DomainEventBus::new();
        bus.register(Area::Enrollment, handler("enrollment", &log, false))
            .register(Area::Messaging, handler("messaging", &log, false));

        bus.dispatch(Area::Enrollment, &sample_event())
            .await
            .expect("no handler fails");

        assert_eq!(*log.lock().unwrap(), vec!["enrollment"]);
    }
}

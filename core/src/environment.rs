//! Injected dependencies shared across components.
//!
//! Repositories, ports, and the clock are passed explicitly at construction
//! time; nothing is resolved from process-wide configuration, so tests can
//! substitute fakes without mutating global state.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
///
/// Eligibility reference times and consent timestamps flow through this
/// trait so tests can pin the clock.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

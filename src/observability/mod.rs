//! Observability subsystem
//!
//! - Structured JSON-lines logging with a minimum severity
//! - Typed staging events
//! - Begin/complete scopes around multi-record operations
//! - Monotonic counters
//! - Durable audit log of gated operations
//!
//! Observability never fails an operation: logging errors are swallowed and
//! audit append failures are reported as log lines only.

mod audit;
mod events;
mod logger;
mod metrics;
mod scope;

pub use audit::{AuditAction, AuditLog, AuditOutcome, AuditRecord, FileAuditLog, MemoryAuditLog};
pub use events::Event;
pub use logger::{Logger, ParseSeverityError, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Logs `event` at its own severity.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

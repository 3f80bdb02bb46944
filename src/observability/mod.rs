//! Observability subsystem
//!
//! - Structured logging (JSON lines) with a process-wide minimum severity
//! - Typed events
//! - Lock-free counters
//! - Statement timing
//!
//! Observability is read-only: nothing here influences query results.
//!
//! ```ignore
//! use aeroquery::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::QueryExecuted, &[("rows", "42")]);
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//! ```

mod events;
mod logger;
mod metrics;
mod timer;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot, Strategy};
pub use timer::Timer;

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::QueryExecuted, &[("rows", "1")]);
    }
}

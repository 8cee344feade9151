//! In-process application event journal.
//!
//! # Responsibility
//! - Keep a bounded, ordered journal of application events for diagnostics
//!   panels and exports.
//! - Mirror each event to the `log` facade.
//!
//! # Invariants
//! - The journal never holds more than its capacity; oldest entries drop
//!   first.
//! - Clearing the journal is itself recorded as a `system` event.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Default number of retained events.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// One journaled application event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub id: String,
    /// Free-form category (`system`, `map`, `geolocation`, ...).
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied context, flattened into the serialized object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportEnvelope<'a> {
    export_date: DateTime<Utc>,
    total_events: usize,
    events: &'a [LoggedEvent],
}

/// Bounded event journal.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<LoggedEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    /// Creates a journal retaining at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends one event and returns a reference to it.
    ///
    /// Drops oldest entries when the journal exceeds its capacity, and
    /// mirrors the event to the `log` facade.
    pub fn log_event(
        &mut self,
        kind: impl Into<String>,
        message: impl Into<String>,
        extra: Map<String, Value>,
    ) -> &LoggedEvent {
        let event = LoggedEvent {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            message: message.into(),
            timestamp: Utc::now(),
            extra,
        };
        debug!(
            "event=app_event module=eventlog kind={} message={}",
            event.kind, event.message
        );

        self.events.push(event);
        if self.events.len() > self.capacity {
            let overflow = self.events.len() - self.capacity;
            self.events.drain(..overflow);
        }

        self.events.last().expect("journal cannot be empty after push")
    }

    /// Empties the journal, then records the clear as a `system` event.
    pub fn clear(&mut self) {
        self.events.clear();
        self.log_event("system", "Event log cleared", Map::new());
    }

    /// All retained events, oldest first.
    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }

    /// Retained events with an exactly matching kind, oldest first.
    pub fn events_by_kind(&self, kind: &str) -> Vec<&LoggedEvent> {
        self.events
            .iter()
            .filter(|event| event.kind == kind)
            .collect()
    }

    /// Retained events with `start <= timestamp <= end`, oldest first.
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&LoggedEvent> {
        self.events
            .iter()
            .filter(|event| event.timestamp >= start && event.timestamp <= end)
            .collect()
    }

    /// Serializes the journal into a pretty-printed export envelope with
    /// export date and total count.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ExportEnvelope {
            export_date: Utc::now(),
            total_events: self.events.len(),
            events: &self.events,
        })
    }
}

//! Immutable audit facts and the read-side filter
//!
//! An [`Event`] is written exactly once and never updated or deleted; the
//! crate exposes no operation that could do either.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::taxonomy::EventType;
use crate::visibility::Role;

/// Unique identifier for a ledger fact, generated at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable, timestamped record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    /// Append order assigned by the ledger; breaks ties between equal
    /// timestamps.
    pub sequence: u64,
    /// The person the event is about.
    pub subject_id: String,
    /// Role of the causing actor, snapshotted at write time — never looked
    /// up again later.
    pub actor_role: Role,
    pub event_type: EventType,
    /// Optional pointer to the domain object the event concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Open key/value payload; always carries the schema-version tag.
    pub metadata: Map<String, Value>,
    /// Event time, not insertion time.
    pub timestamp: DateTime<Utc>,
    /// Name of the emitting collaborator.
    pub source_module: String,
}

/// Filter for ledger queries. Empty filter matches every fact.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    /// Restrict to these subjects; `None` means no subject restriction.
    pub subjects: Option<HashSet<String>>,
    pub event_type: Option<EventType>,
    pub source_module: Option<String>,
    /// Inclusive lower bound on event time.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on event time.
    pub until: Option<DateTime<Utc>>,
}

impl EventFilter {
    /// Matches every fact.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to a single subject.
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subjects: Some(HashSet::from([subject_id.into()])),
            ..Default::default()
        }
    }

    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn with_source_module(mut self, source_module: impl Into<String>) -> Self {
        self.source_module = Some(source_module.into());
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Whether an event passes every set clause.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(subjects) = &self.subjects {
            if !subjects.contains(&event.subject_id) {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(source_module) = &self.source_module {
            if &event.source_module != source_module {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp >= until {
                return false;
            }
        }
        true
    }
}

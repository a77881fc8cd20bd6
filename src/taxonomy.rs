//! Closed event-type taxonomy and metadata versioning
//!
//! The taxonomy is decided at build time: adding an event type is a schema
//! change made at exactly one declaration site, never a runtime operation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key carrying the schema version of the event payload.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Version stamped on metadata when the emitter does not pick one.
pub const DEFAULT_METADATA_VERSION: u32 = 1;

/// Every event type the ledger accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Program / profile
    ProgramEnrolled,
    ProfileUpdated,

    // Milestones
    MilestoneCreated,
    MilestoneUpdated,
    MilestoneStateChanged,

    // Supervision sessions
    SessionScheduled,
    SessionStateChanged,
    FeedbackLogged,

    // Opportunity interactions
    OpportunitySaved,
    OpportunityStateChanged,
    OutcomeLogged,

    // Writing versions
    WritingVersionCreated,
    WritingVersionStateChanged,

    // Documents
    DocumentUploaded,

    // Assignment administration
    AssignmentCreated,
    AssignmentRemoved,
}

impl EventType {
    pub const ALL: &'static [EventType] = &[
        EventType::ProgramEnrolled,
        EventType::ProfileUpdated,
        EventType::MilestoneCreated,
        EventType::MilestoneUpdated,
        EventType::MilestoneStateChanged,
        EventType::SessionScheduled,
        EventType::SessionStateChanged,
        EventType::FeedbackLogged,
        EventType::OpportunitySaved,
        EventType::OpportunityStateChanged,
        EventType::OutcomeLogged,
        EventType::WritingVersionCreated,
        EventType::WritingVersionStateChanged,
        EventType::DocumentUploaded,
        EventType::AssignmentCreated,
        EventType::AssignmentRemoved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProgramEnrolled => "program_enrolled",
            EventType::ProfileUpdated => "profile_updated",
            EventType::MilestoneCreated => "milestone_created",
            EventType::MilestoneUpdated => "milestone_updated",
            EventType::MilestoneStateChanged => "milestone_state_changed",
            EventType::SessionScheduled => "session_scheduled",
            EventType::SessionStateChanged => "session_state_changed",
            EventType::FeedbackLogged => "feedback_logged",
            EventType::OpportunitySaved => "opportunity_saved",
            EventType::OpportunityStateChanged => "opportunity_state_changed",
            EventType::OutcomeLogged => "outcome_logged",
            EventType::WritingVersionCreated => "writing_version_created",
            EventType::WritingVersionStateChanged => "writing_version_state_changed",
            EventType::DocumentUploaded => "document_uploaded",
            EventType::AssignmentCreated => "assignment_created",
            EventType::AssignmentRemoved => "assignment_removed",
        }
    }

    /// Resolves a raw event-type name, `None` if it is not a member.
    pub fn parse(raw: &str) -> Option<EventType> {
        Self::ALL.iter().copied().find(|t| t.as_str() == raw)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

/// Whether the ledger recognizes this event-type name.
pub fn is_supported(event_type: &str) -> bool {
    EventType::parse(event_type).is_some()
}

/// Returns a copy of `metadata` with the schema-version tag set.
///
/// The caller's map is never mutated; an existing tag is overwritten.
pub fn with_version(metadata: &Map<String, Value>, version: u32) -> Map<String, Value> {
    let mut stamped = metadata.clone();
    stamped.insert(SCHEMA_VERSION_KEY.to_string(), Value::from(version));
    stamped
}

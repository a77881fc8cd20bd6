//! Error types with fix suggestions

use thiserror::Error;

use crate::lifecycle::EntityKind;

/// Trait for errors that can tell the caller how to correct them
pub trait Remedy {
    fn remedy(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum WaypointError {
    // ─────────────────────────────────────────────────────────────
    // Validation errors (WP-010+): caller-correctable, never
    // partially applied
    // ─────────────────────────────────────────────────────────────
    #[error("WP-010: Unsupported event type '{event_type}'")]
    UnsupportedEventType { event_type: String },

    // ─────────────────────────────────────────────────────────────
    // Lifecycle errors (WP-020+)
    // ─────────────────────────────────────────────────────────────
    #[error("WP-020: Illegal {kind} transition '{from}' -> '{to}'")]
    IllegalTransition {
        kind: EntityKind,
        from: String,
        to: String,
    },

    #[error("WP-021: Stale {kind} state: expected '{expected}', found '{actual}'")]
    StateConflict {
        kind: EntityKind,
        expected: String,
        actual: String,
    },

    #[error("WP-022: '{state}' is not a {kind} state")]
    UnknownState { kind: EntityKind, state: String },

    // ─────────────────────────────────────────────────────────────
    // Authorization denials (WP-030+)
    // ─────────────────────────────────────────────────────────────
    #[error("WP-030: Access to subject '{subject_id}' denied")]
    Forbidden { subject_id: String },

    // ─────────────────────────────────────────────────────────────
    // Storage faults (WP-040+): always propagated, never suppressed
    // ─────────────────────────────────────────────────────────────
    #[error("WP-040: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WP-041: Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Remedy for WaypointError {
    fn remedy(&self) -> Option<&str> {
        match self {
            WaypointError::UnsupportedEventType { .. } => {
                Some("Add the event type to the taxonomy (one declaration site) or fix the caller")
            }
            WaypointError::IllegalTransition { .. } => {
                Some("Check allowed_next_states() before persisting a lifecycle move")
            }
            WaypointError::StateConflict { .. } => {
                Some("Re-read the entity and retry the transition from its current state")
            }
            WaypointError::UnknownState { .. } => {
                Some("Use a state from the kind's declared state set")
            }
            WaypointError::Forbidden { .. } => {
                Some("Request data for an assigned subject, or act through an admin view")
            }
            WaypointError::Io(_) => Some("Check file path and permissions"),
            WaypointError::Serialization(_) => {
                Some("Check the ledger file for truncated or edited rows")
            }
        }
    }
}

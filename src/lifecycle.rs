//! Lifecycle state machines for stateful entities
//!
//! One transition table per entity kind, declared once as data. The engine
//! is pure: it holds no storage, logs nothing, and answers "is this move
//! legal" with a boolean. Anything not explicitly allowed is denied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WaypointError;

/// The entity kinds whose lifecycles are governed by a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    OpportunityInteraction,
    SupervisionSession,
    Milestone,
    WritingVersion,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::OpportunityInteraction,
        EntityKind::SupervisionSession,
        EntityKind::Milestone,
        EntityKind::WritingVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::OpportunityInteraction => "opportunity-interaction",
            EntityKind::SupervisionSession => "supervision-session",
            EntityKind::Milestone => "milestone",
            EntityKind::WritingVersion => "writing-version",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One table row: a state and the states directly reachable from it.
type Row = (&'static str, &'static [&'static str]);

// First row of each table is the kind's initial state. A state mapped to an
// empty set is terminal.

const OPPORTUNITY_INTERACTION: &[Row] = &[
    ("saved", &["applied"]),
    ("applied", &["rejected", "accepted"]),
    ("rejected", &["outcome_logged"]),
    ("accepted", &["outcome_logged"]),
    ("outcome_logged", &[]),
];

const SUPERVISION_SESSION: &[Row] = &[
    ("scheduled", &["occurred"]),
    ("occurred", &["feedback_pending"]),
    ("feedback_pending", &["feedback_logged"]),
    ("feedback_logged", &[]),
];

const MILESTONE: &[Row] = &[
    ("upcoming", &["active"]),
    ("active", &["completed", "delayed"]),
    ("delayed", &["active", "completed"]),
    ("completed", &[]),
];

const WRITING_VERSION: &[Row] = &[
    ("draft", &["revised", "submitted"]),
    ("revised", &["submitted", "archived"]),
    ("submitted", &["archived"]),
    ("archived", &[]),
];

fn table(kind: EntityKind) -> &'static [Row] {
    match kind {
        EntityKind::OpportunityInteraction => OPPORTUNITY_INTERACTION,
        EntityKind::SupervisionSession => SUPERVISION_SESSION,
        EntityKind::Milestone => MILESTONE,
        EntityKind::WritingVersion => WRITING_VERSION,
    }
}

/// All declared states for a kind, initial state first.
pub fn states(kind: EntityKind) -> impl Iterator<Item = &'static str> {
    table(kind).iter().map(|(state, _)| *state)
}

/// The state every new entity of this kind starts in.
pub fn initial_state(kind: EntityKind) -> &'static str {
    table(kind)[0].0
}

/// Whether `state` is a member of the kind's declared state set.
pub fn is_state(kind: EntityKind, state: &str) -> bool {
    states(kind).any(|s| s == state)
}

/// States directly reachable from `current`.
///
/// Empty for terminal states and for anything the table does not declare,
/// so read-facing callers can render legal actions without duplicating
/// the table.
pub fn allowed_next_states(kind: EntityKind, current: &str) -> &'static [&'static str] {
    table(kind)
        .iter()
        .find(|(state, _)| *state == current)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

/// Whether `(from, to)` appears in the kind's transition table.
///
/// Closed world: an unrecognized `from`, an unrecognized `to`, or a pair
/// the table does not declare all answer `false`. Never panics, never logs.
pub fn can_transition(kind: EntityKind, from: &str, to: &str) -> bool {
    allowed_next_states(kind, from).contains(&to)
}

/// State holder for one stateful entity instance.
///
/// `state` and `state_entered_at` can only move together through a
/// transition check; there is no bare setter. Feature modules embed this in
/// whatever record they persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleCell {
    kind: EntityKind,
    state: &'static str,
    state_entered_at: DateTime<Utc>,
}

impl LifecycleCell {
    /// New entity at the kind's initial state.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            state: initial_state(kind),
            state_entered_at: Utc::now(),
        }
    }

    /// Rebuilds a cell from persisted columns, rejecting states outside the
    /// kind's declared set.
    pub fn restore(
        kind: EntityKind,
        state: &str,
        state_entered_at: DateTime<Utc>,
    ) -> Result<Self, WaypointError> {
        let canonical = states(kind).find(|s| *s == state).ok_or_else(|| {
            WaypointError::UnknownState {
                kind,
                state: state.to_string(),
            }
        })?;
        Ok(Self {
            kind,
            state: canonical,
            state_entered_at,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn state(&self) -> &'static str {
        self.state
    }

    pub fn state_entered_at(&self) -> DateTime<Utc> {
        self.state_entered_at
    }

    /// States this entity may move to right now.
    pub fn allowed_next(&self) -> &'static [&'static str] {
        allowed_next_states(self.kind, self.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Moves to `to` if the table allows it, stamping `state_entered_at`.
    pub fn transition_to(&mut self, to: &str) -> Result<(), WaypointError> {
        let Some(next) = self.allowed_next().iter().copied().find(|s| *s == to) else {
            return Err(WaypointError::IllegalTransition {
                kind: self.kind,
                from: self.state.to_string(),
                to: to.to_string(),
            });
        };
        self.state = next;
        self.state_entered_at = Utc::now();
        Ok(())
    }

    /// Conditional transition guarded by the previously observed state.
    ///
    /// Two concurrent callers racing from the same `expected_from` cannot
    /// both succeed: the loser sees `StateConflict` and must re-read.
    pub fn transition_from(&mut self, expected_from: &str, to: &str) -> Result<(), WaypointError> {
        if self.state != expected_from {
            return Err(WaypointError::StateConflict {
                kind: self.kind,
                expected: expected_from.to_string(),
                actual: self.state.to_string(),
            });
        }
        self.transition_to(to)
    }
}

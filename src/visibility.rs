//! Role-scoped visibility: which subjects an actor may read
//!
//! - Role: closed set, resolved once at the authentication boundary
//! - Assignments: supervisor↔subject relation, read here, written elsewhere
//! - Visibility: the subject-id scope every read path is filtered through

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Actor role. Unknown or missing roles collapse to `Subject` so a bad
/// label can never widen scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sees only their own data.
    #[default]
    Subject,
    /// Sees assigned subjects.
    Supervisor,
    /// No subject filter; consumers owe aggregation/anonymization.
    Admin,
}

impl Role {
    /// Resolves a raw role label, failing closed to `Subject`.
    ///
    /// Call this once where the actor is authenticated and carry the typed
    /// value from there; never re-parse strings deep in business logic.
    pub fn parse(raw: &str) -> Role {
        match raw.trim() {
            "supervisor" => Role::Supervisor,
            "admin" => Role::Admin,
            _ => Role::Subject,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Subject => "subject",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated caller: identity plus exactly one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn subject(id: impl Into<String>) -> Self {
        Self::new(id, Role::Subject)
    }

    pub fn supervisor(id: impl Into<String>) -> Self {
        Self::new(id, Role::Supervisor)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }
}

/// The set of subject identities an actor may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// No subject filter. Callers doing per-person reads under `All` must
    /// apply an aggregation/anonymization step before returning data; this
    /// component cannot do that for them.
    All,
    Subjects(HashSet<String>),
}

impl Visibility {
    pub fn is_all(&self) -> bool {
        matches!(self, Visibility::All)
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Subjects(ids) => ids.contains(subject_id),
        }
    }
}

/// Supervisor↔subject assignment relation, unique per pair.
///
/// Written by the administrative collaborator through `assign`/`unassign`;
/// the visibility operations only read it, uncached, so every resolution
/// reflects the relation at call time.
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    by_supervisor: Arc<DashMap<String, HashSet<String>>>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the pair; `false` if it already existed.
    pub fn assign(&self, supervisor_id: impl Into<String>, subject_id: impl Into<String>) -> bool {
        self.by_supervisor
            .entry(supervisor_id.into())
            .or_default()
            .insert(subject_id.into())
    }

    /// Removes the pair; `false` if it was absent.
    pub fn unassign(&self, supervisor_id: &str, subject_id: &str) -> bool {
        match self.by_supervisor.get_mut(supervisor_id) {
            Some(mut subjects) => subjects.remove(subject_id),
            None => false,
        }
    }

    pub fn is_assigned(&self, supervisor_id: &str, subject_id: &str) -> bool {
        self.by_supervisor
            .get(supervisor_id)
            .map(|subjects| subjects.contains(subject_id))
            .unwrap_or(false)
    }

    /// Subjects assigned to a supervisor; empty if none.
    pub fn subjects_of(&self, supervisor_id: &str) -> HashSet<String> {
        self.by_supervisor
            .get(supervisor_id)
            .map(|subjects| subjects.clone())
            .unwrap_or_default()
    }

    /// Computes the subject scope this actor may read.
    pub fn visible_to(&self, actor: &Actor) -> Visibility {
        match actor.role {
            Role::Subject => Visibility::Subjects(HashSet::from([actor.id.clone()])),
            Role::Supervisor => Visibility::Subjects(self.subjects_of(&actor.id)),
            Role::Admin => Visibility::All,
        }
    }

    /// The single authorization check for per-subject reads.
    ///
    /// True iff the actor is the subject, is an admin, or supervises the
    /// subject through an assignment.
    pub fn can_access(&self, actor: &Actor, target_subject_id: &str) -> bool {
        if actor.id == target_subject_id {
            return true;
        }
        match actor.role {
            Role::Admin => true,
            Role::Supervisor => self.is_assigned(&actor.id, target_subject_id),
            Role::Subject => false,
        }
    }
}

//! Role-scoped audit queries
//!
//! The one integration point external readers go through: every listing is
//! narrowed to the actor's visible subjects before the ledger sees the
//! filter, and every per-subject read passes the single `can_access` gate.

use std::collections::HashSet;

use crate::error::WaypointError;
use crate::event::{Event, EventFilter};
use crate::ledger::EventLedger;
use crate::limits::Page;
use crate::visibility::{Actor, Assignments, Visibility};

type Result<T> = std::result::Result<T, WaypointError>;

/// Read façade over the ledger and the visibility resolver.
#[derive(Debug, Clone)]
pub struct AuditFacade {
    ledger: EventLedger,
    assignments: Assignments,
}

impl AuditFacade {
    pub fn new(ledger: EventLedger, assignments: Assignments) -> Self {
        Self {
            ledger,
            assignments,
        }
    }

    /// Filtered listing, pre-narrowed to what the actor may see.
    ///
    /// Subjects outside the actor's scope simply drop out of the result;
    /// an out-of-scope request and a subject with no events are
    /// indistinguishable downstream, so existence of data never leaks.
    pub fn events_visible_to(
        &self,
        actor: &Actor,
        filter: &EventFilter,
        page: Page,
    ) -> Result<Vec<Event>> {
        let scoped = match self.assignments.visible_to(actor) {
            Visibility::All => filter.clone(),
            Visibility::Subjects(visible) => {
                let narrowed: HashSet<String> = match &filter.subjects {
                    Some(requested) => requested.intersection(&visible).cloned().collect(),
                    None => visible,
                };
                if narrowed.is_empty() {
                    return Ok(Vec::new());
                }
                EventFilter {
                    subjects: Some(narrowed),
                    ..filter.clone()
                }
            }
        };

        tracing::debug!(actor = %actor.id, role = %actor.role, "scoped audit query");
        self.ledger.query(&scoped, page)
    }

    /// Events about one specific subject, gated by `can_access`.
    ///
    /// Denied uniformly whether or not the subject has any data.
    pub fn events_for_subject(
        &self,
        actor: &Actor,
        subject_id: &str,
        filter: &EventFilter,
        page: Page,
    ) -> Result<Vec<Event>> {
        if !self.assignments.can_access(actor, subject_id) {
            return Err(WaypointError::Forbidden {
                subject_id: subject_id.to_string(),
            });
        }

        let scoped = EventFilter {
            subjects: Some(HashSet::from([subject_id.to_string()])),
            ..filter.clone()
        };
        self.ledger.query(&scoped, page)
    }
}

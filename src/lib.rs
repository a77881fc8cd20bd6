//! Waypoint - longitudinal progress tracking core
//!
//! Three components with real invariants, composed by a read façade:
//! - Event ledger: append-only audit facts, validated against a closed
//!   taxonomy; no update or delete exists
//! - Lifecycle engine: per-kind transition tables; anything not declared
//!   is denied
//! - Visibility resolver: role + assignments decide whose data an actor
//!   may read, failing closed
//!
//! Everything runs in-process; durable storage and wire protocols belong
//! to the host service.

pub mod audit;
pub mod error;
pub mod event;
pub mod ledger;
pub mod lifecycle;
pub mod limits;
pub mod taxonomy;
pub mod visibility;

pub use audit::AuditFacade;
pub use error::{Remedy, WaypointError};
pub use event::{Event, EventFilter, EventId};
pub use ledger::{EventDraft, EventLedger, JsonlStore, LedgerStore, MemoryStore};
pub use lifecycle::{
    allowed_next_states, can_transition, initial_state, EntityKind, LifecycleCell,
};
pub use limits::{Page, QueryLimits};
pub use taxonomy::{is_supported, with_version, EventType};
pub use visibility::{Actor, Assignments, Role, Visibility};

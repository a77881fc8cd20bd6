//! Append-only event ledger
//!
//! - Emit: validate against the taxonomy, stamp, append exactly one row
//! - No update, delete, or upsert exists on any type here
//! - Query: filtered, newest-first, paginated with a capped page size
//! - Backends: in-memory or append-only JSON lines

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::WaypointError;
use crate::event::{Event, EventFilter, EventId};
use crate::limits::{Page, QueryLimits};
use crate::taxonomy::{self, EventType, DEFAULT_METADATA_VERSION};
use crate::visibility::Role;

type Result<T> = std::result::Result<T, WaypointError>;

/// A fact under construction, not yet validated or written.
///
/// The event type is carried as a raw name and checked against the taxonomy
/// at emit time, so boundary callers holding strings and feature modules
/// holding [`EventType`] go through the same gate.
#[derive(Debug, Clone)]
pub struct EventDraft {
    subject_id: String,
    actor_role: Role,
    event_type: String,
    source_module: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    metadata: Map<String, Value>,
    metadata_version: u32,
    timestamp: Option<DateTime<Utc>>,
}

impl EventDraft {
    pub fn new(
        subject_id: impl Into<String>,
        actor_role: Role,
        event_type: impl Into<String>,
        source_module: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            actor_role,
            event_type: event_type.into(),
            source_module: source_module.into(),
            entity_type: None,
            entity_id: None,
            metadata: Map::new(),
            metadata_version: DEFAULT_METADATA_VERSION,
            timestamp: None,
        }
    }

    /// Points the fact at the domain object it concerns.
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn metadata_version(mut self, version: u32) -> Self {
        self.metadata_version = version;
        self
    }

    /// Event time. Defaults to the instant of emit when not set; the ledger
    /// never backfills it from insertion order.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Storage backend for ledger rows. Append is the only write.
pub trait LedgerStore: Send + Sync {
    /// Appends one row. A failed append must not leave a partial row.
    fn append(&self, event: Event) -> Result<()>;

    /// Reads rows matching the filter, in append order.
    fn read(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Reads every row in append order.
    fn read_all(&self) -> Result<Vec<Event>>;

    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn append(&self, event: Event) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    fn read(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn read_all(&self) -> Result<Vec<Event>> {
        Ok(self.events.read().clone())
    }

    fn len(&self) -> usize {
        self.events.read().len()
    }
}

/// Durable store: one JSON document per line, append-only, cached on open.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    cache: RwLock<Vec<Event>>,
}

impl JsonlStore {
    /// Creates or opens the file and loads the existing rows.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<Vec<Event>, _>>()?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Vec::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonlStore {
    fn append(&self, event: Event) -> Result<()> {
        let mut cache = self.cache.write();

        // Serialize before touching the file so a bad row never lands.
        let json = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;

        cache.push(event);
        Ok(())
    }

    fn read(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        Ok(self
            .cache
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn read_all(&self) -> Result<Vec<Event>> {
        Ok(self.cache.read().clone())
    }

    fn len(&self) -> usize {
        self.cache.read().len()
    }
}

/// Validated, append-only ledger of audit facts.
///
/// Cheap to clone; clones share the same store. Safe under concurrent emit:
/// each emit is one independent insert, there is no read-modify-write.
#[derive(Clone)]
pub struct EventLedger {
    store: Arc<dyn LedgerStore>,
    limits: QueryLimits,
    next_sequence: Arc<AtomicU64>,
    suppressed: Arc<AtomicU64>,
}

impl EventLedger {
    /// Ledger over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            limits: QueryLimits::default(),
            next_sequence: Arc::new(AtomicU64::new(0)),
            suppressed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ledger over an existing store; sequence numbering resumes past the
    /// stored tail.
    pub fn open(store: Arc<dyn LedgerStore>) -> Result<Self> {
        let next = store
            .read_all()?
            .iter()
            .map(|e| e.sequence + 1)
            .max()
            .unwrap_or(0);
        Ok(Self {
            store,
            limits: QueryLimits::default(),
            next_sequence: Arc::new(AtomicU64::new(next)),
            suppressed: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validates and appends exactly one fact, returning its id.
    ///
    /// Fails with `UnsupportedEventType` before anything is written. Two
    /// identical calls produce two distinct facts; deduplication, if
    /// needed, is the emitting module's concern.
    pub fn emit(&self, draft: EventDraft) -> Result<EventId> {
        let Some(event_type) = EventType::parse(&draft.event_type) else {
            return Err(WaypointError::UnsupportedEventType {
                event_type: draft.event_type,
            });
        };

        let event = Event {
            event_id: EventId::new(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            subject_id: draft.subject_id,
            actor_role: draft.actor_role,
            event_type,
            entity_type: draft.entity_type,
            entity_id: draft.entity_id,
            metadata: taxonomy::with_version(&draft.metadata, draft.metadata_version),
            timestamp: draft.timestamp.unwrap_or_else(Utc::now),
            source_module: draft.source_module,
        };

        let id = event.event_id;
        self.store.append(event)?;
        Ok(id)
    }

    /// Like [`emit`](Self::emit), but a taxonomy failure becomes `Ok(None)`
    /// instead of aborting the caller's business transaction.
    ///
    /// The suppression is counted and logged so the loss stays observable.
    /// Storage faults still propagate.
    pub fn emit_or_ignore(&self, draft: EventDraft) -> Result<Option<EventId>> {
        match self.emit(draft) {
            Ok(id) => Ok(Some(id)),
            Err(WaypointError::UnsupportedEventType { event_type }) => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%event_type, "audit event suppressed: unsupported event type");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Facts suppressed by [`emit_or_ignore`](Self::emit_or_ignore) so far.
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Filtered read, ordered by timestamp descending (sequence breaks
    /// ties), paginated with the configured cap.
    pub fn query(&self, filter: &EventFilter, page: Page) -> Result<Vec<Event>> {
        let page = page.clamped(&self.limits);
        let mut events = self.store.read(filter)?;
        events.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.sequence.cmp(&a.sequence))
        });
        Ok(events
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    /// Total number of facts in the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl std::fmt::Debug for EventLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLedger")
            .field("len", &self.len())
            .field("suppressed", &self.suppressed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::SCHEMA_VERSION_KEY;
    use serde_json::json;

    fn milestone_draft(subject: &str) -> EventDraft {
        EventDraft::new(
            subject,
            Role::Subject,
            EventType::MilestoneUpdated,
            "progress",
        )
        .entity("milestone", "m1")
    }

    #[test]
    fn emit_then_query_returns_the_fact() {
        let ledger = EventLedger::in_memory();
        let mut metadata = Map::new();
        metadata.insert("delta_days".to_string(), json!(3));

        let id = ledger
            .emit(milestone_draft("u1").metadata(metadata))
            .unwrap();

        let events = ledger
            .query(&EventFilter::for_subject("u1"), Page::default())
            .unwrap();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.event_id, id);
        assert_eq!(event.event_type, EventType::MilestoneUpdated);
        assert_eq!(event.entity_type.as_deref(), Some("milestone"));
        assert_eq!(event.entity_id.as_deref(), Some("m1"));
        assert_eq!(event.metadata["delta_days"], json!(3));
        assert_eq!(event.metadata[SCHEMA_VERSION_KEY], json!(1));
        assert_eq!(event.source_module, "progress");
        assert_eq!(event.actor_role, Role::Subject);
    }

    #[test]
    fn unsupported_type_writes_nothing() {
        let ledger = EventLedger::in_memory();
        ledger.emit(milestone_draft("u1")).unwrap();
        assert_eq!(ledger.len(), 1);

        let err = ledger
            .emit(EventDraft::new("u1", Role::Subject, "telepathy", "progress"))
            .unwrap_err();
        assert!(matches!(
            err,
            WaypointError::UnsupportedEventType { ref event_type } if event_type == "telepathy"
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn emit_or_ignore_suppresses_only_taxonomy_failures() {
        let ledger = EventLedger::in_memory();

        let id = ledger
            .emit_or_ignore(EventDraft::new("u1", Role::Subject, "nonsense", "progress"))
            .unwrap();
        assert!(id.is_none());
        assert_eq!(ledger.suppressed_count(), 1);
        assert!(ledger.is_empty());

        let id = ledger.emit_or_ignore(milestone_draft("u1")).unwrap();
        assert!(id.is_some());
        assert_eq!(ledger.suppressed_count(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn metadata_is_defensively_copied() {
        let ledger = EventLedger::in_memory();
        let mut metadata = Map::new();
        metadata.insert("note".to_string(), json!("draft sent"));

        ledger
            .emit(milestone_draft("u1").metadata(metadata.clone()))
            .unwrap();

        // The caller's map has no version tag; the stored one does.
        assert!(!metadata.contains_key(SCHEMA_VERSION_KEY));
        let events = ledger
            .query(&EventFilter::all(), Page::default())
            .unwrap();
        assert!(events[0].metadata.contains_key(SCHEMA_VERSION_KEY));
    }

    #[test]
    fn explicit_metadata_version_is_stored() {
        let ledger = EventLedger::in_memory();
        ledger
            .emit(milestone_draft("u1").metadata_version(4))
            .unwrap();

        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        assert_eq!(events[0].metadata[SCHEMA_VERSION_KEY], json!(4));
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let ledger = EventLedger::in_memory();
        let event_time = Utc::now() - chrono::Duration::days(30);

        ledger.emit(milestone_draft("u1").at(event_time)).unwrap();

        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        assert_eq!(events[0].timestamp, event_time);
    }

    #[test]
    fn two_emits_are_two_facts() {
        let ledger = EventLedger::in_memory();
        let a = ledger.emit(milestone_draft("u1")).unwrap();
        let b = ledger.emit(milestone_draft("u1")).unwrap();
        assert_ne!(a, b);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn query_orders_newest_first() {
        let ledger = EventLedger::in_memory();
        let base = Utc::now();

        for day in 1..=3 {
            ledger
                .emit(milestone_draft("u1").at(base + chrono::Duration::days(day)))
                .unwrap();
        }

        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].timestamp > events[1].timestamp);
        assert!(events[1].timestamp > events[2].timestamp);
    }

    #[test]
    fn equal_timestamps_order_by_sequence() {
        let ledger = EventLedger::in_memory();
        let t = Utc::now();

        ledger.emit(milestone_draft("u1").at(t)).unwrap();
        ledger.emit(milestone_draft("u1").at(t)).unwrap();

        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        assert!(events[0].sequence > events[1].sequence);
    }

    #[test]
    fn pagination_skips_and_takes() {
        let ledger = EventLedger::in_memory();
        let base = Utc::now();
        for day in 0..5 {
            ledger
                .emit(milestone_draft("u1").at(base + chrono::Duration::days(day)))
                .unwrap();
        }

        let page = ledger
            .query(&EventFilter::all(), Page::new(1, 2))
            .unwrap();
        assert_eq!(page.len(), 2);
        // Newest first, so offset 1 lands on day 3.
        assert_eq!(page[0].timestamp, base + chrono::Duration::days(3));
    }

    #[test]
    fn page_limit_is_capped() {
        let ledger = EventLedger::in_memory().with_limits(QueryLimits::testing());
        for _ in 0..20 {
            ledger.emit(milestone_draft("u1")).unwrap();
        }

        let page = ledger
            .query(&EventFilter::all(), Page::new(0, 10_000))
            .unwrap();
        assert_eq!(page.len(), QueryLimits::testing().max_page_size);
    }

    #[test]
    fn concurrent_emits_are_all_recorded() {
        use std::thread;

        let ledger = EventLedger::in_memory();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.emit(milestone_draft(&format!("u{i}"))).unwrap())
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.len(), 10);
        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        let mut sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), 10);
    }

    #[test]
    fn jsonl_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger").join("events.jsonl");

        let first_id;
        {
            let store = Arc::new(JsonlStore::open(&path).unwrap());
            let ledger = EventLedger::open(store).unwrap();
            first_id = ledger.emit(milestone_draft("u1")).unwrap();
        }

        let store = Arc::new(JsonlStore::open(&path).unwrap());
        let ledger = EventLedger::open(store).unwrap();
        assert_eq!(ledger.len(), 1);

        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        assert_eq!(events[0].event_id, first_id);

        // Sequence numbering resumes past the reloaded tail.
        ledger.emit(milestone_draft("u1")).unwrap();
        let events = ledger.query(&EventFilter::all(), Page::default()).unwrap();
        let max = events.iter().map(|e| e.sequence).max().unwrap();
        assert_eq!(max, 1);
    }

    #[test]
    fn jsonl_store_rejects_corrupt_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = JsonlStore::open(&path).unwrap_err();
        assert!(matches!(err, WaypointError::Serialization(_)));
    }
}

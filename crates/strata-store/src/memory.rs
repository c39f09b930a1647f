//! In-memory reference engine.
//!
//! Snapshot-consistent reads under a RwLock, per-context pending change
//! sets, and a named-store registry so two opens of the same name share
//! one store. Used by the test suites and by embedders that want the
//! client facade without durability.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use strata_core::query::ResultShape;
use strata_core::types::{FieldAccess, RecordId, Value};
use strata_core::{Result, StrataError};

use crate::engine::{
    FetchOutcome, FetchRequest, ReadContext, Record, StoreEngine, StoreHandle, StoreLocator,
    WriteContext, WriteScope,
};

// =============================================================================
// Engine
// =============================================================================

/// Behavior knobs for stores opened by a [`MemoryEngine`].
#[derive(Clone, Copy, Debug)]
pub struct MemoryOptions {
    /// When true, read contexts pick up every commit automatically; when
    /// false they serve the snapshot taken at first fetch until
    /// `discard_cache` is called.
    pub merge_on_commit: bool,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            merge_on_commit: true,
        }
    }
}

/// In-process storage engine with a registry of named stores.
///
/// Opening the same name twice yields handles onto the same store, which
/// is what lets separately constructed clients observe each other's
/// writes in tests.
pub struct MemoryEngine {
    options: MemoryOptions,
    stores: Mutex<HashMap<String, Arc<StoreCore>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_options(MemoryOptions::default())
    }

    pub fn with_options(options: MemoryOptions) -> Self {
        Self {
            options,
            stores: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreEngine for MemoryEngine {
    type Handle = MemoryStore;

    fn open_store(&self, locator: &StoreLocator) -> Result<Self::Handle> {
        match locator {
            StoreLocator::Named(name) => {
                if name.is_empty() {
                    return Err(StrataError::Open("store name is empty".to_string()));
                }
                let mut stores = self
                    .stores
                    .lock()
                    .map_err(|_| StrataError::Open("store registry poisoned".to_string()))?;
                let core = stores
                    .entry(name.clone())
                    .or_insert_with(|| Arc::new(StoreCore::new(name.clone(), self.options)));
                debug!("Opened store '{}'", name);
                Ok(MemoryStore {
                    core: Arc::clone(core),
                })
            }
            StoreLocator::Ephemeral => Ok(MemoryStore::ephemeral_with(self.options)),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

struct StoreCore {
    name: String,
    options: MemoryOptions,
    records: RwLock<BTreeMap<RecordId, MemoryRecord>>,
    next_id: AtomicU64,
    generation: AtomicU64,
}

impl StoreCore {
    fn new(name: String, options: MemoryOptions) -> Self {
        Self {
            name,
            options,
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }
}

/// Handle onto one open in-memory store.
#[derive(Clone)]
pub struct MemoryStore {
    core: Arc<StoreCore>,
}

impl MemoryStore {
    /// Open an anonymous store (for testing).
    pub fn ephemeral() -> Self {
        Self::ephemeral_with(MemoryOptions::default())
    }

    /// Open an anonymous store with explicit options.
    pub fn ephemeral_with(options: MemoryOptions) -> Self {
        Self {
            core: Arc::new(StoreCore::new("<ephemeral>".to_string(), options)),
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Commit counter; bumped once per successful commit.
    pub fn generation(&self) -> u64 {
        self.core.generation.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.core.name)
            .finish()
    }
}

impl StoreHandle for MemoryStore {
    type Record = MemoryRecord;
    type Write = MemoryWriteContext;
    type Read = MemoryReadContext;

    fn write_context(&self) -> MemoryWriteContext {
        MemoryWriteContext {
            core: Arc::clone(&self.core),
            pending: BTreeMap::new(),
            deleted: BTreeSet::new(),
        }
    }

    fn read_context(&self) -> MemoryReadContext {
        MemoryReadContext {
            core: Arc::clone(&self.core),
            cache: RwLock::new(None),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// The memory engine's record representation: a field map plus identity.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryRecord {
    id: RecordId,
    entity: String,
    fields: BTreeMap<String, Value>,
}

impl MemoryRecord {
    fn new(id: RecordId, entity: &str) -> Self {
        Self {
            id,
            entity: entity.to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// The raw field map, in the shape `ResultShape::Rows` returns.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl FieldAccess for MemoryRecord {
    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}

impl Record for MemoryRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn entity(&self) -> &str {
        &self.entity
    }

    fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Filter, sort, and slice a record iterator per `request`.
fn select<'a>(
    records: impl Iterator<Item = &'a MemoryRecord>,
    request: &FetchRequest,
) -> Vec<MemoryRecord> {
    let mut matches: Vec<MemoryRecord> = records
        .filter(|r| r.entity == request.entity)
        .filter(|r| match &request.predicate {
            Some(predicate) => predicate.matches(*r),
            None => true,
        })
        .cloned()
        .collect();

    for descriptor in request.sort.iter().rev() {
        matches.sort_by(|a, b| descriptor.order(a, b));
    }

    let offset = request.offset.unwrap_or(0).min(matches.len());
    let mut matches = matches.split_off(offset);
    if let Some(limit) = request.limit {
        matches.truncate(limit);
    }
    matches
}

fn shape_outcome(records: Vec<MemoryRecord>, shape: ResultShape) -> FetchOutcome<MemoryRecord> {
    match shape {
        ResultShape::Records => FetchOutcome::Records(records),
        ResultShape::Ids => FetchOutcome::Ids(records.iter().map(|r| r.id).collect()),
        ResultShape::Count => FetchOutcome::Count(records.len()),
        ResultShape::Rows => {
            FetchOutcome::Rows(records.into_iter().map(|r| r.fields).collect())
        }
    }
}

// =============================================================================
// Write context
// =============================================================================

/// Pending change set over one store.
///
/// `pending` holds working copies: freshly inserted records plus committed
/// records loaded by `fetch_ids`. Commit publishes deletions first, then
/// every surviving working copy, as one atomic swap under the write lock.
pub struct MemoryWriteContext {
    core: Arc<StoreCore>,
    pending: BTreeMap<RecordId, MemoryRecord>,
    deleted: BTreeSet<RecordId>,
}

impl WriteScope for MemoryWriteContext {
    type Record = MemoryRecord;

    fn insert(&mut self, entity: &str) -> RecordId {
        let id = RecordId::new(self.core.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.insert(id, MemoryRecord::new(id, entity));
        id
    }

    fn record_mut(&mut self, id: RecordId) -> Option<&mut MemoryRecord> {
        if self.deleted.contains(&id) {
            return None;
        }
        self.pending.get_mut(&id)
    }
}

impl WriteContext for MemoryWriteContext {
    fn fetch_ids(&mut self, request: &FetchRequest) -> Result<Vec<RecordId>> {
        let committed = self
            .core
            .records
            .read()
            .map_err(|_| StrataError::Store("store lock poisoned".to_string()))?;

        // This context's view: committed state, shadowed by working copies,
        // minus pending deletions.
        let visible = committed
            .iter()
            .filter(|&(id, _)| !self.pending.contains_key(id))
            .map(|(_, record)| record)
            .chain(self.pending.values())
            .filter(|record| !self.deleted.contains(&record.id));

        let selected = select(visible, request);
        drop(committed);

        let mut ids = Vec::with_capacity(selected.len());
        for record in selected {
            let id = record.id;
            // Fetched records become working copies owned by this context.
            self.pending.entry(id).or_insert(record);
            ids.push(id);
        }
        Ok(ids)
    }

    fn delete(&mut self, id: RecordId) -> Result<()> {
        self.pending.remove(&id);
        self.deleted.insert(id);
        Ok(())
    }

    fn commit(self) -> Result<()> {
        let mut records = self
            .core
            .records
            .write()
            .map_err(|_| StrataError::Store("store lock poisoned".to_string()))?;

        for id in &self.deleted {
            records.remove(id);
        }
        let applied = self.pending.len();
        for (id, record) in self.pending {
            records.insert(id, record);
        }
        drop(records);

        let generation = self.core.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(
            "Committed {} records ({} deleted) to '{}', generation {}",
            applied,
            self.deleted.len(),
            self.core.name,
            generation
        );
        Ok(())
    }

    fn rollback(self) {
        debug!(
            "Rolled back {} pending records on '{}'",
            self.pending.len(),
            self.core.name
        );
    }
}

// =============================================================================
// Read context
// =============================================================================

struct CachedView {
    generation: u64,
    records: BTreeMap<RecordId, MemoryRecord>,
}

/// Long-lived query context.
///
/// Holds a snapshot of committed state. With `merge_on_commit` the
/// snapshot is refreshed whenever the store generation moves; without it
/// the snapshot goes stale until `discard_cache`.
pub struct MemoryReadContext {
    core: Arc<StoreCore>,
    cache: RwLock<Option<CachedView>>,
}

impl ReadContext for MemoryReadContext {
    type Record = MemoryRecord;

    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome<MemoryRecord>> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| StrataError::Store("read cache poisoned".to_string()))?;

        let current = self.core.generation.load(Ordering::Acquire);
        let stale = match cache.as_ref() {
            None => true,
            Some(view) => self.core.options.merge_on_commit && view.generation != current,
        };

        let view = if stale {
            let records = self
                .core
                .records
                .read()
                .map_err(|_| StrataError::Store("store lock poisoned".to_string()))?
                .clone();
            cache.insert(CachedView {
                generation: current,
                records,
            })
        } else {
            match cache.as_mut() {
                Some(view) => view,
                None => return Err(StrataError::Store("read cache unavailable".to_string())),
            }
        };

        let selected = select(view.records.values(), request);
        Ok(shape_outcome(selected, request.shape))
    }

    fn discard_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            *cache = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_core::query::{Predicate, SortDescriptor};

    use super::*;

    fn put(store: &MemoryStore, entity: &str, id_field: i64) -> RecordId {
        let mut ctx = store.write_context();
        let id = ctx.insert(entity);
        let record = ctx.record_mut(id).unwrap();
        record.set("id", Value::Int(id_field));
        ctx.commit().unwrap();
        id
    }

    fn all_ids(store: &MemoryStore, entity: &str) -> Vec<i64> {
        let read = store.read_context();
        let request = FetchRequest {
            sort: vec![SortDescriptor::ascending("id")],
            ..FetchRequest::new(entity)
        };
        match read.fetch(&request).unwrap() {
            FetchOutcome::Records(records) => records
                .iter()
                .map(|r| match r.field("id") {
                    Some(Value::Int(v)) => v,
                    other => panic!("unexpected id field: {:?}", other),
                })
                .collect(),
            other => panic!("unexpected outcome shape: {:?}", other.shape()),
        }
    }

    #[test]
    fn test_insert_commit_fetch() {
        let store = MemoryStore::ephemeral();
        put(&store, "item", 1);
        put(&store, "item", 2);

        assert_eq!(all_ids(&store, "item"), vec![1, 2]);
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_rollback_discards_pending() {
        let store = MemoryStore::ephemeral();

        let mut ctx = store.write_context();
        let id = ctx.insert("item");
        ctx.record_mut(id).unwrap().set("id", Value::Int(9));
        ctx.rollback();

        assert!(all_ids(&store, "item").is_empty());
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_write_fetch_sees_pending_changes() {
        let store = MemoryStore::ephemeral();
        put(&store, "item", 1);
        put(&store, "item", 2);

        let mut ctx = store.write_context();
        let inserted = ctx.insert("item");
        ctx.record_mut(inserted).unwrap().set("id", Value::Int(3));

        let ids = ctx.fetch_ids(&FetchRequest::new("item")).unwrap();
        assert_eq!(ids.len(), 3);

        // Delete one and fetch again: the deletion is visible in-context.
        ctx.delete(ids[0]).unwrap();
        let remaining = ctx.fetch_ids(&FetchRequest::new("item")).unwrap();
        assert_eq!(remaining.len(), 2);

        // Nothing committed yet.
        assert_eq!(all_ids(&store, "item"), vec![1, 2]);

        ctx.commit().unwrap();
        assert_eq!(all_ids(&store, "item").len(), 2);
    }

    #[test]
    fn test_predicate_sort_offset_limit() {
        let store = MemoryStore::ephemeral();
        for n in 1..=5 {
            put(&store, "item", n);
        }

        let read = store.read_context();
        let request = FetchRequest {
            predicate: Some(Predicate::gt("id", 1i64)),
            sort: vec![SortDescriptor::descending("id")],
            offset: Some(1),
            limit: Some(2),
            ..FetchRequest::new("item")
        };
        match read.fetch(&request).unwrap() {
            FetchOutcome::Records(records) => {
                let ids: Vec<Value> = records.iter().filter_map(|r| r.field("id")).collect();
                assert_eq!(ids, vec![Value::Int(4), Value::Int(3)]);
            }
            other => panic!("unexpected outcome shape: {:?}", other.shape()),
        }
    }

    #[test]
    fn test_result_shapes() {
        let store = MemoryStore::ephemeral();
        put(&store, "item", 1);
        put(&store, "item", 2);

        let read = store.read_context();

        let count = FetchRequest {
            shape: ResultShape::Count,
            ..FetchRequest::new("item")
        };
        assert!(matches!(read.fetch(&count).unwrap(), FetchOutcome::Count(2)));

        let ids = FetchRequest {
            shape: ResultShape::Ids,
            ..FetchRequest::new("item")
        };
        match read.fetch(&ids).unwrap() {
            FetchOutcome::Ids(ids) => assert_eq!(ids.len(), 2),
            other => panic!("unexpected outcome shape: {:?}", other.shape()),
        }

        let rows = FetchRequest {
            shape: ResultShape::Rows,
            ..FetchRequest::new("item")
        };
        match read.fetch(&rows).unwrap() {
            FetchOutcome::Rows(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
            }
            other => panic!("unexpected outcome shape: {:?}", other.shape()),
        }
    }

    #[test]
    fn test_entities_are_disjoint() {
        let store = MemoryStore::ephemeral();
        put(&store, "item", 1);
        put(&store, "other", 2);

        assert_eq!(all_ids(&store, "item"), vec![1]);
        assert_eq!(all_ids(&store, "other"), vec![2]);
    }

    #[test]
    fn test_stale_read_until_discard() {
        let store = MemoryStore::ephemeral_with(MemoryOptions {
            merge_on_commit: false,
        });
        let read = store.read_context();

        put(&store, "item", 1);
        // Snapshot taken here.
        assert_eq!(read.fetch(&FetchRequest::new("item")).unwrap().len(), 1);

        put(&store, "item", 2);
        // Still serving the old snapshot.
        assert_eq!(read.fetch(&FetchRequest::new("item")).unwrap().len(), 1);

        read.discard_cache();
        assert_eq!(read.fetch(&FetchRequest::new("item")).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_on_commit_tracks_writes() {
        let store = MemoryStore::ephemeral();
        let read = store.read_context();

        assert_eq!(read.fetch(&FetchRequest::new("item")).unwrap().len(), 0);
        put(&store, "item", 1);
        assert_eq!(read.fetch(&FetchRequest::new("item")).unwrap().len(), 1);
    }

    #[test]
    fn test_named_stores_are_shared() {
        let engine = MemoryEngine::new();
        let locator = StoreLocator::named("shared");

        let a = engine.open_store(&locator).unwrap();
        let b = engine.open_store(&locator).unwrap();
        put(&a, "item", 1);

        assert_eq!(all_ids(&b, "item"), vec![1]);

        let other = engine.open_store(&StoreLocator::Ephemeral).unwrap();
        assert!(all_ids(&other, "item").is_empty());
    }

    #[test]
    fn test_open_rejects_empty_name() {
        let engine = MemoryEngine::new();
        let err = engine
            .open_store(&StoreLocator::named(""))
            .err()
            .expect("empty name must be rejected");
        assert!(matches!(err, StrataError::Open(_)));
    }
}

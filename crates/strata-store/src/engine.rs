//! The storage engine boundary.
//!
//! Everything the client facade needs from a backend is expressed here:
//! open a store by locator, lease a write context per mutation, hold one
//! long-lived read context for queries. The engine owns query execution,
//! the on-disk format, and change tracking; this crate only names the
//! seams.

use std::collections::BTreeMap;

use strata_core::query::{Predicate, ResultShape, SortDescriptor};
use strata_core::types::{FieldAccess, RecordId, Value};
use strata_core::Result;

// =============================================================================
// Records
// =============================================================================

/// An engine-native mutable entity.
///
/// A record obtained from a write context belongs to that context and is
/// only meaningful within its scope; committed state is reached through
/// fetches, never by holding a record across contexts.
pub trait Record: FieldAccess + Send + 'static {
    /// Engine-assigned identity, stable across contexts of one store.
    fn id(&self) -> RecordId;

    /// The entity kind this record belongs to.
    fn entity(&self) -> &str;

    /// Set the named field.
    fn set(&mut self, field: &str, value: Value);
}

// =============================================================================
// Fetch requests
// =============================================================================

/// A fully configured fetch against one entity kind.
///
/// Defaults mirror the engine's own: no filter, engine-native order, no
/// limit or offset, record-shaped results, lazy materialization allowed.
/// `batch_size`, `prefetch`, and `lazy_records` are hints; an engine that
/// cannot honor them returns correct results anyway.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub entity: String,
    pub predicate: Option<Predicate>,
    pub sort: Vec<SortDescriptor>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub batch_size: Option<usize>,
    pub prefetch: Vec<String>,
    pub shape: ResultShape,
    pub lazy_records: bool,
}

impl FetchRequest {
    /// A request for every record of `entity`, engine defaults throughout.
    pub fn new(entity: impl Into<String>) -> Self {
        FetchRequest {
            entity: entity.into(),
            predicate: None,
            sort: Vec::new(),
            limit: None,
            offset: None,
            batch_size: None,
            prefetch: Vec::new(),
            shape: ResultShape::Records,
            lazy_records: true,
        }
    }
}

/// What a fetch produced, per the request's `shape`.
#[derive(Clone, Debug)]
pub enum FetchOutcome<R> {
    Records(Vec<R>),
    Ids(Vec<RecordId>),
    Count(usize),
    Rows(Vec<BTreeMap<String, Value>>),
}

impl<R> FetchOutcome<R> {
    /// The shape this outcome carries.
    pub fn shape(&self) -> ResultShape {
        match self {
            FetchOutcome::Records(_) => ResultShape::Records,
            FetchOutcome::Ids(_) => ResultShape::Ids,
            FetchOutcome::Count(_) => ResultShape::Count,
            FetchOutcome::Rows(_) => ResultShape::Rows,
        }
    }

    /// Number of results (the count itself for `Count`).
    pub fn len(&self) -> usize {
        match self {
            FetchOutcome::Records(r) => r.len(),
            FetchOutcome::Ids(i) => i.len(),
            FetchOutcome::Count(n) => *n,
            FetchOutcome::Rows(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// Record allocation and access inside a write context.
///
/// Split out from `WriteContext` so mappers can be handed a narrow
/// `&mut dyn WriteScope` that cannot commit, roll back, or outlive the
/// operation that leased it.
pub trait WriteScope {
    type Record: Record;

    /// Allocate a new empty record of `entity` in the pending change set.
    fn insert(&mut self, entity: &str) -> RecordId;

    /// Mutable access to a pending or previously fetched record.
    fn record_mut(&mut self, id: RecordId) -> Option<&mut Self::Record>;
}

/// A single-operation mutation scope.
///
/// Leased from a handle, used once, then consumed by `commit` or
/// `rollback`. Fetches reflect committed state merged with this context's
/// own pending inserts, updates, and deletes. A failed commit discards the
/// pending change set; nothing is partially applied.
pub trait WriteContext: WriteScope + Send {
    /// Ids of records matching `request`, loading them into this context.
    fn fetch_ids(&mut self, request: &FetchRequest) -> Result<Vec<RecordId>>;

    /// Mark a record for deletion. Deleting an id that is already gone is
    /// a no-op.
    fn delete(&mut self, id: RecordId) -> Result<()>;

    /// Atomically publish the pending change set.
    fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Discard the pending change set.
    fn rollback(self)
    where
        Self: Sized;
}

/// A long-lived query context observing committed state only.
///
/// May lag behind commits until `discard_cache` is called or the engine's
/// merge-on-commit notification fires; each fetch still sees one
/// consistent snapshot.
pub trait ReadContext: Send + Sync {
    type Record: Record;

    /// Execute a fetch and materialize it in the request's shape.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome<Self::Record>>;

    /// Drop any cached object graph so the next fetch re-reads the store.
    fn discard_cache(&self);
}

// =============================================================================
// Stores
// =============================================================================

/// A shared, cheaply clonable reference to one open store.
///
/// Contexts are per-operation leases over the same underlying store; the
/// handle itself carries no mutable state of its own.
pub trait StoreHandle: Send + Sync + 'static {
    type Record: Record;
    type Write: WriteContext<Record = Self::Record>;
    type Read: ReadContext<Record = Self::Record>;

    /// Lease a fresh write context. One per write operation.
    fn write_context(&self) -> Self::Write;

    /// Create a read context. Callers keep it for the life of the client.
    fn read_context(&self) -> Self::Read;
}

/// How an engine resolves a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocator {
    /// A named store; the engine maps the name to a location and schema.
    Named(String),
    /// An anonymous throwaway store.
    Ephemeral,
}

impl StoreLocator {
    pub fn named(name: impl Into<String>) -> Self {
        StoreLocator::Named(name.into())
    }
}

/// A storage backend capable of opening stores.
///
/// Open failures are ordinary errors: callers may retry, pick another
/// locator, or fall back to an ephemeral store.
pub trait StoreEngine {
    type Handle: StoreHandle;

    fn open_store(&self, locator: &StoreLocator) -> Result<Self::Handle>;
}

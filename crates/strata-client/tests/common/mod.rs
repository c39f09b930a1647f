//! Shared fixtures: a domain item, its mapper, and client constructors
//! over ephemeral memory stores.

use std::sync::mpsc;
use std::time::Duration;

use strata_client::{ClientFactory, Completion, RecordMapper, StoreClient};
use strata_core::types::{FieldAccess, RecordId, Value};
use strata_core::{Result, StrataError};
use strata_store::engine::{Record, WriteScope};
use strata_store::memory::{MemoryRecord, MemoryStore};

pub const ENTITY: &str = "test_item";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestItem {
    pub id: i64,
    pub name: String,
}

impl TestItem {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: format!("item-{}", id),
        }
    }
}

/// Maps `TestItem` onto the memory engine's records. Rejects negative ids
/// so tests can provoke a mapping failure mid-batch.
pub struct TestMapper;

impl RecordMapper for TestMapper {
    type Item = TestItem;
    type Record = MemoryRecord;

    fn entity(&self) -> &str {
        ENTITY
    }

    fn to_record(
        &self,
        item: &TestItem,
        scope: &mut dyn WriteScope<Record = MemoryRecord>,
    ) -> Result<RecordId> {
        if item.id < 0 {
            return Err(StrataError::Mapping(format!(
                "id must be non-negative, got {}",
                item.id
            )));
        }
        let id = scope.insert(ENTITY);
        let record = scope
            .record_mut(id)
            .ok_or_else(|| StrataError::Mapping(format!("record {} vanished from scope", id)))?;
        record.set("id", Value::Int(item.id));
        record.set("name", Value::Text(item.name.clone()));
        Ok(id)
    }

    fn to_item(&self, record: &MemoryRecord) -> Result<TestItem> {
        let id = match record.field("id") {
            Some(Value::Int(v)) => v,
            other => {
                return Err(StrataError::Mapping(format!(
                    "unexpected id field: {:?}",
                    other
                )))
            }
        };
        let name = match record.field("name") {
            Some(Value::Text(v)) => v,
            other => {
                return Err(StrataError::Mapping(format!(
                    "unexpected name field: {:?}",
                    other
                )))
            }
        };
        Ok(TestItem { id, name })
    }
}

pub type TestClient = StoreClient<MemoryStore, TestMapper>;

/// A client over a fresh ephemeral store, plus a handle onto the same
/// store for out-of-band verification.
pub fn make_client() -> (MemoryStore, TestClient) {
    let store = MemoryStore::ephemeral();
    let client = ClientFactory::new()
        .from_handle(store.clone(), TestMapper)
        .expect("client construction failed");
    (store, client)
}

pub fn test_data() -> Vec<TestItem> {
    (1..=5).map(TestItem::new).collect()
}

/// Run a callback-form write and block on its completion.
pub fn wait_for<F>(op: F) -> Result<()>
where
    F: FnOnce(Completion),
{
    let (tx, rx) = mpsc::channel();
    op(Box::new(move |result| {
        tx.send(result).ok();
    }));
    rx.recv_timeout(Duration::from_secs(5))
        .expect("write completion timed out")
}

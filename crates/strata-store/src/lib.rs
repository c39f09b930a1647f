//! Strata store crate - the engine boundary and the bundled memory engine.
//!
//! `engine` defines the narrow contract a storage backend must satisfy
//! (open a store, lease write/read contexts, execute fetches, commit or
//! roll back). `memory` is the reference in-process backend used by tests
//! and embedders that do not need durability.

pub mod engine;
pub mod memory;

pub use engine::{
    FetchOutcome, FetchRequest, ReadContext, Record, StoreEngine, StoreHandle, StoreLocator,
    WriteContext, WriteScope,
};
pub use memory::{MemoryEngine, MemoryOptions, MemoryRecord, MemoryStore};

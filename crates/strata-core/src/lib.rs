//! Strata core crate - shared types, errors, and configuration.
//!
//! Defines the value and query model that crosses the client/engine
//! boundary (Value, RecordId, Predicate, FetchSpec), the top-level
//! error type, and TOML-backed configuration.

pub mod config;
pub mod error;
pub mod query;
pub mod types;

pub use config::StrataConfig;
pub use error::{Result, StrataError};
pub use query::{CompareOp, FetchSpec, Predicate, ResultShape, SortDescriptor};
pub use types::{FieldAccess, RecordId, Value};

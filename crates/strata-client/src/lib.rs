//! Strata client crate - the persistence facade.
//!
//! Wraps any engine satisfying the strata-store boundary behind a typed
//! CRUD client: map domain items to records, serialize writes through one
//! confined executor, read through a long-lived view context. Offered in
//! a completion-callback form ([`PersistClient`]) and an async form
//! ([`AsyncPersistClient`]); both are implemented by [`StoreClient`].

pub mod async_client;
pub mod client;
pub mod factory;
pub mod mapper;

mod dispatcher;
mod request;

pub use async_client::AsyncPersistClient;
pub use client::{Completion, PersistClient, StoreClient, UpdateFn};
pub use factory::ClientFactory;
pub use mapper::RecordMapper;

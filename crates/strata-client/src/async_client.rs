//! The async form of the persistence facade.
//!
//! A thin one-shot bridge over the callback client: each write suspends
//! the caller until the underlying completion fires, then resumes with
//! the result. Resolution happens exactly once (success, operation
//! error, or a `Dispatch` error when the writer is unreachable), never
//! zero times and never twice.
//!
//! Dropping the returned future does NOT cancel the write. The operation
//! is already queued on the write executor and runs to completion;
//! cancellation only abandons the caller's interest in the outcome.

use async_trait::async_trait;
use tokio::sync::oneshot;

use strata_core::query::{FetchSpec, Predicate};
use strata_core::{Result, StrataError};
use strata_store::engine::{Record, StoreHandle};

use crate::client::{Completion, PersistClient, StoreClient, UpdateFn};
use crate::mapper::RecordMapper;

/// The suspending form of the persistence facade. Contracts are identical
/// to [`PersistClient`]; only the completion style differs.
#[async_trait]
pub trait AsyncPersistClient {
    type Item: Send + 'static;
    type Record: Record;

    /// Persist a batch of items, all-or-nothing.
    async fn save_all(&self, items: Vec<Self::Item>) -> Result<()>;

    /// Fetch items matching `predicate`, tuned by `spec`.
    async fn get_items(
        &self,
        predicate: Option<&Predicate>,
        spec: Option<&FetchSpec>,
    ) -> Result<Vec<Self::Item>>;

    /// Delete every record matching `predicate`.
    async fn delete_items(&self, predicate: Predicate) -> Result<()>;

    /// Delete every record of the bound entity.
    async fn delete_all(&self) -> Result<()>;

    /// Mutate the FIRST record matching `predicate`; see
    /// [`PersistClient::update_item`] for the single-match policy.
    async fn update_item(&self, predicate: Predicate, update: UpdateFn<Self::Record>)
        -> Result<()>;

    /// Discard the view context's cached object graph.
    fn refresh_view_context(&self);

    /// Fetch the first item matching `predicate`.
    async fn get_item(&self, predicate: Option<&Predicate>) -> Result<Option<Self::Item>> {
        let spec = FetchSpec::with_limit(1);
        Ok(self
            .get_items(predicate, Some(&spec))
            .await?
            .into_iter()
            .next())
    }

    /// Persist a single item.
    async fn save(&self, item: Self::Item) -> Result<()> {
        self.save_all(vec![item]).await
    }
}

/// Suspend on a completion produced by `submit`, resolving exactly once.
async fn bridge<F>(submit: F) -> Result<()>
where
    F: FnOnce(Completion),
{
    let (tx, rx) = oneshot::channel();
    submit(Box::new(move |result| {
        // The caller may have been cancelled; the write has still run.
        let _ = tx.send(result);
    }));
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(StrataError::Dispatch(
            "completion channel closed".to_string(),
        )),
    }
}

#[async_trait]
impl<H, M> AsyncPersistClient for StoreClient<H, M>
where
    H: StoreHandle,
    M: RecordMapper<Record = H::Record>,
{
    type Item = M::Item;
    type Record = H::Record;

    async fn save_all(&self, items: Vec<M::Item>) -> Result<()> {
        bridge(|done| PersistClient::save_all(self, items, Some(done))).await
    }

    async fn get_items(
        &self,
        predicate: Option<&Predicate>,
        spec: Option<&FetchSpec>,
    ) -> Result<Vec<M::Item>> {
        // Reads execute inline on the caller's task; there is no callback
        // to suspend on.
        PersistClient::get_items(self, predicate, spec)
    }

    async fn delete_items(&self, predicate: Predicate) -> Result<()> {
        bridge(|done| PersistClient::delete_items(self, predicate, Some(done))).await
    }

    async fn delete_all(&self) -> Result<()> {
        bridge(|done| PersistClient::delete_all(self, Some(done))).await
    }

    async fn update_item(
        &self,
        predicate: Predicate,
        update: UpdateFn<H::Record>,
    ) -> Result<()> {
        bridge(|done| PersistClient::update_item(self, predicate, update, Some(done))).await
    }

    fn refresh_view_context(&self) {
        PersistClient::refresh_view_context(self);
    }
}

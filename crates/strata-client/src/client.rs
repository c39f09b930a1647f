//! The completion-callback persistence client.
//!
//! Every write operation leases a private write context on the confined
//! executor, runs to commit or rollback, and reports through its
//! completion exactly once. Reads run on the caller's thread against the
//! long-lived view context and return `Result`: a fetch failure is an
//! error, so an empty collection always means "no matches".

use std::sync::Arc;

use tracing::{debug, error};

use strata_core::config::ClientSettings;
use strata_core::query::{FetchSpec, Predicate};
use strata_core::{Result, StrataError};
use strata_store::engine::{
    FetchOutcome, FetchRequest, ReadContext, Record, StoreHandle, WriteContext, WriteScope,
};

use crate::dispatcher::{WriteDispatcher, WriteJob};
use crate::mapper::RecordMapper;
use crate::request::make_fetch_request;

/// One-shot write completion, invoked from the writer thread.
pub type Completion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// In-place record mutation applied by [`PersistClient::update_item`].
pub type UpdateFn<R> = Box<dyn FnOnce(&mut R) + Send + 'static>;

/// The callback form of the persistence facade.
///
/// Writes are fire-and-report: they enqueue onto the client's single write
/// executor (FIFO relative to each other) and invoke the completion once
/// finished. Reads are synchronous on the calling thread.
pub trait PersistClient {
    type Item: Send + 'static;
    type Record: Record;

    /// Persist a batch of items, all-or-nothing. A mapping or commit
    /// failure rolls back the entire batch.
    fn save_all(&self, items: Vec<Self::Item>, completion: Option<Completion>);

    /// Fetch items matching `predicate`, tuned by `spec`.
    fn get_items(
        &self,
        predicate: Option<&Predicate>,
        spec: Option<&FetchSpec>,
    ) -> Result<Vec<Self::Item>>;

    /// Delete every record matching `predicate`. One transaction, one
    /// commit; matching ids are fetched in batches to bound memory.
    fn delete_items(&self, predicate: Predicate, completion: Option<Completion>);

    /// Delete every record of the bound entity. Succeeds (as a no-op) on
    /// an empty store.
    fn delete_all(&self, completion: Option<Completion>);

    /// Mutate the FIRST record matching `predicate`.
    ///
    /// Single-match by policy: if the predicate matches several records,
    /// exactly one (the first the engine returns) is updated and the
    /// rest are left untouched. Zero matches commit as a successful no-op.
    fn update_item(
        &self,
        predicate: Predicate,
        update: UpdateFn<Self::Record>,
        completion: Option<Completion>,
    );

    /// Discard the view context's cached object graph so subsequent reads
    /// observe the latest committed state.
    fn refresh_view_context(&self);

    /// Fetch a single item, whichever the engine returns first.
    fn get_item(&self) -> Result<Option<Self::Item>> {
        let spec = FetchSpec::with_limit(1);
        Ok(self.get_items(None, Some(&spec))?.into_iter().next())
    }

    /// Persist a single item.
    fn save(&self, item: Self::Item, completion: Option<Completion>) {
        self.save_all(vec![item], completion);
    }
}

/// Generic client implementation over any engine handle and mapper.
///
/// Cheap to share behind an `Arc`; dropping the last clone drains the
/// write queue before returning.
pub struct StoreClient<H, M>
where
    H: StoreHandle,
    M: RecordMapper<Record = H::Record>,
{
    mapper: Arc<M>,
    read: H::Read,
    dispatcher: WriteDispatcher<H>,
    delete_batch_size: usize,
}

impl<H, M> StoreClient<H, M>
where
    H: StoreHandle,
    M: RecordMapper<Record = H::Record>,
{
    pub(crate) fn build(handle: H, mapper: M, settings: &ClientSettings) -> Result<Self> {
        let handle = Arc::new(handle);
        let read = handle.read_context();
        let dispatcher = WriteDispatcher::spawn(Arc::clone(&handle))?;
        Ok(Self {
            mapper: Arc::new(mapper),
            read,
            dispatcher,
            // A zero batch would fetch nothing and silently delete nothing.
            delete_batch_size: settings.delete_batch_size.max(1),
        })
    }

    /// Enqueue a write op and guarantee its completion resolves exactly
    /// once, including when the writer is unreachable.
    fn dispatch_write<F>(&self, completion: Option<Completion>, op: F)
    where
        F: FnOnce(&H) -> Result<()> + Send + 'static,
    {
        let job: WriteJob<H> = Box::new(move |handle| {
            let result = match handle {
                Some(handle) => op(handle),
                None => Err(StrataError::Dispatch(
                    "write executor terminated".to_string(),
                )),
            };
            if let Some(done) = completion {
                done(result);
            }
        });
        self.dispatcher.submit(job);
    }
}

impl<H, M> PersistClient for StoreClient<H, M>
where
    H: StoreHandle,
    M: RecordMapper<Record = H::Record>,
{
    type Item = M::Item;
    type Record = H::Record;

    fn save_all(&self, items: Vec<M::Item>, completion: Option<Completion>) {
        let mapper = Arc::clone(&self.mapper);
        self.dispatch_write(completion, move |handle| {
            let count = items.len();
            let mut ctx = handle.write_context();

            for item in &items {
                if let Err(e) = mapper.to_record(item, &mut ctx) {
                    ctx.rollback();
                    error!("Storing {} items failed while mapping: {}", count, e);
                    return Err(e);
                }
            }

            match ctx.commit() {
                Ok(()) => {
                    debug!("Saved {} records", count);
                    Ok(())
                }
                Err(e) => {
                    error!("Storing {} items failed: {}", count, e);
                    Err(e)
                }
            }
        });
    }

    fn get_items(
        &self,
        predicate: Option<&Predicate>,
        spec: Option<&FetchSpec>,
    ) -> Result<Vec<M::Item>> {
        let request = make_fetch_request(self.mapper.entity(), predicate.cloned(), spec);

        let outcome = match self.read.fetch(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Fetching failed: {}", e);
                return Err(e);
            }
        };

        match outcome {
            FetchOutcome::Records(records) => {
                debug!("Retrieved {} records", records.len());
                records.iter().map(|r| self.mapper.to_item(r)).collect()
            }
            other => Err(StrataError::Mapping(format!(
                "fetch produced {:?} results, expected records",
                other.shape()
            ))),
        }
    }

    fn delete_items(&self, predicate: Predicate, completion: Option<Completion>) {
        let entity = self.mapper.entity().to_string();
        let batch_size = self.delete_batch_size;
        self.dispatch_write(completion, move |handle| {
            let mut ctx = handle.write_context();
            let mut request = FetchRequest::new(&entity);
            request.predicate = Some(predicate);
            request.limit = Some(batch_size);

            let mut removed = 0usize;
            loop {
                // Pending deletions are visible to the context's own
                // fetches, so each round returns the next batch.
                let ids = match ctx.fetch_ids(&request) {
                    Ok(ids) => ids,
                    Err(e) => {
                        ctx.rollback();
                        error!("Deleting items failed while fetching: {}", e);
                        return Err(e);
                    }
                };
                if ids.is_empty() {
                    break;
                }
                for id in ids {
                    if let Err(e) = ctx.delete(id) {
                        ctx.rollback();
                        error!("Deleting record {} failed: {}", id, e);
                        return Err(e);
                    }
                    removed += 1;
                }
            }

            match ctx.commit() {
                Ok(()) => {
                    debug!("Deleted {} records via predicate", removed);
                    Ok(())
                }
                Err(e) => {
                    error!("Deleting items failed: {}", e);
                    Err(e)
                }
            }
        });
    }

    fn delete_all(&self, completion: Option<Completion>) {
        debug!("Clearing all '{}' records", self.mapper.entity());
        self.delete_items(Predicate::True, completion);
    }

    fn update_item(
        &self,
        predicate: Predicate,
        update: UpdateFn<H::Record>,
        completion: Option<Completion>,
    ) {
        let entity = self.mapper.entity().to_string();
        self.dispatch_write(completion, move |handle| {
            let mut ctx = handle.write_context();
            let mut request = FetchRequest::new(&entity);
            request.predicate = Some(predicate);
            request.limit = Some(1);

            let ids = match ctx.fetch_ids(&request) {
                Ok(ids) => ids,
                Err(e) => {
                    ctx.rollback();
                    error!("Updating item failed while fetching: {}", e);
                    return Err(e);
                }
            };

            if let Some(id) = ids.into_iter().next() {
                match ctx.record_mut(id) {
                    Some(record) => update(record),
                    None => {
                        ctx.rollback();
                        let e = StrataError::Store(format!("fetched record {} is not loaded", id));
                        error!("Updating item failed: {}", e);
                        return Err(e);
                    }
                }
            }

            match ctx.commit() {
                Ok(()) => {
                    debug!("Item updated");
                    Ok(())
                }
                Err(e) => {
                    error!("Updating item failed: {}", e);
                    Err(e)
                }
            }
        });
    }

    fn refresh_view_context(&self) {
        self.read.discard_cache();
        debug!("View context refreshed");
    }
}

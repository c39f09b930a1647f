//! The confined write executor.
//!
//! One dedicated thread per client owns the store handle for write
//! purposes; jobs are boxed closures delivered FIFO over a channel, so all
//! writes on a client are serialized and ordered relative to each other.
//! Dropping the dispatcher closes the channel; the worker drains whatever
//! is already queued, then exits and is joined.

use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use strata_store::engine::StoreHandle;

/// A unit of write work. Invoked with `Some(handle)` on the writer thread,
/// or with `None` when the writer is unreachable so the job can resolve
/// its completion with an error instead of never resolving.
pub(crate) type WriteJob<H> = Box<dyn FnOnce(Option<&H>) + Send + 'static>;

pub(crate) struct WriteDispatcher<H: StoreHandle> {
    sender: Option<mpsc::UnboundedSender<WriteJob<H>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<H: StoreHandle> WriteDispatcher<H> {
    pub(crate) fn spawn(handle: Arc<H>) -> strata_core::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob<H>>();

        let worker = thread::Builder::new()
            .name("strata-writer".to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job(Some(handle.as_ref()));
                }
                debug!("Write executor drained");
            })
            .map_err(|e| {
                strata_core::StrataError::Dispatch(format!(
                    "Failed to spawn writer thread: {}",
                    e
                ))
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Enqueue a job. If the writer is gone the job still runs, on the
    /// caller's thread with no handle, so its completion fires exactly once.
    pub(crate) fn submit(&self, job: WriteJob<H>) {
        match &self.sender {
            Some(sender) => {
                if let Err(mpsc::error::SendError(job)) = sender.send(job) {
                    warn!("Write executor terminated; failing submitted job");
                    job(None);
                }
            }
            None => job(None),
        }
    }
}

impl<H: StoreHandle> Drop for WriteDispatcher<H> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Writer thread panicked");
            }
        }
    }
}

//! Fetch request assembly.
//!
//! Applies a `FetchSpec` on top of a base request, one field at a time and
//! only when present, so an absent field keeps the engine default and an
//! absent spec leaves the base request untouched apart from the predicate.

use strata_core::query::{FetchSpec, Predicate};
use strata_store::engine::FetchRequest;

pub(crate) struct FetchRequestBuilder {
    request: FetchRequest,
}

impl FetchRequestBuilder {
    pub(crate) fn new(request: FetchRequest) -> Self {
        Self { request }
    }

    pub(crate) fn apply(mut self, spec: &FetchSpec) -> Self {
        if let Some(sort) = &spec.sort {
            self.request.sort = sort.clone();
        }
        if let Some(limit) = spec.limit {
            self.request.limit = Some(limit);
        }
        if let Some(offset) = spec.offset {
            self.request.offset = Some(offset);
        }
        if let Some(batch_size) = spec.batch_size {
            self.request.batch_size = Some(batch_size);
        }
        if let Some(prefetch) = &spec.prefetch {
            self.request.prefetch = prefetch.clone();
        }
        if let Some(shape) = spec.shape {
            self.request.shape = shape;
        }
        if let Some(lazy) = spec.lazy_records {
            self.request.lazy_records = lazy;
        }
        self
    }

    pub(crate) fn build(self) -> FetchRequest {
        self.request
    }
}

/// Assemble the request for one client operation.
pub(crate) fn make_fetch_request(
    entity: &str,
    predicate: Option<Predicate>,
    spec: Option<&FetchSpec>,
) -> FetchRequest {
    let mut base = FetchRequest::new(entity);
    base.predicate = predicate;

    match spec {
        None => base,
        Some(spec) => FetchRequestBuilder::new(base).apply(spec).build(),
    }
}

use strata_core::types::RecordId;
use strata_core::Result;
use strata_store::engine::{Record, WriteScope};

/// Bidirectional converter between a domain item and an engine record.
///
/// Mappers are stateless: both directions are pure field translation, and
/// `to_record` must not hold onto the write scope beyond the call (the
/// borrow makes that structural). Round-trip invariant: converting an item
/// to a record and back yields an item equal on every mapped field.
///
/// Mapping failures are ordinary errors. A failed mapping inside a batched
/// write rolls the whole batch back.
pub trait RecordMapper: Send + Sync + 'static {
    type Item: Send + 'static;
    type Record: Record;

    /// The entity kind this mapper, and any client built on it, is bound to.
    fn entity(&self) -> &str;

    /// Materialize `item` as a new record in the write scope's pending
    /// change set. Does not commit.
    fn to_record(
        &self,
        item: &Self::Item,
        scope: &mut dyn WriteScope<Record = Self::Record>,
    ) -> Result<RecordId>;

    /// Convert a fetched record back into a domain item.
    ///
    /// Must not trigger additional store round-trips; everything needed has
    /// to be readable off the record itself.
    fn to_item(&self, record: &Self::Record) -> Result<Self::Item>;
}

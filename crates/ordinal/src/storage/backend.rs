use async_trait::async_trait;
use ordinal_api::{OrderedRecord, Scope};

use crate::storage::types::{Result, StoreError};

/// Queries and writes against one scope, all inside a single atomic unit.
///
/// "Key" queries only consider records whose key is set. Ties between equal
/// keys resolve by id so every backend answers the same way.
pub trait ScopeTxn {
    /// Record with the smallest key
    fn find_min_key(&mut self, exclude_id: Option<&str>) -> Result<Option<OrderedRecord>>;

    /// Record with the largest key
    fn find_max_key(&mut self, exclude_id: Option<&str>) -> Result<Option<OrderedRecord>>;

    /// Record with the smallest key strictly greater than `key`
    fn find_by_key_greater_than(
        &mut self,
        key: &str,
        exclude_id: Option<&str>,
    ) -> Result<Option<OrderedRecord>>;

    fn find_by_id(&mut self, id: &str) -> Result<Option<OrderedRecord>>;

    /// Records without a key, in the backend's stable fallback order (creation order)
    fn find_unkeyed(&mut self) -> Result<Vec<OrderedRecord>>;

    /// Set the key of one record. Returns false when the record does not exist.
    fn write_key(&mut self, id: &str, key: &str) -> Result<bool>;

    fn insert(&mut self, id: &str, key: Option<&str>) -> Result<()>;
}

/// Persistence for sortable records.
///
/// Implementations use interior mutability and must be thread-safe.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Run `f` against `scope` as one atomic unit.
    ///
    /// Either everything `f` wrote becomes visible, or (when `f` or the commit
    /// fails) nothing does.
    async fn atomically<R, E, F>(&self, scope: &Scope, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static;

    /// Run `f` against `scope` as a consistent read.
    ///
    /// Takes no write lock. Anything `f` writes is discarded.
    async fn read<R, E, F>(&self, scope: &Scope, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static;

    /// All records of `scope`: key ascending, unkeyed last, ties by id
    async fn list_ordered(&self, scope: &Scope) -> Result<Vec<OrderedRecord>>;
}

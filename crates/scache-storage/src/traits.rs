//! The storage contract.

use async_trait::async_trait;
use scache_core::{Index, OrderBys, Record};

use crate::StorageResult;
use crate::types::UpdatePayload;

/// The authoritative store behind a cache engine.
///
/// Implementations must be thread-safe (`Send + Sync`). Lookups report a
/// missing record as `Ok(None)` or by leaving it out of the returned list;
/// errors are for infrastructure and validation failures only.
///
/// `list` does not need to preserve input order or length: the cache engine
/// owns those semantics.
#[async_trait]
pub trait StorageAdapter<T: Record>: Send + Sync {
    // ==================== Mutations ====================

    /// Inserts a new record. Backends may assign an id to a record whose id
    /// is null.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the id is taken.
    async fn create(&self, record: &mut T) -> StorageResult<()>;

    /// Updates the record if its id exists, creates it otherwise.
    async fn save(&self, record: &mut T) -> StorageResult<()>;

    /// Applies `changes` to the record with `id`; returns affected rows.
    async fn update(&self, id: &T::Id, changes: &UpdatePayload<T>) -> StorageResult<u64>;

    /// Deletes the records with `ids`; returns affected rows.
    async fn delete(&self, ids: &[T::Id]) -> StorageResult<u64>;

    // ==================== Lookups ====================

    async fn get(&self, id: &T::Id) -> StorageResult<Option<T>>;

    async fn list(&self, ids: &[T::Id]) -> StorageResult<Vec<T>>;

    /// Returns the first record matching every field of `index`.
    async fn get_by(&self, index: &Index) -> StorageResult<Option<T>>;

    /// Returns every record matching `index`, sorted by `order_by`.
    async fn list_by(&self, index: &Index, order_by: &OrderBys) -> StorageResult<Vec<T>>;

    /// Returns the whole table.
    async fn list_all(&self) -> StorageResult<Vec<T>>;

    /// Returns the records whose integer `field` is one of `values`.
    async fn list_by_unique_ints(&self, field: &str, values: &[i64]) -> StorageResult<Vec<T>>;

    /// Returns the records whose string `field` is one of `values`.
    async fn list_by_unique_strs(&self, field: &str, values: &[String])
    -> StorageResult<Vec<T>>;

    // ==================== Lifecycle ====================

    /// Releases backend clients.
    async fn close(&self) -> StorageResult<()>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

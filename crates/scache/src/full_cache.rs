//! Whole-table mirror engine.

use std::sync::Arc;

use scache_core::{CacheNamespace, Index, OrderBys, Record, RecordId, unique_strings};
use scache_storage::{DynStorage, UpdatePayload};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::index_cache::IndexCache;
use crate::kv::{CacheEntry, HashStore, KvBackend, KvOptions};
use crate::metrics::{self, kinds};

const UNIQUE_BATCH_UNSUPPORTED: &str =
    "batch unique lookups are not offered by the full-table cache, use list_all and filter in memory";

/// Keeps a complete copy of one table in a single hash.
///
/// The hash lives under `prefix/table/full`, one member per record keyed by
/// the stringified id. The hash existing means the mirror is loaded; the
/// first read that finds it missing loads the whole table. One TTL governs
/// the whole mirror and is reset on every read.
///
/// Writes go to the store and then straight into the mirror (when it is
/// loaded) instead of invalidating it. Secondary index entries touched by a
/// write are dropped.
pub struct FullTableCache<T: Record> {
    namespace: CacheNamespace,
    storage: DynStorage<T>,
    mirror: HashStore<T>,
    index: IndexCache<T::Id>,
}

impl<T: Record> FullTableCache<T> {
    pub fn new(
        namespace: CacheNamespace,
        storage: DynStorage<T>,
        backend: KvBackend,
        options: KvOptions,
    ) -> Self {
        Self {
            namespace,
            storage,
            mirror: HashStore::new(backend.clone(), options),
            index: IndexCache::new(backend, options),
        }
    }

    pub fn from_config(
        config: &CacheConfig,
        table: impl Into<String>,
        id_field: impl Into<String>,
        storage: DynStorage<T>,
        backend: KvBackend,
    ) -> Self {
        let namespace = CacheNamespace::new(config.prefix.clone(), table, id_field);
        Self::new(namespace, storage, backend, KvOptions::from(config))
    }

    pub fn namespace(&self) -> &CacheNamespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut CacheNamespace {
        &mut self.namespace
    }

    pub fn storage(&self) -> &DynStorage<T> {
        &self.storage
    }

    /// Key of the mirror hash.
    pub fn cache_key(&self) -> String {
        self.namespace.full_key()
    }

    pub async fn close(&self) -> CacheResult<()> {
        Ok(self.storage.close().await?)
    }

    fn table(&self) -> &str {
        self.namespace.table()
    }

    /// Writes the store's current table over the mirror and sets a fresh
    /// TTL. Returns the number of records loaded.
    ///
    /// Members are overwritten in place, so a write that lands while the
    /// table is being read survives the load. Rows removed outside the cache
    /// linger until [`clear_cache`](Self::clear_cache) or expiry. An empty
    /// table writes nothing, so the next read loads again.
    pub async fn load(&self) -> CacheResult<usize> {
        let rows = self.storage.list_all().await?;
        let key = self.cache_key();
        self.mirror.set_with_ttl(&key, &rows).await?;
        metrics::record_full_load(self.table());
        tracing::info!(table = %self.table(), key = %key, rows = rows.len(), "full-table mirror loaded");
        Ok(rows.len())
    }

    /// Loads the mirror if it is missing, otherwise resets its TTL.
    async fn ensure_loaded(&self, key: &str) -> CacheResult<()> {
        if self.mirror.exists(key).await? {
            metrics::record_hit(self.table(), kinds::FULL);
            self.mirror.refresh(key).await
        } else {
            tracing::debug!(key = %key, "full-table mirror missing");
            metrics::record_miss(self.table(), kinds::FULL);
            self.load().await.map(|_| ())
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Returns the record for `id`.
    ///
    /// A member miss loads the table only when the mirror itself is
    /// missing; a loaded mirror is complete, so the record does not exist.
    pub async fn get(&self, id: &T::Id) -> CacheResult<Option<T>> {
        let key = self.cache_key();
        if let Some(record) = self.mirror.get(&key, id).await? {
            metrics::record_hit(self.table(), kinds::FULL);
            self.mirror.refresh(&key).await?;
            return Ok(Some(record));
        }
        if self.mirror.exists(&key).await? {
            metrics::record_negative_hit(self.table());
            self.mirror.refresh(&key).await?;
            return Ok(None);
        }
        metrics::record_miss(self.table(), kinds::FULL);
        self.load().await?;
        self.mirror.get(&key, id).await
    }

    /// Returns the records for `ids` in input order, skipping unknown ids.
    pub async fn list(&self, ids: &[T::Id]) -> CacheResult<Vec<T>> {
        let key = self.cache_key();
        self.ensure_loaded(&key).await?;
        self.mirror.multi_get(&key, ids).await
    }

    /// Returns every record of the table, in no particular order.
    pub async fn list_all(&self) -> CacheResult<Vec<T>> {
        let key = self.cache_key();
        self.ensure_loaded(&key).await?;
        self.mirror.get_all(&key).await
    }

    /// Returns the record a unique index resolves to, read from the mirror.
    pub async fn get_by(&self, index: &Index) -> CacheResult<Option<T>> {
        let key = self.namespace.make_cache_key(index);
        match self.index.get_unique(&key).await? {
            Some(CacheEntry::Absent) => {
                metrics::record_negative_hit(self.table());
                Ok(None)
            }
            Some(CacheEntry::Present(id)) => {
                metrics::record_hit(self.table(), kinds::UNIQUE);
                self.index.refresh(&[key]).await?;
                self.get(&id).await
            }
            None => {
                tracing::debug!(key = %key, "index miss");
                metrics::record_miss(self.table(), kinds::UNIQUE);
                let found = self.storage.get_by(index).await?;
                self.index
                    .set_unique(&key, found.as_ref().map(|r| r.id()).as_ref())
                    .await?;
                Ok(found)
            }
        }
    }

    /// Returns the records a multi index resolves to, read from the mirror.
    pub async fn list_by(&self, index: &Index, order_by: &OrderBys) -> CacheResult<Vec<T>> {
        let key = self.namespace.make_cache_key(index);
        match self.index.get_multi(&key).await? {
            Some(CacheEntry::Absent) => {
                metrics::record_negative_hit(self.table());
                Ok(Vec::new())
            }
            Some(CacheEntry::Present(ids)) => {
                metrics::record_hit(self.table(), kinds::MULTI);
                self.index.refresh(&[key]).await?;
                self.list(&ids).await
            }
            None => {
                tracing::debug!(key = %key, order_by = %order_by, "index miss");
                metrics::record_miss(self.table(), kinds::MULTI);
                let rows = self.storage.list_by(index, order_by).await?;
                let ids: Vec<T::Id> = rows.iter().map(Record::id).collect();
                self.index.set_multi(&key, &ids).await?;
                Ok(rows)
            }
        }
    }

    /// Always fails with [`CacheError::Unsupported`].
    pub async fn list_by_unique_ints(&self, _field: &str, _values: &[i64]) -> CacheResult<Vec<T>> {
        Err(CacheError::unsupported(UNIQUE_BATCH_UNSUPPORTED))
    }

    /// Always fails with [`CacheError::Unsupported`].
    pub async fn list_by_unique_strs(
        &self,
        _field: &str,
        _values: &[String],
    ) -> CacheResult<Vec<T>> {
        Err(CacheError::unsupported(UNIQUE_BATCH_UNSUPPORTED))
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Inserts `record` and writes it into the mirror.
    pub async fn create(&self, record: &mut T) -> CacheResult<()> {
        self.storage.create(record).await?;
        self.write_through(std::slice::from_ref(record), &[]).await
    }

    /// Creates `record` if its id is null or unknown, otherwise replaces it,
    /// then writes it into the mirror.
    pub async fn save(&self, record: &mut T) -> CacheResult<()> {
        let id = record.id();
        let previous = if id.is_null() {
            None
        } else {
            self.get(&id).await?
        };
        match previous {
            Some(_) => self.storage.save(record).await?,
            None => self.storage.create(record).await?,
        }
        let stale: Vec<T> = previous.into_iter().collect();
        self.write_through(std::slice::from_ref(record), &stale).await
    }

    /// Applies `changes` to the record with `id` and mirrors the result.
    /// A null id is a no-op returning 0.
    pub async fn update(&self, id: &T::Id, changes: &UpdatePayload<T>) -> CacheResult<u64> {
        if id.is_null() {
            return Ok(0);
        }
        let previous = self.get(id).await?;
        let affected_rows = self.storage.update(id, changes).await?;
        let stale: Vec<T> = previous.into_iter().collect();
        match self.storage.get(id).await? {
            Some(current) => self.write_through(&[current], &stale).await?,
            None => self.remove_through(std::slice::from_ref(id), &stale).await?,
        }
        Ok(affected_rows)
    }

    /// Deletes the records for `ids` and removes them from the mirror.
    pub async fn delete(&self, ids: &[T::Id]) -> CacheResult<u64> {
        let existing = self.list(ids).await?;
        let deleted = self.storage.delete(ids).await?;
        self.remove_through(ids, &existing).await?;
        Ok(deleted)
    }

    /// Drops the whole mirror; the next read reloads the table.
    pub async fn clear_cache(&self) -> CacheResult<bool> {
        let key = self.cache_key();
        let removed = self.mirror.delete_key(&key).await?;
        tracing::debug!(key = %key, removed, "full-table mirror cleared");
        metrics::record_invalidation(self.table(), usize::from(removed));
        Ok(removed)
    }

    /// Writes `records` into a loaded mirror and drops the index keys of
    /// `records` and `stale`.
    async fn write_through(&self, records: &[T], stale: &[T]) -> CacheResult<()> {
        self.mirror_set(records, stale)
            .await
            .inspect_err(|e| self.warn_mirror_failure(e))
    }

    /// Removes `ids` from the mirror and drops the index keys of `stale`.
    async fn remove_through(&self, ids: &[T::Id], stale: &[T]) -> CacheResult<()> {
        self.mirror_remove(ids, stale)
            .await
            .inspect_err(|e| self.warn_mirror_failure(e))
    }

    async fn mirror_set(&self, records: &[T], stale: &[T]) -> CacheResult<()> {
        let key = self.cache_key();
        if self.mirror.exists(&key).await? {
            self.mirror.set(&key, records).await?;
        }
        self.clear_index_keys(records.iter().chain(stale)).await
    }

    async fn mirror_remove(&self, ids: &[T::Id], stale: &[T]) -> CacheResult<()> {
        self.mirror.delete(&self.cache_key(), ids).await?;
        self.clear_index_keys(stale.iter()).await
    }

    async fn clear_index_keys<'a>(&self, records: impl Iterator<Item = &'a T>) -> CacheResult<()>
    where
        T: 'a,
    {
        let keys: Vec<String> = records
            .flat_map(|r| r.indexes())
            .map(|index| self.namespace.make_cache_key(&index))
            .collect();
        let keys = unique_strings(keys);
        if keys.is_empty() {
            return Ok(());
        }
        self.index.delete(&keys).await?;
        metrics::record_invalidation(self.table(), keys.len());
        Ok(())
    }

    fn warn_mirror_failure(&self, error: &CacheError) {
        tracing::warn!(
            table = %self.table(),
            error = %error,
            "store write succeeded but mirror update failed"
        );
    }
}

impl<T: Record> Clone for FullTableCache<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            storage: Arc::clone(&self.storage),
            mirror: self.mirror.clone(),
            index: self.index.clone(),
        }
    }
}

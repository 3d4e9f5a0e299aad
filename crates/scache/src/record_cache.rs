//! Per-record cache-aside engine.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use scache_core::{CacheNamespace, Index, OrderBys, Record, RecordId, Scalar, unique_strings};
use scache_storage::{DynStorage, StorageResult, UpdatePayload};

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::index_cache::IndexCache;
use crate::kv::{CacheEntry, KvBackend, KvOptions, KvStore};
use crate::metrics::{self, kinds};

/// Cache-aside engine that caches records one key per id.
///
/// ## Reads
///
/// Reads consult the cache first and fall back to the store on a miss,
/// caching what they find. Ids the store does not know are cached as
/// negative entries so repeated lookups do not reach the store. Every read
/// hit resets the entry's TTL.
///
/// ## Writes
///
/// Writes go to the store first, then delete every cache key the affected
/// records map to: the primary key and each secondary index, for both the
/// old and the new image. Nothing is repopulated eagerly.
///
/// If the store write succeeds but the invalidation fails, the invalidation
/// error is returned. The store holds the new data; the cache may serve
/// stale values until the entries expire.
pub struct RecordCache<T: Record> {
    namespace: CacheNamespace,
    storage: DynStorage<T>,
    records: KvStore<T>,
    index: IndexCache<T::Id>,
}

impl<T: Record> RecordCache<T> {
    pub fn new(
        namespace: CacheNamespace,
        storage: DynStorage<T>,
        backend: KvBackend,
        options: KvOptions,
    ) -> Self {
        Self {
            namespace,
            storage,
            records: KvStore::new(backend.clone(), options),
            index: IndexCache::new(backend, options),
        }
    }

    /// Builds an engine for `table` using the prefix, TTL and timeout of
    /// `config`.
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

    /// Closes the underlying store.
    pub async fn close(&self) -> CacheResult<()> {
        Ok(self.storage.close().await?)
    }

    fn table(&self) -> &str {
        self.namespace.table()
    }

    /// Every key `record` can be cached under.
    fn record_keys(&self, record: &T) -> Vec<String> {
        let mut keys = vec![self.namespace.id_key(&record.id())];
        keys.extend(
            record
                .indexes()
                .iter()
                .map(|index| self.namespace.make_cache_key(index)),
        );
        keys
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Returns the record for `id`, or `None` if the store has none.
    pub async fn get(&self, id: &T::Id) -> CacheResult<Option<T>> {
        let key = self.namespace.id_key(id);
        match self.records.get(&key).await? {
            Some(CacheEntry::Present(record)) => {
                tracing::debug!(key = %key, "cache hit");
                metrics::record_hit(self.table(), kinds::RECORD);
                self.records.refresh(&[key]).await?;
                Ok(Some(record))
            }
            Some(CacheEntry::Absent) => {
                tracing::debug!(key = %key, "negative cache hit");
                metrics::record_negative_hit(self.table());
                Ok(None)
            }
            None => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_miss(self.table(), kinds::RECORD);
                match self.storage.get(id).await? {
                    Some(record) => {
                        self.records.set(&key, &record).await?;
                        Ok(Some(record))
                    }
                    None => {
                        self.records.set_null(&key).await?;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Returns one record per id, in input order.
    ///
    /// The result always has `ids.len()` entries. Ids the store does not
    /// know yield `T::default()` at their position.
    pub async fn list(&self, ids: &[T::Id]) -> CacheResult<Vec<T>> {
        let keys: Vec<String> = ids.iter().map(|id| self.namespace.id_key(id)).collect();
        let cached = self.records.multi_get(&keys).await?;

        let hit_keys: Vec<String> = keys
            .iter()
            .zip(&cached.entries)
            .filter(|(_, entry)| entry.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        metrics::record_hits(self.table(), kinds::RECORD, hit_keys.len());
        metrics::record_misses(self.table(), kinds::RECORD, cached.missing.len());
        self.records.refresh(&hit_keys).await?;

        let mut result: Vec<T> = cached
            .entries
            .into_iter()
            .map(|entry| entry.and_then(CacheEntry::into_present).unwrap_or_default())
            .collect();
        if cached.missing.is_empty() {
            return Ok(result);
        }

        // Every position a missed id occupies; an id may repeat.
        let mut positions: HashMap<T::Id, Vec<usize>> = HashMap::new();
        let mut missed_ids = Vec::new();
        for &pos in &cached.missing {
            let id = &ids[pos];
            positions
                .entry(id.clone())
                .or_insert_with(|| {
                    missed_ids.push(id.clone());
                    Vec::new()
                })
                .push(pos);
        }
        tracing::debug!(
            table = %self.table(),
            missed = missed_ids.len(),
            "batch cache miss"
        );

        let found = self.storage.list(&missed_ids).await?;
        let mut to_cache = Vec::with_capacity(found.len());
        for record in found {
            let id = record.id();
            let Some(slots) = positions.remove(&id) else {
                continue;
            };
            for &pos in &slots {
                result[pos] = record.clone();
            }
            to_cache.push((keys[slots[0]].clone(), record));
        }
        let absent: Vec<String> = missed_ids
            .iter()
            .filter_map(|id| positions.get(id).map(|slots| keys[slots[0]].clone()))
            .collect();

        self.records
            .multi_set(to_cache.iter().map(|(key, record)| (key.clone(), record)))
            .await?;
        self.records.multi_set_null(&absent).await?;
        Ok(result)
    }

    /// Returns the record a unique index resolves to.
    ///
    /// On a miss only the index → id mapping is cached; the record's own
    /// entry is left alone, so a following [`get`](Self::get) may miss.
    pub async fn get_by(&self, index: &Index) -> CacheResult<Option<T>> {
        let key = self.namespace.make_cache_key(index);
        match self.index.get_unique(&key).await? {
            Some(CacheEntry::Absent) => {
                tracing::debug!(key = %key, "negative index hit");
                metrics::record_negative_hit(self.table());
                Ok(None)
            }
            Some(CacheEntry::Present(id)) => {
                tracing::debug!(key = %key, "index hit");
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

    /// Returns the records a multi index resolves to.
    ///
    /// On a hit the cached id list goes through [`list`](Self::list), so
    /// ids deleted since yield zero-valued entries. On a miss the store is
    /// queried with `order_by` and the id order is cached.
    pub async fn list_by(&self, index: &Index, order_by: &OrderBys) -> CacheResult<Vec<T>> {
        let key = self.namespace.make_cache_key(index);
        match self.index.get_multi(&key).await? {
            Some(CacheEntry::Absent) => {
                metrics::record_negative_hit(self.table());
                Ok(Vec::new())
            }
            Some(CacheEntry::Present(ids)) => {
                tracing::debug!(key = %key, ids = ids.len(), "index hit");
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

    /// Resolves a unique integer index over `field` for many values.
    ///
    /// `key_of` extracts the field's value from a record. If every value's
    /// index entry is cached the ids are loaded through
    /// [`list`](Self::list); otherwise the whole batch is queried from the
    /// store and every entry is rewritten.
    pub async fn list_by_unique_ints<K>(
        &self,
        field: &str,
        values: &[i64],
        key_of: K,
    ) -> CacheResult<Vec<T>>
    where
        K: Fn(&T) -> i64,
    {
        self.list_by_unique(field, values, key_of, || {
            self.storage.list_by_unique_ints(field, values)
        })
        .await
    }

    /// String counterpart of [`list_by_unique_ints`](Self::list_by_unique_ints).
    pub async fn list_by_unique_strs<K>(
        &self,
        field: &str,
        values: &[String],
        key_of: K,
    ) -> CacheResult<Vec<T>>
    where
        K: Fn(&T) -> String,
    {
        self.list_by_unique(field, values, key_of, || {
            self.storage.list_by_unique_strs(field, values)
        })
        .await
    }

    async fn list_by_unique<V, K, F, Fut>(
        &self,
        field: &str,
        values: &[V],
        key_of: K,
        query: F,
    ) -> CacheResult<Vec<T>>
    where
        V: Clone + Eq + Hash + Into<Scalar>,
        K: Fn(&T) -> V,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<Vec<T>>>,
    {
        let keys: Vec<String> = values
            .iter()
            .map(|v| self.namespace.make_cache_key(&Index::new(field, v.clone())))
            .collect();

        if let Some(entries) = self.index.multi_get_unique(&keys).await? {
            metrics::record_hits(self.table(), kinds::UNIQUE, keys.len());
            self.index.refresh(&keys).await?;
            let ids: Vec<T::Id> = entries
                .into_iter()
                .filter_map(CacheEntry::into_present)
                .collect();
            let records = self.list(&ids).await?;
            return Ok(records.into_iter().filter(|r| !r.id().is_null()).collect());
        }

        tracing::debug!(
            table = %self.table(),
            field,
            values = values.len(),
            "unique batch miss, querying store"
        );
        metrics::record_misses(self.table(), kinds::UNIQUE, keys.len());
        let rows = query().await?;
        let by_value: HashMap<V, T::Id> = rows.iter().map(|r| (key_of(r), r.id())).collect();
        let entries = values
            .iter()
            .zip(keys)
            .map(|(value, key)| (key, by_value.get(value).cloned()))
            .collect();
        self.index.multi_set_unique(entries).await?;
        Ok(rows)
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Inserts `record` and drops its cache keys.
    pub async fn create(&self, record: &mut T) -> CacheResult<()> {
        self.storage.create(record).await?;
        self.invalidate(std::slice::from_ref(record)).await
    }

    /// Creates `record` if its id is null or unknown, otherwise replaces
    /// it. Drops the keys of both the previous and the new image.
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
        let mut affected = vec![record.clone()];
        affected.extend(previous);
        self.invalidate(&affected).await
    }

    /// Applies `changes` to the record with `id`, returning the affected
    /// row count. A null or unknown id is a no-op returning 0.
    pub async fn update(&self, id: &T::Id, changes: &UpdatePayload<T>) -> CacheResult<u64> {
        if id.is_null() {
            return Ok(0);
        }
        let Some(previous) = self.get(id).await? else {
            return Ok(0);
        };
        let affected_rows = self.storage.update(id, changes).await?;
        let current = self.storage.get(id).await?;

        let mut affected = vec![previous];
        affected.extend(current);
        self.invalidate(&affected).await?;
        Ok(affected_rows)
    }

    /// Deletes the records for `ids`, returning the deleted count.
    pub async fn delete(&self, ids: &[T::Id]) -> CacheResult<u64> {
        let existing: Vec<T> = self
            .list(ids)
            .await?
            .into_iter()
            .filter(|r| !r.id().is_null())
            .collect();
        let deleted = self.storage.delete(ids).await?;
        self.invalidate(&existing).await?;
        Ok(deleted)
    }

    /// Deletes the primary and every secondary index key of `records` in
    /// one batch, returning how many keys existed.
    pub async fn clear_cache(&self, records: &[T]) -> CacheResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let keys = unique_strings(records.iter().flat_map(|r| self.record_keys(r)).collect());
        let removed = self.records.delete(&keys).await?;
        tracing::debug!(table = %self.table(), keys = keys.len(), removed, "cache cleared");
        metrics::record_invalidation(self.table(), keys.len());
        Ok(removed)
    }

    async fn invalidate(&self, records: &[T]) -> CacheResult<()> {
        if let Err(e) = self.clear_cache(records).await {
            tracing::warn!(
                table = %self.table(),
                error = %e,
                "store write succeeded but cache invalidation failed"
            );
            return Err(e);
        }
        Ok(())
    }
}

impl<T: Record> Clone for RecordCache<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            storage: Arc::clone(&self.storage),
            records: self.records.clone(),
            index: self.index.clone(),
        }
    }
}

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scache::{CacheNamespace, FullTableCache, KvBackend, KvOptions, RecordCache};
use scache_core::{Index, Indexes, OrderBys, Record};
use scache_db_memory::InMemoryStorage;
use scache_storage::{StorageAdapter, StorageResult, UpdatePayload};
use tokio::sync::Notify;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub id: String,
    pub name: String,
    pub category: i64,
    pub code: i64,
}

impl Record for Commodity {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn indexes(&self) -> Indexes {
        vec![
            Index::new("name", self.name.clone()),
            Index::new("category", self.category),
            Index::new("code", self.code),
        ]
    }
}

pub fn commodity(id: &str, category: i64) -> Commodity {
    Commodity {
        id: id.to_string(),
        name: format!("commodity-{id}"),
        category,
        code: 0,
    }
}

pub fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn namespace() -> CacheNamespace {
    CacheNamespace::new("test", "commodity", "id")
}

pub fn record_cache_with(
    records: Vec<Commodity>,
    ttl: Duration,
) -> (Arc<InMemoryStorage<Commodity>>, RecordCache<Commodity>) {
    record_cache_on(KvBackend::new_local(), KvOptions::default().with_ttl(ttl), records)
}

pub fn record_cache_on(
    backend: KvBackend,
    options: KvOptions,
    records: Vec<Commodity>,
) -> (Arc<InMemoryStorage<Commodity>>, RecordCache<Commodity>) {
    let storage = Arc::new(InMemoryStorage::with_records("commodity", records));
    let cache = RecordCache::new(namespace(), storage.clone(), backend, options);
    (storage, cache)
}

pub fn record_cache(
    records: Vec<Commodity>,
) -> (Arc<InMemoryStorage<Commodity>>, RecordCache<Commodity>) {
    record_cache_with(records, Duration::from_secs(60))
}

pub fn full_cache(
    records: Vec<Commodity>,
) -> (Arc<InMemoryStorage<Commodity>>, FullTableCache<Commodity>) {
    full_cache_on(
        KvBackend::new_local(),
        KvOptions::default().with_ttl(Duration::from_secs(60)),
        records,
    )
}

pub fn full_cache_on(
    backend: KvBackend,
    options: KvOptions,
    records: Vec<Commodity>,
) -> (Arc<InMemoryStorage<Commodity>>, FullTableCache<Commodity>) {
    let storage = Arc::new(InMemoryStorage::with_records("commodity", records));
    let cache = FullTableCache::new(namespace(), storage.clone(), backend, options);
    (storage, cache)
}

/// Options with a short per-call timeout for the unreachable backend.
pub fn unreachable_options() -> KvOptions {
    KvOptions::default().with_op_timeout(Duration::from_secs(5))
}

/// KV backend whose pool points at a closed port, so every cache call
/// fails with a transport error.
pub fn unreachable_backend() -> KvBackend {
    let pool = deadpool_redis::Config::from_url("redis://127.0.0.1:1")
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    KvBackend::new_redis(pool)
}

/// Store wrapper that can hold `list_all` after its snapshot is taken
/// until [`GatedStorage::release`] is called.
#[derive(Debug)]
pub struct GatedStorage {
    inner: Arc<InMemoryStorage<Commodity>>,
    armed: AtomicBool,
    snapshot_taken: Notify,
    released: Notify,
}

impl GatedStorage {
    pub fn new(inner: Arc<InMemoryStorage<Commodity>>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            snapshot_taken: Notify::new(),
            released: Notify::new(),
        }
    }

    /// Makes the next `list_all` wait after reading the table.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Waits until an armed `list_all` has its snapshot.
    pub async fn snapshot_taken(&self) {
        self.snapshot_taken.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl StorageAdapter<Commodity> for GatedStorage {
    async fn create(&self, record: &mut Commodity) -> StorageResult<()> {
        self.inner.create(record).await
    }

    async fn save(&self, record: &mut Commodity) -> StorageResult<()> {
        self.inner.save(record).await
    }

    async fn update(
        &self,
        id: &String,
        changes: &UpdatePayload<Commodity>,
    ) -> StorageResult<u64> {
        self.inner.update(id, changes).await
    }

    async fn delete(&self, ids: &[String]) -> StorageResult<u64> {
        self.inner.delete(ids).await
    }

    async fn get(&self, id: &String) -> StorageResult<Option<Commodity>> {
        self.inner.get(id).await
    }

    async fn list(&self, ids: &[String]) -> StorageResult<Vec<Commodity>> {
        self.inner.list(ids).await
    }

    async fn get_by(&self, index: &Index) -> StorageResult<Option<Commodity>> {
        self.inner.get_by(index).await
    }

    async fn list_by(&self, index: &Index, order_by: &OrderBys) -> StorageResult<Vec<Commodity>> {
        self.inner.list_by(index, order_by).await
    }

    async fn list_all(&self) -> StorageResult<Vec<Commodity>> {
        let rows = self.inner.list_all().await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.snapshot_taken.notify_one();
            self.released.notified().await;
        }
        Ok(rows)
    }

    async fn list_by_unique_ints(&self, field: &str, values: &[i64]) -> StorageResult<Vec<Commodity>> {
        self.inner.list_by_unique_ints(field, values).await
    }

    async fn list_by_unique_strs(
        &self,
        field: &str,
        values: &[String],
    ) -> StorageResult<Vec<Commodity>> {
        self.inner.list_by_unique_strs(field, values).await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

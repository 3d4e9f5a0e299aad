use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use scache_core::{Index, OrderBys, Record, RecordId};
use scache_storage::{StorageAdapter, StorageError, StorageResult, UpdatePayload};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::query::{compare_documents, lookup_path, matches_index, set_path};

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct StorageStats {
    creates: AtomicU64,
    saves: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    gets: AtomicU64,
    lists: AtomicU64,
    get_bys: AtomicU64,
    list_bys: AtomicU64,
    list_alls: AtomicU64,
    list_by_uniques: AtomicU64,
    closes: AtomicU64,
}

/// A point-in-time copy of [`StorageStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub creates: u64,
    pub saves: u64,
    pub updates: u64,
    pub deletes: u64,
    pub gets: u64,
    pub lists: u64,
    pub get_bys: u64,
    pub list_bys: u64,
    pub list_alls: u64,
    pub list_by_uniques: u64,
    pub closes: u64,
}

impl StatsSnapshot {
    /// Total number of read queries.
    pub fn reads(&self) -> u64 {
        self.gets + self.lists + self.get_bys + self.list_bys + self.list_alls + self.list_by_uniques
    }
}

impl StorageStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            lists: self.lists.load(Ordering::Relaxed),
            get_bys: self.get_bys.load(Ordering::Relaxed),
            list_bys: self.list_bys.load(Ordering::Relaxed),
            list_alls: self.list_alls.load(Ordering::Relaxed),
            list_by_uniques: self.list_by_uniques.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.creates,
            &self.saves,
            &self.updates,
            &self.deletes,
            &self.gets,
            &self.lists,
            &self.get_bys,
            &self.list_bys,
            &self.list_alls,
            &self.list_by_uniques,
            &self.closes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// In-memory record store.
///
/// Records are kept in insertion order. Index and order fields are resolved
/// against the serde JSON form of each record, so field names are the
/// serialized names and dotted paths reach into nested values.
#[derive(Debug)]
pub struct InMemoryStorage<T: Record> {
    table: String,
    data: RwLock<IndexMap<T::Id, T>>,
    stats: StorageStats,
    offline: AtomicBool,
}

impl<T: Record> InMemoryStorage<T> {
    /// Creates an empty store for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            data: RwLock::new(IndexMap::new()),
            stats: StorageStats::default(),
            offline: AtomicBool::new(false),
        }
    }

    /// Creates a store pre-populated with `records`, without counting calls.
    pub fn with_records(table: impl Into<String>, records: impl IntoIterator<Item = T>) -> Self {
        let mut storage = Self::new(table);
        let data = records.into_iter().map(|r| (r.id(), r)).collect();
        storage.data = RwLock::new(data);
        storage
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Makes every subsequent call fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::connection_error(format!(
                "in-memory store '{}' is offline",
                self.table
            )));
        }
        Ok(())
    }

    fn id_text(id: &T::Id) -> String {
        scache_core::stringify(&id.to_scalar(), "")
    }

    async fn filter(&self, predicate: impl Fn(&Value) -> bool) -> StorageResult<Vec<(Value, T)>> {
        let data = self.data.read().await;
        let mut matched = Vec::new();
        for record in data.values() {
            let doc = serde_json::to_value(record)?;
            if predicate(&doc) {
                matched.push((doc, record.clone()));
            }
        }
        Ok(matched)
    }

    fn apply(record: &T, changes: &UpdatePayload<T>) -> StorageResult<T> {
        match changes {
            UpdatePayload::FullReplace(replacement) => Ok(replacement.clone()),
            UpdatePayload::PartialFields(fields) => {
                let mut doc = serde_json::to_value(record)?;
                for (path, value) in fields {
                    set_path(&mut doc, path, value.clone());
                }
                Ok(serde_json::from_value(doc)?)
            }
        }
    }
}

#[async_trait]
impl<T: Record> StorageAdapter<T> for InMemoryStorage<T> {
    async fn create(&self, record: &mut T) -> StorageResult<()> {
        StorageStats::bump(&self.stats.creates);
        self.check_online()?;
        let id = record.id();
        if id.is_null() {
            return Err(StorageError::invalid_record(format!(
                "cannot create a record in '{}' without an id",
                self.table
            )));
        }
        let mut data = self.data.write().await;
        if data.contains_key(&id) {
            return Err(StorageError::already_exists(&self.table, Self::id_text(&id)));
        }
        data.insert(id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &mut T) -> StorageResult<()> {
        StorageStats::bump(&self.stats.saves);
        self.check_online()?;
        let id = record.id();
        if id.is_null() {
            return Err(StorageError::invalid_record(format!(
                "cannot save a record in '{}' without an id",
                self.table
            )));
        }
        self.data.write().await.insert(id, record.clone());
        Ok(())
    }

    async fn update(&self, id: &T::Id, changes: &UpdatePayload<T>) -> StorageResult<u64> {
        StorageStats::bump(&self.stats.updates);
        self.check_online()?;
        if changes.is_empty() {
            return Ok(0);
        }
        let mut data = self.data.write().await;
        let Some(current) = data.get(id) else {
            return Ok(0);
        };
        let updated = Self::apply(current, changes)?;
        data.insert(id.clone(), updated);
        Ok(1)
    }

    async fn delete(&self, ids: &[T::Id]) -> StorageResult<u64> {
        StorageStats::bump(&self.stats.deletes);
        self.check_online()?;
        let mut data = self.data.write().await;
        let removed = ids
            .iter()
            .filter(|id| data.shift_remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn get(&self, id: &T::Id) -> StorageResult<Option<T>> {
        StorageStats::bump(&self.stats.gets);
        self.check_online()?;
        Ok(self.data.read().await.get(id).cloned())
    }

    async fn list(&self, ids: &[T::Id]) -> StorageResult<Vec<T>> {
        StorageStats::bump(&self.stats.lists);
        self.check_online()?;
        let data = self.data.read().await;
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    async fn get_by(&self, index: &Index) -> StorageResult<Option<T>> {
        StorageStats::bump(&self.stats.get_bys);
        self.check_online()?;
        let matched = self.filter(|doc| matches_index(doc, index)).await?;
        Ok(matched.into_iter().next().map(|(_, record)| record))
    }

    async fn list_by(&self, index: &Index, order_by: &OrderBys) -> StorageResult<Vec<T>> {
        StorageStats::bump(&self.stats.list_bys);
        self.check_online()?;
        let mut matched = self.filter(|doc| matches_index(doc, index)).await?;
        matched.sort_by(|(a, _), (b, _)| compare_documents(a, b, order_by));
        Ok(matched.into_iter().map(|(_, record)| record).collect())
    }

    async fn list_all(&self) -> StorageResult<Vec<T>> {
        StorageStats::bump(&self.stats.list_alls);
        self.check_online()?;
        Ok(self.data.read().await.values().cloned().collect())
    }

    async fn list_by_unique_ints(&self, field: &str, values: &[i64]) -> StorageResult<Vec<T>> {
        StorageStats::bump(&self.stats.list_by_uniques);
        self.check_online()?;
        let matched = self
            .filter(|doc| {
                lookup_path(doc, field)
                    .and_then(Value::as_i64)
                    .is_some_and(|v| values.contains(&v))
            })
            .await?;
        Ok(matched.into_iter().map(|(_, record)| record).collect())
    }

    async fn list_by_unique_strs(
        &self,
        field: &str,
        values: &[String],
    ) -> StorageResult<Vec<T>> {
        StorageStats::bump(&self.stats.list_by_uniques);
        self.check_online()?;
        let matched = self
            .filter(|doc| {
                lookup_path(doc, field)
                    .and_then(Value::as_str)
                    .is_some_and(|v| values.iter().any(|x| x == v))
            })
            .await?;
        Ok(matched.into_iter().map(|(_, record)| record).collect())
    }

    async fn close(&self) -> StorageResult<()> {
        StorageStats::bump(&self.stats.closes);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

//! Secondary index → id caching shared by both engines.
//!
//! Unique lookups cache one id per index key, multi lookups cache an ordered
//! id list. Both shapes live in the same key space, so a reader that finds
//! the other shape decodes it when it can and otherwise treats the key as
//! not cached.

use std::marker::PhantomData;

use scache_core::RecordId;
use serde_json::Value;

use crate::error::CacheResult;
use crate::kv::{CacheEntry, KvBackend, KvOptions, KvStore};

pub struct IndexCache<I> {
    store: KvStore<Value>,
    _id: PhantomData<fn() -> I>,
}

impl<I> Clone for IndexCache<I> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _id: PhantomData,
        }
    }
}

impl<I> std::fmt::Debug for IndexCache<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCache").field("store", &self.store).finish()
    }
}

impl<I: RecordId> IndexCache<I> {
    pub fn new(backend: KvBackend, options: KvOptions) -> Self {
        Self {
            store: KvStore::new(backend, options),
            _id: PhantomData,
        }
    }

    fn decode_unique(key: &str, value: Value) -> Option<CacheEntry<I>> {
        match serde_json::from_value::<I>(value) {
            Ok(id) if id.is_null() => Some(CacheEntry::Absent),
            Ok(id) => Some(CacheEntry::Present(id)),
            Err(_) => {
                tracing::debug!(key = %key, "index entry is not a single id, ignoring");
                None
            }
        }
    }

    fn decode_multi(key: &str, value: Value) -> Option<CacheEntry<Vec<I>>> {
        let decoded = match value {
            Value::Array(_) => serde_json::from_value::<Vec<I>>(value),
            scalar => serde_json::from_value::<I>(scalar)
                .map(|id| if id.is_null() { Vec::new() } else { vec![id] }),
        };
        match decoded {
            Ok(ids) => Some(CacheEntry::Present(ids)),
            Err(_) => {
                tracing::debug!(key = %key, "index entry is not an id list, ignoring");
                None
            }
        }
    }

    /// Reads a unique index entry. `Ok(None)` means not cached.
    pub async fn get_unique(&self, key: &str) -> CacheResult<Option<CacheEntry<I>>> {
        Ok(match self.store.get(key).await? {
            None => None,
            Some(CacheEntry::Absent) => Some(CacheEntry::Absent),
            Some(CacheEntry::Present(value)) => Self::decode_unique(key, value),
        })
    }

    /// Writes a unique index entry; `None` or a null id stores the negative
    /// sentinel.
    pub async fn set_unique(&self, key: &str, id: Option<&I>) -> CacheResult<()> {
        match id.filter(|id| !id.is_null()) {
            Some(id) => self.store.set(key, &serde_json::to_value(id)?).await,
            None => self.store.set_null(key).await,
        }
    }

    /// Reads a multi index entry. `Ok(None)` means not cached.
    pub async fn get_multi(&self, key: &str) -> CacheResult<Option<CacheEntry<Vec<I>>>> {
        Ok(match self.store.get(key).await? {
            None => None,
            Some(CacheEntry::Absent) => Some(CacheEntry::Absent),
            Some(CacheEntry::Present(value)) => Self::decode_multi(key, value),
        })
    }

    pub async fn set_multi(&self, key: &str, ids: &[I]) -> CacheResult<()> {
        self.store.set(key, &serde_json::to_value(ids)?).await
    }

    /// Reads unique entries for every key. Returns `None` unless every key
    /// holds a usable entry.
    pub async fn multi_get_unique(&self, keys: &[String]) -> CacheResult<Option<Vec<CacheEntry<I>>>> {
        let result = self.store.multi_get(keys).await?;
        if !result.is_complete() {
            return Ok(None);
        }
        let mut entries = Vec::with_capacity(keys.len());
        for (key, entry) in keys.iter().zip(result.entries) {
            let decoded = match entry {
                Some(CacheEntry::Present(value)) => Self::decode_unique(key, value),
                Some(CacheEntry::Absent) => Some(CacheEntry::Absent),
                None => None,
            };
            match decoded {
                Some(entry) => entries.push(entry),
                None => return Ok(None),
            }
        }
        Ok(Some(entries))
    }

    /// Writes unique entries in one batch: ids where resolved, the negative
    /// sentinel elsewhere.
    pub async fn multi_set_unique(&self, entries: Vec<(String, Option<I>)>) -> CacheResult<()> {
        let mut present = Vec::new();
        let mut absent = Vec::new();
        for (key, id) in entries {
            match id.filter(|id| !id.is_null()) {
                Some(id) => present.push((key, serde_json::to_value(id)?)),
                None => absent.push(key),
            }
        }
        self.store
            .multi_set(present.iter().map(|(key, value)| (key.clone(), value)))
            .await?;
        self.store.multi_set_null(&absent).await
    }

    /// Drops index keys, returning how many existed.
    pub async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.store.delete(keys).await
    }

    /// Resets the TTL of index keys.
    pub async fn refresh(&self, keys: &[String]) -> CacheResult<()> {
        self.store.refresh(keys).await
    }
}

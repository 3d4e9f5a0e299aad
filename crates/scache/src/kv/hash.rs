//! Records mirrored into a single hash keyed by stringified id.

use std::marker::PhantomData;

use scache_core::{Record, RecordId, stringify};

use super::{KvBackend, KvOptions, bounded};
use crate::error::CacheResult;

/// Hash member name of a record id.
pub fn member_name<I: RecordId>(id: &I) -> String {
    stringify(&id.to_scalar(), "")
}

fn encode_members<T: Record>(records: &[T]) -> CacheResult<Vec<(String, String)>> {
    records
        .iter()
        .map(|record| Ok((member_name(&record.id()), serde_json::to_string(record)?)))
        .collect()
}

/// JSON-encoded records stored as members of one hash per key.
pub struct HashStore<T> {
    backend: KvBackend,
    options: KvOptions,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for HashStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            options: self.options,
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for HashStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore")
            .field("backend", &self.backend)
            .field("options", &self.options)
            .finish()
    }
}

impl<T: Record> HashStore<T> {
    pub fn new(backend: KvBackend, options: KvOptions) -> Self {
        Self {
            backend,
            options,
            _record: PhantomData,
        }
    }

    pub fn options(&self) -> KvOptions {
        self.options
    }

    /// Reads the record stored under `id`.
    pub async fn get(&self, key: &str, id: &T::Id) -> CacheResult<Option<T>> {
        let member = member_name(id);
        let raw = bounded("hget", self.options.op_timeout, self.backend.hget(key, &member)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reads every record of the hash, in no particular order.
    pub async fn get_all(&self, key: &str) -> CacheResult<Vec<T>> {
        let raw = bounded("hgetall", self.options.op_timeout, self.backend.hgetall(key)).await?;
        raw.values()
            .map(|value| Ok(serde_json::from_str(value)?))
            .collect()
    }

    /// Reads the records for `ids` in request order. Ids with no member are
    /// skipped.
    pub async fn multi_get(&self, key: &str, ids: &[T::Id]) -> CacheResult<Vec<T>> {
        let members: Vec<String> = ids.iter().map(member_name).collect();
        let raw = bounded(
            "hmget",
            self.options.op_timeout,
            self.backend.hmget(key, &members),
        )
        .await?;
        raw.into_iter()
            .flatten()
            .map(|value| Ok(serde_json::from_str(&value)?))
            .collect()
    }

    /// Writes `records`, each under its own id. Does not touch the TTL.
    pub async fn set(&self, key: &str, records: &[T]) -> CacheResult<()> {
        let items = encode_members(records)?;
        bounded(
            "hset",
            self.options.op_timeout,
            self.backend.hset_multiple(key, &items),
        )
        .await
    }

    /// Writes `records` over the hash and resets its TTL in the same round
    /// trip. Members not in `records` are left alone.
    pub async fn set_with_ttl(&self, key: &str, records: &[T]) -> CacheResult<()> {
        let items = encode_members(records)?;
        bounded(
            "hset",
            self.options.op_timeout,
            self.backend.hset_multiple_ex(key, &items, self.options.ttl),
        )
        .await
    }

    /// Removes the members for `ids`.
    pub async fn delete(&self, key: &str, ids: &[T::Id]) -> CacheResult<u64> {
        let members: Vec<String> = ids.iter().map(member_name).collect();
        bounded("hdel", self.options.op_timeout, self.backend.hdel(key, &members)).await
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        bounded("exists", self.options.op_timeout, self.backend.exists(key)).await
    }

    /// Resets the TTL of the whole hash.
    pub async fn refresh(&self, key: &str) -> CacheResult<()> {
        bounded(
            "refresh",
            self.options.op_timeout,
            self.backend.expire(&[key.to_string()], self.options.ttl),
        )
        .await
    }

    /// Drops the whole hash.
    pub async fn delete_key(&self, key: &str) -> CacheResult<bool> {
        let removed = bounded(
            "delete",
            self.options.op_timeout,
            self.backend.del(&[key.to_string()]),
        )
        .await?;
        Ok(removed > 0)
    }
}

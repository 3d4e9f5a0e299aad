//! Raw string and hash operations against the KV tier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::error::{CacheError, CacheResult};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// A value held by the local backend.
#[derive(Debug, Clone)]
enum LocalValue {
    Str(String),
    Hash(HashMap<String, String>),
}

/// A local entry with an optional deadline.
#[derive(Debug, Clone)]
pub struct LocalEntry {
    value: LocalValue,
    expires_at: Option<Instant>,
}

impl LocalEntry {
    fn string(value: String, ttl: Duration) -> Self {
        Self {
            value: LocalValue::Str(value),
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// The KV tier every cache store talks to.
///
/// ## Modes
///
/// - **Local**: in-process `DashMap` with Redis string and hash semantics.
///   Expired entries are dropped lazily when touched. Useful for a single
///   instance and for tests.
/// - **Redis**: a shared deadpool-redis pool; every instance built on the
///   same server sees the same entries.
///
/// Cloning is cheap; clones share the same map or pool.
#[derive(Clone)]
pub enum KvBackend {
    /// Single instance: in-process map only
    Local(Arc<DashMap<String, LocalEntry>>),

    /// Shared Redis server
    Redis(Pool),
}

impl std::fmt::Debug for KvBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(map) => f.debug_tuple("Local").field(&map.len()).finish(),
            Self::Redis(_) => f.write_str("Redis"),
        }
    }
}

impl KvBackend {
    /// Create a new local backend.
    pub fn new_local() -> Self {
        KvBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a backend on top of an existing Redis pool.
    pub fn new_redis(pool: Pool) -> Self {
        KvBackend::Redis(pool)
    }

    /// Short name for logs: `local` or `redis`.
    pub fn mode(&self) -> &'static str {
        match self {
            KvBackend::Local(_) => "local",
            KvBackend::Redis(_) => "redis",
        }
    }

    /// Number of live keys held locally. Always 0 in Redis mode.
    pub fn local_len(&self) -> usize {
        match self {
            KvBackend::Local(map) => map.iter().filter(|e| !e.is_expired()).count(),
            KvBackend::Redis(_) => 0,
        }
    }

    /// Removes the local entry for `key` if its deadline has passed.
    fn purge_expired(map: &DashMap<String, LocalEntry>, key: &str) {
        map.remove_if(key, |_, entry| entry.is_expired());
    }

    fn local_string(map: &DashMap<String, LocalEntry>, key: &str) -> CacheResult<Option<String>> {
        Self::purge_expired(map, key);
        match map.get(key).map(|e| e.value.clone()) {
            None => Ok(None),
            Some(LocalValue::Str(value)) => Ok(Some(value)),
            Some(LocalValue::Hash(_)) => Err(CacheError::transport(WRONG_TYPE)),
        }
    }

    fn local_hash(
        map: &DashMap<String, LocalEntry>,
        key: &str,
    ) -> CacheResult<Option<HashMap<String, String>>> {
        Self::purge_expired(map, key);
        match map.get(key).map(|e| e.value.clone()) {
            None => Ok(None),
            Some(LocalValue::Hash(fields)) => Ok(Some(fields)),
            Some(LocalValue::Str(_)) => Err(CacheError::transport(WRONG_TYPE)),
        }
    }

    /// GET
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            KvBackend::Local(map) => Self::local_string(map, key),
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.get::<_, Option<String>>(key).await?)
            }
        }
    }

    /// SET with expiry.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            KvBackend::Local(map) => {
                map.insert(key.to_string(), LocalEntry::string(value.to_string(), ttl));
                Ok(())
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl) as u64)
                    .await?;
                Ok(())
            }
        }
    }

    /// MGET, one slot per key.
    pub async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            KvBackend::Local(map) => keys
                .iter()
                .map(|key| match Self::local_string(map, key) {
                    Err(_) => Ok(None),
                    other => other,
                })
                .collect(),
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.mget::<_, Vec<Option<String>>>(keys).await?)
            }
        }
    }

    /// Pipelined SET with expiry for every pair.
    pub async fn mset_ex(&self, entries: &[(String, String)], ttl: Duration) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        match self {
            KvBackend::Local(map) => {
                for (key, value) in entries {
                    map.insert(key.clone(), LocalEntry::string(value.clone(), ttl));
                }
                Ok(())
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let mut pipe = redis::pipe();
                for (key, value) in entries {
                    pipe.pset_ex(key, value, ttl_millis(ttl) as u64).ignore();
                }
                let _: () = pipe.query_async(&mut conn).await?;
                Ok(())
            }
        }
    }

    /// Pipelined expiry reset. Missing keys are skipped.
    pub async fn expire(&self, keys: &[String], ttl: Duration) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        match self {
            KvBackend::Local(map) => {
                for key in keys {
                    Self::purge_expired(map, key);
                    if let Some(mut entry) = map.get_mut(key.as_str()) {
                        entry.expires_at = Some(Instant::now() + ttl);
                    }
                }
                Ok(())
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let mut pipe = redis::pipe();
                for key in keys {
                    pipe.pexpire(key, ttl_millis(ttl)).ignore();
                }
                let _: () = pipe.query_async(&mut conn).await?;
                Ok(())
            }
        }
    }

    /// EXISTS
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self {
            KvBackend::Local(map) => {
                Self::purge_expired(map, key);
                Ok(map.contains_key(key))
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.exists::<_, bool>(key).await?)
            }
        }
    }

    /// DEL, returning how many keys existed.
    pub async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        match self {
            KvBackend::Local(map) => Ok(keys
                .iter()
                .filter_map(|key| map.remove(key.as_str()))
                .filter(|(_, entry)| !entry.is_expired())
                .count() as u64),
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.del::<_, u64>(keys).await?)
            }
        }
    }

    /// HGET
    pub async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        match self {
            KvBackend::Local(map) => {
                Ok(Self::local_hash(map, key)?.and_then(|mut fields| fields.remove(field)))
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.hget::<_, _, Option<String>>(key, field).await?)
            }
        }
    }

    /// HGETALL
    pub async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        match self {
            KvBackend::Local(map) => Ok(Self::local_hash(map, key)?.unwrap_or_default()),
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.hgetall::<_, HashMap<String, String>>(key).await?)
            }
        }
    }

    /// HMGET, one slot per field.
    pub async fn hmget(&self, key: &str, fields: &[String]) -> CacheResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            KvBackend::Local(map) => {
                let hash = Self::local_hash(map, key)?.unwrap_or_default();
                Ok(fields.iter().map(|f| hash.get(f).cloned()).collect())
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let values: Vec<Option<String>> = redis::cmd("HMGET")
                    .arg(key)
                    .arg(fields)
                    .query_async(&mut conn)
                    .await?;
                Ok(values)
            }
        }
    }

    /// HSET of several fields. A new hash is created without expiry.
    pub async fn hset_multiple(&self, key: &str, items: &[(String, String)]) -> CacheResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        match self {
            KvBackend::Local(map) => Self::local_hset(map, key, items, None),
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                conn.hset_multiple::<_, _, _, ()>(key, items).await?;
                Ok(())
            }
        }
    }

    /// HSET of several fields followed by PEXPIRE on the hash, sent as one
    /// pipeline. Fields already in the hash but not in `items` are kept.
    pub async fn hset_multiple_ex(
        &self,
        key: &str,
        items: &[(String, String)],
        ttl: Duration,
    ) -> CacheResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        match self {
            KvBackend::Local(map) => {
                Self::local_hset(map, key, items, Some(Instant::now() + ttl))
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let mut pipe = redis::pipe();
                pipe.hset_multiple(key, items).ignore();
                pipe.pexpire(key, ttl_millis(ttl)).ignore();
                let _: () = pipe.query_async(&mut conn).await?;
                Ok(())
            }
        }
    }

    /// Local HSET. `deadline` replaces the expiry when given, otherwise an
    /// existing hash keeps its expiry and a new one has none.
    fn local_hset(
        map: &DashMap<String, LocalEntry>,
        key: &str,
        items: &[(String, String)],
        deadline: Option<Instant>,
    ) -> CacheResult<()> {
        Self::purge_expired(map, key);
        match map.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                match &mut entry.value {
                    LocalValue::Hash(fields) => fields.extend(items.iter().cloned()),
                    LocalValue::Str(_) => return Err(CacheError::transport(WRONG_TYPE)),
                }
                if deadline.is_some() {
                    entry.expires_at = deadline;
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LocalEntry {
                    value: LocalValue::Hash(items.iter().cloned().collect()),
                    expires_at: deadline,
                });
            }
        }
        Ok(())
    }

    /// HDEL, returning how many fields were removed. Removing the last
    /// field removes the key.
    pub async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        match self {
            KvBackend::Local(map) => {
                Self::purge_expired(map, key);
                let removed = match map.get_mut(key) {
                    None => return Ok(0),
                    Some(mut entry) => match &mut entry.value {
                        LocalValue::Hash(hash) => {
                            fields.iter().filter(|f| hash.remove(*f).is_some()).count() as u64
                        }
                        LocalValue::Str(_) => return Err(CacheError::transport(WRONG_TYPE)),
                    },
                };
                map.remove_if(key, |_, entry| {
                    matches!(&entry.value, LocalValue::Hash(hash) if hash.is_empty())
                });
                Ok(removed)
            }
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                Ok(conn.hdel::<_, _, u64>(key, fields).await?)
            }
        }
    }

    /// Check that the backend answers (for health checks).
    pub async fn ping(&self) -> CacheResult<()> {
        match self {
            KvBackend::Local(_) => Ok(()),
            KvBackend::Redis(pool) => {
                let mut conn = pool.get().await?;
                let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(())
            }
        }
    }
}

/// Millisecond expiry for Redis, never below 1.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

//! In-memory record store for scache.
//!
//! This crate provides an implementation of the `StorageAdapter` trait from
//! `scache-storage` that keeps records in process memory and evaluates index
//! lookups against each record's JSON form, the way a document database
//! would. It counts every call so tests can assert how often a cache engine
//! reached the store.
//!
//! # Example
//!
//! ```ignore
//! use scache_db_memory::InMemoryStorage;
//! use scache_storage::StorageAdapter;
//!
//! let storage = InMemoryStorage::<Commodity>::new("commodity");
//! storage.create(&mut commodity).await?;
//! assert_eq!(storage.stats().creates, 1);
//! ```

pub mod query;
mod storage;

pub use query::{compare_documents, compare_values, lookup_path, matches_index, set_path};
pub use storage::{InMemoryStorage, StatsSnapshot, StorageStats};

pub use scache_storage::{StorageAdapter, StorageError};

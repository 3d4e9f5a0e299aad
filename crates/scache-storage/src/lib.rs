//! # scache-storage
//!
//! Contract for the authoritative record store that the cache engines front.
//!
//! This crate defines the trait and types a backend must implement; it does
//! not contain any backend. A reference in-memory store lives in
//! `scache-db-memory`.
//!
//! ## Implementing a backend
//!
//! ```ignore
//! use async_trait::async_trait;
//! use scache_storage::{StorageAdapter, StorageResult};
//!
//! struct MyStore { /* connection pool */ }
//!
//! #[async_trait]
//! impl StorageAdapter<Commodity> for MyStore {
//!     async fn get(&self, id: &String) -> StorageResult<Option<Commodity>> {
//!         // SELECT ... WHERE id = $1
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::StorageAdapter;
pub use types::UpdatePayload;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage<T> = std::sync::Arc<dyn StorageAdapter<T>>;

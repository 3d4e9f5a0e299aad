//! # scache-core
//!
//! The identity and index model shared by every scache crate.
//!
//! - [`Record`] / [`RecordId`]: the capability set a cached record type exposes
//! - [`Scalar`] / [`stringify`]: canonical text rendering of index values
//! - [`Index`] / [`OrderBys`]: secondary index lookups and store ordering
//! - [`CacheNamespace`]: deterministic cache key construction
//!
//! ## Cache key format
//!
//! ```text
//! <prefix>/<table>/<field1>/<value1>/<field2>/<value2>...
//! ```
//!
//! Fields are sorted by name and lower-cased, so the same [`Index`] always
//! yields the same key regardless of how it was built.

pub mod id;
pub mod index;
pub mod key;
pub mod scalar;

pub use id::{Record, RecordId};
pub use index::{Index, Indexes, OrderBy, OrderBys};
pub use key::{CacheNamespace, full_table_key, make_cache_key, unique_strings};
pub use scalar::{Scalar, stringify};

/// Literal used for unset optional values inside cache keys.
pub const NULL_LITERAL: &str = "null";

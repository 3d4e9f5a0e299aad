//! Cache counters for the `metrics` facade.
//!
//! Nothing is exported from here; install any `metrics` recorder (for
//! example a Prometheus exporter) in the host process to collect them.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const HITS_TOTAL: &str = "scache_hits_total";
    pub const MISSES_TOTAL: &str = "scache_misses_total";
    pub const NEGATIVE_HITS_TOTAL: &str = "scache_negative_hits_total";
    pub const FULL_LOADS_TOTAL: &str = "scache_full_loads_total";
    pub const INVALIDATIONS_TOTAL: &str = "scache_invalidations_total";
}

/// Lookup kinds used as the `kind` label.
pub mod kinds {
    pub const RECORD: &str = "record";
    pub const UNIQUE: &str = "unique";
    pub const MULTI: &str = "multi";
    pub const FULL: &str = "full";
}

/// Record a cache hit.
pub fn record_hit(table: &str, kind: &'static str) {
    counter!(names::HITS_TOTAL, "table" => table.to_string(), "kind" => kind).increment(1);
}

/// Record `count` cache hits.
pub fn record_hits(table: &str, kind: &'static str, count: usize) {
    if count > 0 {
        counter!(names::HITS_TOTAL, "table" => table.to_string(), "kind" => kind)
            .increment(count as u64);
    }
}

/// Record a cache miss.
pub fn record_miss(table: &str, kind: &'static str) {
    counter!(names::MISSES_TOTAL, "table" => table.to_string(), "kind" => kind).increment(1);
}

/// Record `count` cache misses.
pub fn record_misses(table: &str, kind: &'static str, count: usize) {
    if count > 0 {
        counter!(names::MISSES_TOTAL, "table" => table.to_string(), "kind" => kind)
            .increment(count as u64);
    }
}

/// Record a read answered by a negative entry.
pub fn record_negative_hit(table: &str) {
    counter!(names::NEGATIVE_HITS_TOTAL, "table" => table.to_string()).increment(1);
}

/// Record a full-table mirror load.
pub fn record_full_load(table: &str) {
    counter!(names::FULL_LOADS_TOTAL, "table" => table.to_string()).increment(1);
}

/// Record keys removed by an invalidation.
pub fn record_invalidation(table: &str, keys: usize) {
    counter!(names::INVALIDATIONS_TOTAL, "table" => table.to_string()).increment(keys as u64);
}

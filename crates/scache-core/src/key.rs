//! Cache key construction.

use std::collections::HashSet;

use crate::NULL_LITERAL;
use crate::id::RecordId;
use crate::index::Index;
use crate::scalar::stringify;

/// Builds `prefix/table/<field>/<value>/...` with fields sorted by name and
/// lower-cased.
pub fn make_cache_key(prefix: &str, table: &str, index: &Index) -> String {
    let mut key = format!("{prefix}/{table}");
    for (field, value) in index.iter() {
        key.push('/');
        key.push_str(&field.to_lowercase());
        key.push('/');
        key.push_str(&stringify(value, NULL_LITERAL));
    }
    key
}

/// Key of the whole-table mirror hash, lower-cased in its entirety.
pub fn full_table_key(prefix: &str, table: &str) -> String {
    format!("{prefix}/{table}/full").to_lowercase()
}

/// Removes duplicate keys, keeping first occurrences in order.
pub fn unique_strings(strs: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(strs.len());
    strs.into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Where a record type lives in the cache: key prefix, table name and the
/// name of the primary key field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNamespace {
    prefix: String,
    table: String,
    id_field: String,
}

impl CacheNamespace {
    pub fn new(
        prefix: impl Into<String>,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            table: table.into(),
            id_field: id_field.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = table.into();
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn set_id_field(&mut self, id_field: impl Into<String>) {
        self.id_field = id_field.into();
    }

    /// Key for a secondary index lookup.
    pub fn make_cache_key(&self, index: &Index) -> String {
        make_cache_key(&self.prefix, &self.table, index)
    }

    /// Key for a primary key lookup.
    pub fn id_key<I: RecordId>(&self, id: &I) -> String {
        self.make_cache_key(&Index::new(self.id_field.clone(), id.to_scalar()))
    }

    /// Key of the whole-table mirror.
    pub fn full_key(&self) -> String {
        full_table_key(&self.prefix, &self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> CacheNamespace {
        CacheNamespace::new("app", "commodity", "Id")
    }

    #[test]
    fn test_id_key() {
        assert_eq!(ns().id_key(&"1".to_string()), "app/commodity/id/1");
        assert_eq!(ns().id_key(&42u64), "app/commodity/id/42");
    }

    #[test]
    fn test_composite_key_sorted_and_lowercased() {
        let index = Index::new("Type", 2).with("Uid", "u1");
        assert_eq!(ns().make_cache_key(&index), "app/commodity/type/2/uid/u1");
    }

    #[test]
    fn test_key_invariant_under_permutation() {
        let fields = [("a", 1i64), ("c", 3), ("b", 2)];
        let forward: Index = fields.iter().copied().collect();
        let backward: Index = fields.iter().rev().copied().collect();
        assert_eq!(ns().make_cache_key(&forward), ns().make_cache_key(&backward));
        assert_eq!(ns().make_cache_key(&forward), "app/commodity/a/1/b/2/c/3");
    }

    #[test]
    fn test_null_value_in_key() {
        let index = Index::new("deleted_at", None::<i64>);
        assert_eq!(ns().make_cache_key(&index), "app/commodity/deleted_at/null");
    }

    #[test]
    fn test_full_key_lowercased() {
        let ns = CacheNamespace::new("App", "Commodity", "Id");
        assert_eq!(ns.full_key(), "app/commodity/full");
    }

    #[test]
    fn test_setters() {
        let mut ns = ns();
        ns.set_prefix("p");
        ns.set_table("t");
        ns.set_id_field("pk");
        assert_eq!(ns.id_key(&5i32), "p/t/pk/5");
    }

    #[test]
    fn test_unique_strings() {
        let keys = vec!["a".to_string(), "b".into(), "a".into()];
        assert_eq!(unique_strings(keys), vec!["a".to_string(), "b".to_string()]);
    }
}

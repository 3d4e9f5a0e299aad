//! Secondary index lookups and result ordering.

use std::collections::BTreeMap;
use std::fmt;

use crate::scalar::Scalar;

/// A (possibly composite) secondary index: field name → value.
///
/// Field order is irrelevant; two indexes with the same entries are equal
/// no matter the insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index(BTreeMap<String, Scalar>);

/// The secondary indexes a record belongs to.
pub type Indexes = Vec<Index>;

impl Index {
    /// Creates a single-field index.
    pub fn new(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::default().with(field, value)
    }

    /// Adds (or replaces) a field, returning the index.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Adds (or replaces) a field in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns the field names, sorted.
    pub fn fields(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.0.get(field)
    }

    /// Iterates entries sorted by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Index {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Sort direction for one field of a store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub asc: bool,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, asc: bool) -> Self {
        Self {
            field: field.into(),
            asc,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.asc {
            write!(f, "{} ASC", self.field)
        } else {
            write!(f, "{} DESC", self.field)
        }
    }
}

/// Ordered list of sort fields, rendered SQL-style (`"a ASC,b DESC"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBys(Vec<OrderBy>);

impl OrderBys {
    pub fn new(field: impl Into<String>, asc: bool) -> Self {
        Self(vec![OrderBy::new(field, asc)])
    }

    #[must_use]
    pub fn add(mut self, field: impl Into<String>, asc: bool) -> Self {
        self.0.push(OrderBy::new(field, asc));
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderBy> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OrderBys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, order) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{order}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a OrderBys {
    type Item = &'a OrderBy;
    type IntoIter = std::slice::Iter<'a, OrderBy>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

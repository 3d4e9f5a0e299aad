//! Types exchanged with storage backends.

use std::collections::BTreeMap;

use serde_json::Value;

/// The change applied by an update.
///
/// Partial field names are backend field names; document stores may accept
/// dotted paths such as `addr.country`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload<T> {
    /// Replace every field of the stored record.
    FullReplace(T),
    /// Set only the listed fields.
    PartialFields(BTreeMap<String, Value>),
}

impl<T> UpdatePayload<T> {
    /// Builds a partial update from `(field, value)` pairs.
    pub fn fields<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::PartialFields(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns `true` if applying this payload cannot change anything.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::PartialFields(fields) if fields.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_builder() {
        let payload: UpdatePayload<()> = UpdatePayload::fields([("category", 3), ("rank", 1)]);
        match payload {
            UpdatePayload::PartialFields(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["category"], Value::from(3));
            }
            UpdatePayload::FullReplace(_) => panic!("expected partial fields"),
        }
    }

    #[test]
    fn test_is_empty() {
        let empty: UpdatePayload<()> = UpdatePayload::PartialFields(BTreeMap::new());
        assert!(empty.is_empty());
        assert!(!UpdatePayload::FullReplace(()).is_empty());
    }
}

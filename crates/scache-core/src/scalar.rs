//! Scalar index values and their canonical text form.

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A single index value.
///
/// Optional values convert to [`Scalar::Null`] when unset, which renders as
/// the caller's null literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Time(OffsetDateTime),
}

impl Scalar {
    /// Returns `true` for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Converts to a JSON value, used by document-style stores to compare
    /// index values against record fields.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(v) => Value::Bool(*v),
            Scalar::Int(v) => Value::from(*v),
            Scalar::UInt(v) => Value::from(*v),
            Scalar::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Str(v) => Value::String(v.clone()),
            Scalar::Time(v) => Value::String(v.format(&Rfc3339).unwrap_or_default()),
        }
    }
}

/// Renders a scalar as text for use in cache keys and hash member names.
///
/// Booleans render as `true`/`false`, integers in decimal, floats in
/// fixed-point with six fractional digits, timestamps as RFC3339 and
/// [`Scalar::Null`] as `null`.
pub fn stringify(value: &Scalar, null: &str) -> String {
    match value {
        Scalar::Null => null.to_string(),
        Scalar::Bool(true) => "true".to_string(),
        Scalar::Bool(false) => "false".to_string(),
        Scalar::Int(v) => v.to_string(),
        Scalar::UInt(v) => v.to_string(),
        Scalar::Float(v) => format!("{v:.6}"),
        Scalar::Str(v) => v.clone(),
        Scalar::Time(v) => v.format(&Rfc3339).unwrap_or_default(),
    }
}

macro_rules! scalar_from {
    ($variant:ident as $target:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value as $target)
                }
            }
        )*
    };
}

scalar_from!(Int as i64: i8, i16, i32, i64, isize);
scalar_from!(UInt as u64: u8, u16, u32, u64, usize);
scalar_from!(Float as f64: f32, f64);

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<&String> for Scalar {
    fn from(value: &String) -> Self {
        Scalar::Str(value.clone())
    }
}

impl From<OffsetDateTime> for Scalar {
    fn from(value: OffsetDateTime) -> Self {
        Scalar::Time(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_stringify_atoms() {
        assert_eq!(stringify(&true.into(), "null"), "true");
        assert_eq!(stringify(&false.into(), "null"), "false");
        assert_eq!(stringify(&(-42i32).into(), "null"), "-42");
        assert_eq!(stringify(&7u8.into(), "null"), "7");
        assert_eq!(stringify(&1.5f64.into(), "null"), "1.500000");
        assert_eq!(stringify(&"abc".into(), "null"), "abc");
    }

    #[test]
    fn test_stringify_time() {
        let t = datetime!(2024-03-01 12:30:00 UTC);
        assert_eq!(stringify(&t.into(), "null"), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn test_stringify_optional() {
        let unset: Option<i64> = None;
        assert_eq!(stringify(&unset.into(), "null"), "null");
        assert_eq!(stringify(&unset.into(), ""), "");
        assert_eq!(stringify(&Some(5i64).into(), "null"), "5");
        assert_eq!(stringify(&Some("x").into(), "nil"), "x");
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Scalar::Int(3).to_json(), serde_json::json!(3));
        assert_eq!(Scalar::Str("a".into()).to_json(), serde_json::json!("a"));
        assert_eq!(Scalar::Null.to_json(), Value::Null);
        assert_eq!(Scalar::Float(f64::NAN).to_json(), Value::Null);
    }
}

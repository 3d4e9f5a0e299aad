//! Record identity.
//!
//! Ids follow a zero-value convention: `0` for integer ids and the empty
//! string for string ids mean "no id". Those values are reserved and can not
//! denote a stored record.

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::index::Indexes;
use crate::scalar::Scalar;

/// A primary key scalar: one of the integer family or a string.
pub trait RecordId:
    Clone + Debug + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Returns `true` if this id is the zero value of its scalar kind.
    fn is_null(&self) -> bool;

    /// Converts the id into a [`Scalar`] for key and hash member rendering.
    fn to_scalar(&self) -> Scalar;
}

macro_rules! impl_signed_id {
    ($($ty:ty),*) => {
        $(
            impl RecordId for $ty {
                fn is_null(&self) -> bool {
                    *self == 0
                }

                fn to_scalar(&self) -> Scalar {
                    Scalar::Int(*self as i64)
                }
            }
        )*
    };
}

macro_rules! impl_unsigned_id {
    ($($ty:ty),*) => {
        $(
            impl RecordId for $ty {
                fn is_null(&self) -> bool {
                    *self == 0
                }

                fn to_scalar(&self) -> Scalar {
                    Scalar::UInt(*self as u64)
                }
            }
        )*
    };
}

impl_signed_id!(i16, i32, i64, isize);
impl_unsigned_id!(u16, u32, u64, usize);

impl RecordId for String {
    fn is_null(&self) -> bool {
        self.is_empty()
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Str(self.clone())
    }
}

/// A record type that can be cached.
///
/// The cache never looks at record fields directly; it only uses the id and
/// the list of secondary indexes the record reports. `Default` provides the
/// zero value returned in list slots for ids that do not exist.
///
/// # Example
///
/// ```
/// use scache_core::{Index, Indexes, Record};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Commodity {
///     id: String,
///     name: String,
///     category: i64,
/// }
///
/// impl Record for Commodity {
///     type Id = String;
///
///     fn id(&self) -> String {
///         self.id.clone()
///     }
///
///     fn indexes(&self) -> Indexes {
///         vec![Index::new("category", self.category)]
///     }
/// }
/// ```
pub trait Record: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The primary key type.
    type Id: RecordId;

    /// Returns the primary key of this record.
    fn id(&self) -> Self::Id;

    /// Returns every secondary index this record currently belongs to.
    fn indexes(&self) -> Indexes;
}

use serde::{Deserialize, Serialize};

/// Declares a row identifier newtype.
///
/// Wrapping the raw integer keeps a user id from being passed where an
/// item id is expected, which the store signatures rely on.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a registered user (buyer or seller).
    UserId(i64)
);

row_id!(
    /// Identifier of a listed item.
    ItemId(i64)
);

row_id!(
    /// Identifier of a purchase record. Also keys the matching shipping row.
    TransactionEvidenceId(i64)
);

row_id!(
    /// Identifier of a category in the static hierarchy.
    CategoryId(i32)
);

impl CategoryId {
    /// The parent id carried by root categories.
    pub const ROOT_PARENT: CategoryId = CategoryId(0);

    /// Returns true for the sentinel used as the parent of root categories.
    pub fn is_root_parent(&self) -> bool {
        *self == Self::ROOT_PARENT
    }
}

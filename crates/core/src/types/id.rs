//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. The remote API hands
//! out opaque string identifiers, so every ID wraps a non-blank `String`.

/// Error returned when an ID is empty or only whitespace.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} cannot be empty")]
pub struct IdError {
    /// Name of the ID type that failed to parse.
    pub kind: &'static str,
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a plain string, rejecting blank values
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `parse()`, `as_str()`, `into_inner()`
/// - `Display`, `FromStr`, `AsRef<str>` and `TryFrom<String>` implementations
///
/// # Example
///
/// ```rust
/// # use forkful_core::define_id;
/// define_id!(MenuId);
/// define_id!(CourierId);
///
/// let menu_id = MenuId::parse("m-1").unwrap();
/// let courier_id = CourierId::parse("m-1").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: MenuId = courier_id;
/// assert!(MenuId::parse("  ").is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an ID, rejecting empty or whitespace-only input.
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the trimmed input is empty.
            pub fn parse(id: impl Into<String>) -> ::core::result::Result<Self, $crate::IdError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err($crate::IdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(id))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::IdError;

            fn try_from(id: String) -> ::core::result::Result<Self, Self::Error> {
                Self::parse(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(RestaurantId);
define_id!(BranchId);
define_id!(ItemId);
define_id!(RemoteCartId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let id = RestaurantId::parse("r-42").unwrap();
        assert_eq!(id.as_str(), "r-42");
        assert_eq!(id.to_string(), "r-42");
    }

    #[test]
    fn test_parse_blank() {
        assert!(matches!(
            BranchId::parse(""),
            Err(IdError { kind: "BranchId" })
        ));
        assert!(ItemId::parse("   ").is_err());
    }

    #[test]
    fn test_serde_is_plain_string() {
        let id = ItemId::parse("burger").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"burger\"");

        let parsed: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_deserialize_rejects_blank() {
        assert!(serde_json::from_str::<RestaurantId>("\"\"").is_err());
    }

    #[test]
    fn test_error_message_names_type() {
        let err = RemoteCartId::parse("").unwrap_err();
        assert_eq!(err.to_string(), "RemoteCartId cannot be empty");
    }
}

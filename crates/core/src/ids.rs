//! Newtype identifiers
//!
//! Trigger and subscription identifiers are both opaque strings handed to us
//! by the host platform. Wrapping them keeps one from being passed where the
//! other is expected, and guarantees neither is ever empty.

use serde::{Deserialize, Serialize};

// Generates: struct, new() returning Option<Self>, as_str(), Display,
// and a TryFrom<String> used by serde so persisted values obey the same rule.
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or_else(|| format!("{} must not be empty", stringify!($name)))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Identifies one trigger instance on the host platform.
    ///
    /// Trigger-scoped metadata (the persisted subscription) is keyed by this id.
    TriggerId
}

string_id! {
    /// Opaque identifier returned by the platform message bus for a subscription.
    SubscriptionId
}

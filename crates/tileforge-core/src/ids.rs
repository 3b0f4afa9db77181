//! Identifier newtypes.
//!
//! All identifiers are opaque strings on the wire. Wrapping them keeps a
//! session id from being passed where an NPC id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use tilegrid::PlayerId;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string.
            #[must_use]
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Opaque request id assigned by the submitter.
    ActionId
);
string_id!(
    /// Identifier of a game session (one board, one engine owner).
    InstanceId
);
string_id!(
    /// Identifier of a non-player entity.
    NpcId
);
string_id!(
    /// Identifier of a world script.
    ScriptId
);
string_id!(
    /// Identifier of the trigger that fired a world script.
    TriggerId
);

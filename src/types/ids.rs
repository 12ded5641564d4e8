//! Prefixed TypeID identifiers.
//!
//! Both identifiers share one shape: a `MagicTypeId` with a fixed prefix,
//! a fresh UUIDv7 on creation, and prefix validation on parse.
//! Example: `host_01h455vb4pex5vsknk084sn02q`

use mti::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! prefixed_id {
    (
        $(#[$meta:meta])*
        $name:ident, $error:ident, $prefix:literal, $label:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(MagicTypeId);

        #[doc = concat!("Error returned when a string is not a valid ", $label, ".")]
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $error {
            /// TypeID parsing failed
            Parse(String),
            /// The TypeID carried a different prefix
            WrongPrefix {
                /// The expected prefix
                expected: &'static str,
                /// The actual prefix found
                actual: String,
            },
        }

        impl fmt::Display for $error {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Parse(e) => write!(f, concat!("invalid ", $label, ": {}"), e),
                    Self::WrongPrefix { expected, actual } => {
                        write!(f, "expected prefix '{expected}', got '{actual}'")
                    }
                }
            }
        }

        impl std::error::Error for $error {}

        impl $name {
            /// The TypeID prefix for this identifier.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new identifier with a fresh UUIDv7 (time-sortable).
            #[must_use]
            pub fn new() -> Self {
                Self(Self::PREFIX.create_type_id::<V7>())
            }

            /// Parses an identifier, validating the prefix.
            ///
            /// # Errors
            ///
            /// Returns `Parse` if the string is not a TypeID and `WrongPrefix`
            /// if it belongs to another identifier family.
            pub fn parse(s: &str) -> Result<Self, $error> {
                let id = MagicTypeId::from_str(s).map_err(|e| $error::Parse(e.to_string()))?;

                let prefix = id.prefix().as_str();
                if prefix != Self::PREFIX {
                    return Err($error::WrongPrefix {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }

                Ok(Self(id))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = $error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.0.to_string().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

prefixed_id!(
    /// Identity of one execution host lifetime.
    ///
    /// A new id is minted every time the controller constructs a host, so
    /// results tagged with an old id can be recognized and ignored.
    HostId,
    InvalidHostId,
    "host",
    "host ID"
);

prefixed_id!(
    /// Correlates an eval request with its response on the transport.
    CorrelationId,
    InvalidCorrelationId,
    "corr",
    "correlation ID"
);

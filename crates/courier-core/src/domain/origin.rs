//! Origins of the two sides of an embedding.
//!
//! An origin is the `scheme://host[:port]` triple that the browser attaches
//! to every cross-document message. Values are normalized through `url` so
//! that `http://Host:80/` and `http://host` compare equal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("'{value}' is not a valid origin: {message}")]
    Invalid { value: String, message: String },

    #[error("'{0}' has an opaque origin and cannot be addressed")]
    Opaque(String),
}

/// A normalized, concrete origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    pub fn parse(value: &str) -> Result<Self, OriginError> {
        let url = Url::parse(value).map_err(|e| OriginError::Invalid {
            value: value.to_string(),
            message: e.to_string(),
        })?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(OriginError::Opaque(value.to_string()));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Origin::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Where a posted message may be delivered.
///
/// `Any` is the `"*"` wildcard: only used before the guest knows who embeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    Any,
    Exact(Origin),
}

impl TargetOrigin {
    pub fn matches(&self, origin: &Origin) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin,
        }
    }
}

impl From<Origin> for TargetOrigin {
    fn from(origin: Origin) -> Self {
        TargetOrigin::Exact(origin)
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOrigin::Any => f.write_str("*"),
            TargetOrigin::Exact(origin) => origin.fmt(f),
        }
    }
}

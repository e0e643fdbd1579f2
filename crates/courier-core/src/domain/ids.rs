//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! Envelope server と request の識別子は ULID を使います。
//! 同じページに複数の guest を同時に埋め込んでも衝突しないことが要件です。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供しつつ、`T` はマーカー型としてのみ使います。
//! `EnvelopeServerId` と `RequestId` はコンパイル時に混同できません。
//!
//! ## Wire 表現
//! JSON 上では `Display` と同じ文字列（`envelope-server-01H...`）になります。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックスを提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("identifier '{value}' does not start with '{expected}'")]
    MissingPrefix { value: String, expected: &'static str },

    #[error("identifier '{0}' is not a valid ULID")]
    InvalidUlid(String),
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(T::prefix())
            .ok_or_else(|| IdParseError::MissingPrefix {
                value: s.to_string(),
                expected: T::prefix(),
            })?;
        let ulid = Ulid::from_string(raw).map_err(|_| IdParseError::InvalidUlid(s.to_string()))?;
        Ok(Self::from_ulid(ulid))
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Envelope server のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnvelopeServer {}

impl IdMarker for EnvelopeServer {
    fn prefix() -> &'static str {
        "envelope-server-"
    }
}

/// Request のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Request {}

impl IdMarker for Request {
    fn prefix() -> &'static str {
        "request-"
    }
}

/// Identifier of one host/guest pairing (one embedded guest).
pub type EnvelopeServerId = Id<EnvelopeServer>;

/// Correlation id of one request/response exchange.
pub type RequestId = Id<Request>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let server = EnvelopeServerId::from_ulid(Ulid::new());
        let request = RequestId::from_ulid(Ulid::new());

        assert!(server.to_string().starts_with("envelope-server-"));
        assert!(request.to_string().starts_with("request-"));
        // let _: EnvelopeServerId = request; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_prefixed_strings() {
        let ulid = Ulid::new();
        let id = EnvelopeServerId::from_ulid(ulid);

        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!(format!("envelope-server-{ulid}")));

        let back: EnvelopeServerId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parsing_rejects_the_wrong_prefix() {
        let request = RequestId::from_ulid(Ulid::new()).to_string();
        let err = request.parse::<EnvelopeServerId>().unwrap_err();
        assert!(matches!(err, IdParseError::MissingPrefix { .. }));

        let err = "request-not-a-ulid".parse::<RequestId>().unwrap_err();
        assert!(matches!(err, IdParseError::InvalidUlid(_)));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<EnvelopeServerId>(), size_of::<Ulid>());
        assert_eq!(size_of::<RequestId>(), size_of::<Ulid>());
    }
}

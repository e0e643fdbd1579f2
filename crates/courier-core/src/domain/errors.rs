//! Errors - エラー型と分類
//!
//! 2 種類に分けています。
//! - `ApiError`: bus を越えて相手側に届くエラー（serialize 可能）
//! - `EnvelopeError`: ローカルで発生し、呼び出し元に返るエラー
//!
//! origin 不一致は security boundary なのでエラーとして表面化しません（drop のみ）。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::origin::OriginError;

/// Classification of an error that crossed the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiErrorKind {
    /// The driver's backing operation (query, navigation, ...) failed.
    BackingOperation,
    /// `init` was called on an envelope that is already initialized.
    DuplicateInit,
    /// A request arrived before the envelope finished its init handshake.
    NotReady,
    /// No operation with this name exists in the contract.
    UnknownMethod,
    /// The arguments did not match the operation's input type.
    InvalidArgs,
    /// The receiving side is shutting down.
    Disposed,
    Internal,
}

/// Error returned by the other side of the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// A failed backing operation, with the underlying error attached as cause.
    pub fn backing(message: impl Into<String>, cause: &dyn std::error::Error) -> Self {
        Self {
            kind: ApiErrorKind::BackingOperation,
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Error surfaced to local application code.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("guest did not signal readiness within {waited:?}")]
    InitTimeout { waited: Duration },

    #[error("envelope is already initialized")]
    DuplicateInit,

    #[error("envelope is not ready; init has not completed")]
    NotReady,

    #[error("channel is disposed")]
    Disposed,

    #[error("request '{method}' timed out after {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },

    #[error("a call to '{method}' is already in flight")]
    ConcurrentCall { method: String },

    #[error("remote side rejected the call: {0}")]
    Remote(#[from] ApiError),

    #[error(transparent)]
    Codec(#[from] crate::typed::CodecError),

    #[error(transparent)]
    Transport(#[from] crate::ports::TransportError),

    #[error(transparent)]
    Origin(#[from] OriginError),
}

impl EnvelopeError {
    /// Kind of the remote error, if this error came from the other side.
    pub fn remote_kind(&self) -> Option<ApiErrorKind> {
        match self {
            EnvelopeError::Remote(e) => Some(e.kind),
            _ => None,
        }
    }
}

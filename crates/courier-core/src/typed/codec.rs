//! PayloadCodec - tagged union と (method, args) の相互変換
//!
//! # エンコードフロー
//! 1. request enum を serde_json で `{ "method": ..., "args": ... }` に変換
//! 2. `method` を message の `type` に、`args` を message の `args` に分ける
//!
//! デコードはその逆です。args のない variant（unit variant）は `args: null` で運びます。

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::{ApiError, ApiErrorKind};

const METHOD_KEY: &str = "method";
const ARGS_KEY: &str = "args";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cannot encode {contract} message: {source}")]
    Encode {
        contract: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{contract} message encoded without a method tag")]
    MissingMethod { contract: &'static str },

    #[error("{contract} has no operation named '{method}'")]
    UnknownMethod {
        contract: &'static str,
        method: String,
    },

    #[error("invalid arguments for '{method}': {source}")]
    InvalidArgs {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode the result of '{method}': {source}")]
    InvalidResult {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<CodecError> for ApiError {
    fn from(e: CodecError) -> Self {
        let kind = match &e {
            CodecError::UnknownMethod { .. } => ApiErrorKind::UnknownMethod,
            CodecError::InvalidArgs { .. } => ApiErrorKind::InvalidArgs,
            _ => ApiErrorKind::Internal,
        };
        ApiError::new(kind, e.to_string())
    }
}

pub struct PayloadCodec;

impl PayloadCodec {
    /// Split a tagged operation into its wire method name and args.
    pub fn encode<T: Serialize>(
        contract: &'static str,
        operation: &T,
    ) -> Result<(String, Value), CodecError> {
        let value = serde_json::to_value(operation)
            .map_err(|source| CodecError::Encode { contract, source })?;
        let Value::Object(mut map) = value else {
            return Err(CodecError::MissingMethod { contract });
        };
        let method = match map.remove(METHOD_KEY) {
            Some(Value::String(method)) => method,
            _ => return Err(CodecError::MissingMethod { contract }),
        };
        let args = map.remove(ARGS_KEY).unwrap_or(Value::Null);
        Ok((method, args))
    }

    /// Rebuild the tagged operation from a wire method name and args.
    pub fn decode<T: DeserializeOwned>(
        contract: &'static str,
        method: &str,
        args: Value,
    ) -> Result<T, CodecError> {
        let mut map = Map::new();
        map.insert(METHOD_KEY.to_string(), Value::String(method.to_string()));
        if !args.is_null() {
            map.insert(ARGS_KEY.to_string(), args);
        }
        serde_json::from_value(Value::Object(map)).map_err(|source| {
            if source.to_string().starts_with("unknown variant") {
                CodecError::UnknownMethod {
                    contract,
                    method: method.to_string(),
                }
            } else {
                CodecError::InvalidArgs {
                    method: method.to_string(),
                    source,
                }
            }
        })
    }

    /// Decode the args of a request that is not part of a tagged union (the init handshake).
    pub fn decode_args<T: DeserializeOwned>(method: &str, args: Value) -> Result<T, CodecError> {
        serde_json::from_value(args).map_err(|source| CodecError::InvalidArgs {
            method: method.to_string(),
            source,
        })
    }

    /// Decode a response result into the operation's output type.
    pub fn decode_result<O: DeserializeOwned>(method: &str, result: Value) -> Result<O, CodecError> {
        serde_json::from_value(result).map_err(|source| CodecError::InvalidResult {
            method: method.to_string(),
            source,
        })
    }

    /// Encode an operation's output for the response.
    pub fn encode_result<O: Serialize>(method: &str, output: &O) -> Result<Value, CodecError> {
        serde_json::to_value(output).map_err(|source| CodecError::InvalidResult {
            method: method.to_string(),
            source,
        })
    }
}

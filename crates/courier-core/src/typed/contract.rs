//! ApiContract - 1 つの API（Envelope API / Channel API）の型定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`, `const INIT_METHOD`)
//! - Associated Types で request / notification の tagged union を結び付ける
//!
//! 各 view は request 用と notification 用の enum を 1 つずつ持ちます。
//! enum は `#[serde(tag = "method", content = "args")]` で、variant 名を
//! `<view>__<operation>` に rename します。実行時の名前解決（reflection）はありません。

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::Association;

/// The set of operations one side exposes to the other.
///
/// # 使用例
/// ```ignore
/// pub struct TaskDetailsChannel;
///
/// impl ApiContract for TaskDetailsChannel {
///     const NAME: &'static str = "taskDetailsChannel";
///     type Request = TaskDetailsChannelRequest;
///     type Notification = NoOperations;
/// }
/// ```
pub trait ApiContract: Send + Sync + 'static {
    /// Used in logs and codec errors.
    const NAME: &'static str;

    /// Tagged union of every request operation.
    type Request: Serialize + DeserializeOwned + Debug + Send + 'static;

    /// Tagged union of every fire-and-forget operation.
    type Notification: Serialize + DeserializeOwned + Debug + Send + 'static;
}

/// An Envelope API: the contract served by a guest, with its init handshake.
pub trait EnvelopeContract: ApiContract {
    /// Wire name of the handshake request, e.g. `taskDetails__init`.
    const INIT_METHOD: &'static str;

    /// View-specific initial state sent once with the handshake.
    type InitArgs: Serialize + DeserializeOwned + Debug + Clone + Send + Sync + 'static;
}

/// Payload of the init request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest<A> {
    pub association: Association,
    pub init_args: A,
}

/// Placeholder for contracts without requests or without notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOperations {}

//! BusTransport port - postMessage 相当の配送路
//!
//! BusTransport はメッセージを相手側の origin に非同期で届けるだけです。
//! 配送確認も順序以外の保証もありません。
//!
//! # 設計原則
//! - `post` は target origin が相手の origin と一致しない場合、黙って捨てる
//! - 相手が listen していない場合も捨てる（listener のない window と同じ）
//! - 受信側は `IncomingMessage::origin` を検証してから payload を信用する
//! - 1 endpoint につき FIFO

use tokio::sync::mpsc;

use crate::domain::{EnvelopeBusMessage, Origin, TargetOrigin};

/// A message as received, with the sender's origin attached by the transport.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub origin: Origin,
    pub message: EnvelopeBusMessage,
}

/// Receive side of a transport. Dropping it unregisters the listener.
pub type Inbound = mpsc::UnboundedReceiver<IncomingMessage>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("a listener is already registered for {0}")]
    AlreadyListening(Origin),
}

pub trait BusTransport: Send + Sync {
    /// Origin of this endpoint; stamped on every message it posts.
    fn origin(&self) -> &Origin;

    /// Deliver `message` to the peer if the peer's origin matches `target_origin`.
    fn post(&self, message: EnvelopeBusMessage, target_origin: &TargetOrigin);

    /// Register the receive side of this endpoint.
    fn listen(&self) -> Result<Inbound, TransportError>;
}

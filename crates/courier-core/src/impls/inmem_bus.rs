//! InMemoryBus - プロセス内の postMessage 代替
//!
//! 2 つの endpoint（host 側 / guest 側）を対にして作ります。
//!
//! # 実装詳細
//! - 各 endpoint は自分の listener（mpsc sender）を slot に持つ
//! - `post` は相手の slot を見て origin を照合し、一致すれば送る
//! - 一致しない / listener がいない場合は黙って捨てる（ブラウザと同じ）
//! - receiver を drop すると listener は自動的に外れる

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::domain::{EnvelopeBusMessage, Origin, TargetOrigin};
use crate::ports::{BusTransport, Inbound, IncomingMessage, TransportError};

#[derive(Debug)]
struct Slot {
    origin: Origin,
    listener: Option<mpsc::UnboundedSender<IncomingMessage>>,
}

impl Slot {
    fn new(origin: Origin) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            origin,
            listener: None,
        }))
    }

    fn live_listener(&self) -> Option<&mpsc::UnboundedSender<IncomingMessage>> {
        self.listener.as_ref().filter(|tx| !tx.is_closed())
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory for connected endpoint pairs.
pub struct InMemoryBus;

impl InMemoryBus {
    /// Returns `(host_endpoint, guest_endpoint)`.
    pub fn pair(host_origin: Origin, guest_origin: Origin) -> (BusEndpoint, BusEndpoint) {
        let host = Slot::new(host_origin.clone());
        let guest = Slot::new(guest_origin.clone());
        (
            BusEndpoint {
                origin: host_origin,
                own: host.clone(),
                peer: guest.clone(),
            },
            BusEndpoint {
                origin: guest_origin,
                own: guest,
                peer: host,
            },
        )
    }
}

/// One side of an in-memory bus.
#[derive(Debug)]
pub struct BusEndpoint {
    origin: Origin,
    own: Arc<Mutex<Slot>>,
    peer: Arc<Mutex<Slot>>,
}

impl BusEndpoint {
    /// Is a live listener registered on this endpoint?
    pub fn has_listener(&self) -> bool {
        lock(&self.own).live_listener().is_some()
    }
}

impl BusTransport for BusEndpoint {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn post(&self, message: EnvelopeBusMessage, target_origin: &TargetOrigin) {
        let peer = lock(&self.peer);
        if !target_origin.matches(&peer.origin) {
            tracing::debug!(
                from = %self.origin,
                target = %target_origin,
                actual = %peer.origin,
                method = message.body.method(),
                "dropping message: target origin mismatch"
            );
            return;
        }
        let Some(tx) = peer.live_listener() else {
            tracing::debug!(
                from = %self.origin,
                to = %peer.origin,
                method = message.body.method(),
                "dropping message: no listener"
            );
            return;
        };
        let incoming = IncomingMessage {
            origin: self.origin.clone(),
            message,
        };
        if tx.send(incoming).is_err() {
            tracing::debug!(to = %peer.origin, "dropping message: listener went away");
        }
    }

    fn listen(&self) -> Result<Inbound, TransportError> {
        let mut own = lock(&self.own);
        if own.live_listener().is_some() {
            return Err(TransportError::AlreadyListening(own.origin.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        own.listener = Some(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnvelopeServerId, MessageBody};
    use serde_json::json;
    use ulid::Ulid;

    fn origins() -> (Origin, Origin) {
        (
            Origin::parse("http://host").unwrap(),
            Origin::parse("http://guest").unwrap(),
        )
    }

    fn notification(n: u64) -> EnvelopeBusMessage {
        EnvelopeBusMessage::new(
            EnvelopeServerId::from_ulid(Ulid::new()),
            MessageBody::Notification {
                method: "test__ping".into(),
                args: json!(n),
            },
        )
    }

    #[tokio::test]
    async fn delivers_in_send_order_with_sender_origin() {
        let (host_origin, guest_origin) = origins();
        let (host, guest) = InMemoryBus::pair(host_origin.clone(), guest_origin.clone());
        let mut inbound = guest.listen().unwrap();

        for n in 0..5 {
            host.post(notification(n), &TargetOrigin::Exact(guest_origin.clone()));
        }

        for n in 0..5 {
            let incoming = inbound.recv().await.unwrap();
            assert_eq!(incoming.origin, host_origin);
            let MessageBody::Notification { args, .. } = incoming.message.body else {
                panic!("expected a notification");
            };
            assert_eq!(args, json!(n));
        }
    }

    #[tokio::test]
    async fn mismatched_target_origin_is_dropped() {
        let (host_origin, guest_origin) = origins();
        let (host, guest) = InMemoryBus::pair(host_origin, guest_origin);
        let mut inbound = guest.listen().unwrap();

        host.post(
            notification(1),
            &TargetOrigin::Exact(Origin::parse("http://evil").unwrap()),
        );
        host.post(notification(2), &TargetOrigin::Any);

        let incoming = inbound.recv().await.unwrap();
        let MessageBody::Notification { args, .. } = incoming.message.body else {
            panic!("expected a notification");
        };
        assert_eq!(args, json!(2));
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn messages_before_listen_are_lost() {
        let (host_origin, guest_origin) = origins();
        let (host, guest) = InMemoryBus::pair(host_origin, guest_origin);

        host.post(notification(1), &TargetOrigin::Any);
        let mut inbound = guest.listen().unwrap();
        host.post(notification(2), &TargetOrigin::Any);

        let incoming = inbound.recv().await.unwrap();
        let MessageBody::Notification { args, .. } = incoming.message.body else {
            panic!("expected a notification");
        };
        assert_eq!(args, json!(2));
    }

    #[test]
    fn one_listener_at_a_time() {
        let (host_origin, guest_origin) = origins();
        let (_host, guest) = InMemoryBus::pair(host_origin, guest_origin);

        let inbound = guest.listen().unwrap();
        assert!(guest.has_listener());
        assert!(matches!(
            guest.listen(),
            Err(TransportError::AlreadyListening(_))
        ));

        drop(inbound);
        assert!(!guest.has_listener());
        assert!(guest.listen().is_ok());
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::ContainerStatus;
use crate::domain::container::container_removed;
use crate::ports::{Inbound, IncomingMessage};

/// Receives every message delivered to one side of a pairing.
#[async_trait]
pub(crate) trait InboundHandler: Send + Sync {
    async fn on_message(&self, incoming: IncomingMessage);

    /// The container went away; the side should dispose itself.
    async fn on_container_removed(&self);
}

/// Listener handle.
/// - `stop()` で loop を抜け、Inbound receiver を drop する（listener が外れる）
/// - container が Removed になった場合も loop は自分で終わる
pub(crate) struct Listener {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Listener {
    pub(crate) fn spawn(
        inbound: Inbound,
        container: watch::Receiver<ContainerStatus>,
        handler: Arc<dyn InboundHandler>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(listen_loop(inbound, container, handler, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Stop listening and wait for the loop to exit.
    pub(crate) async fn stop(self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

async fn listen_loop(
    mut inbound: Inbound,
    mut container: watch::Receiver<ContainerStatus>,
    handler: Arc<dyn InboundHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // handler は振り分けだけ行い、view / driver の処理は別 task に渡すこと
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = container_removed(&mut container) => {
                tracing::debug!("container removed; listener exiting");
                handler.on_container_removed().await;
                break;
            }
            incoming = inbound.recv() => {
                let Some(incoming) = incoming else {
                    break;
                };
                handler.on_message(incoming).await;
            }
        }
    }
}

//! EnvelopeServer - host 側の endpoint
//!
//! 1 つの container（= 1 つの埋め込み guest）につき 1 つ生成します。
//!
//! # 学習ポイント
//! - `Arc<ServerCore>` を listener task と共有する
//! - readiness marker の polling（watch + interval + deadline の select）
//! - 受信メッセージの検証（envelope server id と origin）

use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};

use super::builder::{BuildError, ServerBuilder};
use super::listener::{InboundHandler, Listener};
use super::manager::{MessageManager, Route};
use super::status::ServerStatus;
use crate::domain::{
    Association, ContainerHandle, ContainerStatus, EnvelopeError, EnvelopeServerId, MessageBody,
    Origin, TargetOrigin,
};
use crate::ports::{BusTransport, IncomingMessage};
use crate::typed::{ApiClient, ApiContract, ApiHandler, DynHandler, EnvelopeContract};

pub(crate) struct ServerCore {
    pub(crate) id: EnvelopeServerId,
    pub(crate) origin: Origin,
    pub(crate) container: ContainerHandle,
    pub(crate) manager: Arc<MessageManager>,
    pub(crate) driver: Arc<dyn DynHandler>,
}

impl ServerCore {
    fn route(&self) -> Route {
        Route {
            envelope_server_id: self.id,
            target_origin: TargetOrigin::Exact(self.container.origin().clone()),
        }
    }
}

#[async_trait]
impl InboundHandler for ServerCore {
    async fn on_message(&self, incoming: IncomingMessage) {
        let IncomingMessage { origin, message } = incoming;
        if message.envelope_server_id != self.id {
            // 他の埋め込みとの混線を防ぐ
            tracing::debug!(
                envelope_server_id = %self.id,
                other = %message.envelope_server_id,
                purpose = message.body.purpose(),
                "ignoring message for another envelope server"
            );
            return;
        }
        if &origin != self.container.origin() {
            tracing::debug!(
                envelope_server_id = %self.id,
                %origin,
                expected = %self.container.origin(),
                purpose = message.body.purpose(),
                "ignoring message from unexpected origin"
            );
            return;
        }
        if self.manager.is_disposed() {
            return;
        }

        match message.body {
            MessageBody::Response {
                request_id,
                method,
                result,
                error,
            } => {
                self.manager.complete(request_id, &method, result, error);
            }
            MessageBody::Request {
                request_id,
                method,
                args,
            } => {
                self.manager.spawn_request(
                    self.route(),
                    request_id,
                    method,
                    args,
                    Arc::clone(&self.driver),
                );
            }
            MessageBody::Notification { method, args } => {
                tracing::debug!(envelope_server_id = %self.id, method, "notification");
                self.manager.enqueue_notification(method, args);
            }
        }
    }

    async fn on_container_removed(&self) {
        let rejected = self.manager.dispose();
        tracing::info!(
            envelope_server_id = %self.id,
            container = self.container.name(),
            rejected,
            "container removed; envelope server disposed"
        );
    }
}

/// Host-side endpoint paired with one embedded guest.
///
/// `E` is the guest's Envelope API, `C` the Channel API served by the driver.
///
/// # 使用例
/// ```ignore
/// let server = EnvelopeServer::<TaskDetailsEnvelope, TaskDetailsChannel>::generate(
///     container, host_origin, transport, driver,
/// )?;
/// server
///     .poll_init(|| server.envelope_api().init(server.association(), init_args))
///     .await?;
/// ```
pub struct EnvelopeServer<E: EnvelopeContract, C: ApiContract> {
    core: Arc<ServerCore>,
    listener: Mutex<Option<Listener>>,
    _marker: PhantomData<fn() -> (E, C)>,
}

impl<E: EnvelopeContract, C: ApiContract> EnvelopeServer<E, C> {
    pub fn builder(container: ContainerHandle, origin: Origin) -> ServerBuilder<E, C> {
        ServerBuilder::new(container, origin)
    }

    /// Build a server with default configuration and id generation.
    pub fn generate<H>(
        container: ContainerHandle,
        origin: Origin,
        transport: Arc<dyn BusTransport>,
        driver: Arc<H>,
    ) -> Result<Self, BuildError>
    where
        H: ApiHandler<C> + ?Sized + 'static,
    {
        Self::builder(container, origin)
            .transport(transport)
            .driver(driver)
            .generate()
    }

    pub(crate) fn start(core: ServerCore, inbound: crate::ports::Inbound) -> Self {
        let core = Arc::new(core);
        core.manager.start_notifications(Arc::clone(&core.driver));
        let listener = Listener::spawn(
            inbound,
            core.container.watch(),
            Arc::clone(&core) as Arc<dyn InboundHandler>,
        );
        tracing::info!(
            envelope_server_id = %core.id,
            container = core.container.name(),
            target = %core.container.origin(),
            "envelope server started"
        );
        Self {
            core,
            listener: Mutex::new(Some(listener)),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> EnvelopeServerId {
        self.core.id
    }

    /// The association the guest must receive in its init request.
    pub fn association(&self) -> Association {
        Association::new(self.core.origin.clone(), self.core.id)
    }

    pub fn container(&self) -> &ContainerHandle {
        &self.core.container
    }

    /// Typed caller for the guest's Envelope API.
    pub fn envelope_api(&self) -> ApiClient<E> {
        ApiClient::new(Arc::clone(&self.core.manager), self.core.route())
    }

    /// Wait for the guest's readiness marker, then run `init` exactly once.
    ///
    /// The marker is re-checked on every `init_poll_interval` tick and as soon
    /// as it changes. The whole handshake, `init` included, is bounded by
    /// `init_timeout`.
    pub async fn poll_init<F, Fut>(&self, init: F) -> Result<(), EnvelopeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), EnvelopeError>>,
    {
        let config = self.core.manager.config();
        let waited = config.init_timeout;
        let deadline = Instant::now() + waited;
        let mut status = self.core.container.watch();
        let mut ticker = tokio::time::interval(config.init_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.core.manager.is_disposed() {
                return Err(EnvelopeError::Disposed);
            }
            let current = *status.borrow_and_update();
            match current {
                ContainerStatus::Ready => break,
                ContainerStatus::Removed => return Err(EnvelopeError::Disposed),
                ContainerStatus::Mounted => {}
            }

            tokio::select! {
                _ = ticker.tick() => {
                    tracing::trace!(envelope_server_id = %self.core.id, "guest not ready yet");
                }
                _ = status.changed() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        envelope_server_id = %self.core.id,
                        ?waited,
                        "guest did not become ready in time"
                    );
                    return Err(EnvelopeError::InitTimeout { waited });
                }
            }
        }

        tracing::debug!(envelope_server_id = %self.core.id, "guest ready; sending init");
        match tokio::time::timeout_at(deadline, init()).await {
            Ok(outcome) => {
                if outcome.is_ok() {
                    tracing::info!(envelope_server_id = %self.core.id, "guest initialized");
                }
                outcome
            }
            Err(_) => Err(EnvelopeError::InitTimeout { waited }),
        }
    }

    /// `poll_init` with the standard handshake request.
    pub async fn init(&self, init_args: E::InitArgs) -> Result<(), EnvelopeError> {
        let api = self.envelope_api();
        let association = self.association();
        self.poll_init(|| async move { api.init(association, init_args).await })
            .await
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            envelope_server_id: self.core.id,
            container: self.core.container.status(),
            pending_requests: self.core.manager.pending_requests(),
            disposed: self.core.manager.is_disposed(),
        }
    }

    /// Reject pending requests and stop listening. Idempotent.
    pub async fn dispose(&self) {
        let rejected = self.core.manager.dispose();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.stop().await;
            tracing::info!(envelope_server_id = %self.core.id, rejected, "envelope server disposed");
        }
    }
}

//! Envelope - guest 側の endpoint
//!
//! # 状態と受信ルール
//! - association が無い間は init request だけを受け付ける（他の request には not-ready を返す）
//! - init は AwaitingInit のときだけ受け付ける。それ以外は duplicate-init
//! - association 成立後は、その origin / envelope server id 以外のメッセージを捨てる
//! - view の init が成功して初めて Ready になり、Channel API を呼べる
//!
//! 状態は `watch` で持つので `wait_ready()` は polling せずに待てます。

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use super::listener::{InboundHandler, Listener};
use super::manager::{MessageManager, Route};
use super::status::EnvelopeStatus;
use crate::config::BusConfig;
use crate::domain::{
    ApiError, ApiErrorKind, Association, ContainerHandle, EnvelopeError, EnvelopeServerId,
    EnvelopeState, MessageBody, Origin, RequestId, TargetOrigin,
};
use crate::ports::{BusTransport, IdGenerator, IncomingMessage, SystemClock, UlidGenerator};
use crate::typed::{
    ApiClient, ApiContract, DynHandler, EnvelopeContract, EnvelopeHandler, InitRequest,
    PayloadCodec, erase,
};

struct EnvelopeCore<E: EnvelopeContract> {
    container: ContainerHandle,
    manager: Arc<MessageManager>,
    api: Arc<dyn EnvelopeHandler<E>>,
    dispatch: Arc<dyn DynHandler>,
    state: watch::Sender<EnvelopeState>,
    association: Mutex<Option<Association>>,
}

impl<E: EnvelopeContract> EnvelopeCore<E> {
    fn lock_association(&self) -> MutexGuard<'_, Option<Association>> {
        self.association
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> EnvelopeState {
        *self.state.borrow()
    }

    /// Move `from` → `to`. Returns false if the state was something else.
    fn transition(&self, from: EnvelopeState, to: EnvelopeState) -> bool {
        self.state.send_if_modified(|state| {
            if *state != from {
                return false;
            }
            *state = to;
            true
        })
    }

    /// Claim the init slot. Only one init can hold it at a time.
    fn begin_initializing(&self) -> bool {
        self.state.send_if_modified(|state| {
            if !state.accepts_init() {
                return false;
            }
            *state = EnvelopeState::Initializing;
            true
        })
    }

    fn dispose(&self) -> usize {
        self.state.send_replace(EnvelopeState::Disposed);
        self.manager.dispose()
    }
}

/// Listener-side view of the core; owns an `Arc` so init can run on its own task.
struct GuestInbound<E: EnvelopeContract>(Arc<EnvelopeCore<E>>);

impl<E: EnvelopeContract> GuestInbound<E> {
    fn begin_init(
        &self,
        origin: Origin,
        envelope_server_id: EnvelopeServerId,
        request_id: RequestId,
        args: Value,
    ) {
        let core = &self.0;
        let reply_to = Route {
            envelope_server_id,
            target_origin: TargetOrigin::Exact(origin.clone()),
        };
        let method = E::INIT_METHOD.to_string();

        // 状態遷移は listener task 上で同期的に行う（2 通目の init が必ず弾かれる）
        if !core.begin_initializing() {
            tracing::warn!(%envelope_server_id, state = ?core.state(), "duplicate init rejected");
            core.manager.respond(
                &reply_to,
                request_id,
                method,
                Err(ApiError::new(
                    ApiErrorKind::DuplicateInit,
                    "envelope is already initialized",
                )),
            );
            return;
        }

        let init: InitRequest<E::InitArgs> = match PayloadCodec::decode_args(&method, args) {
            Ok(init) => init,
            Err(e) => {
                core.transition(EnvelopeState::Initializing, EnvelopeState::AwaitingInit);
                core.manager
                    .respond(&reply_to, request_id, method, Err(ApiError::from(e)));
                return;
            }
        };
        let association = init.association;
        if association.origin() != &origin
            || association.envelope_server_id() != envelope_server_id
        {
            tracing::warn!(
                %origin,
                claimed = %association.origin(),
                "init association does not match its sender; ignoring"
            );
            core.transition(EnvelopeState::Initializing, EnvelopeState::AwaitingInit);
            return;
        }

        let task_core = Arc::clone(core);
        core.manager.spawn_tracked(async move {
            let core = task_core;
            match core.api.init(association.clone(), init.init_args).await {
                Ok(()) => {
                    *core.lock_association() = Some(association);
                    if !core.transition(EnvelopeState::Initializing, EnvelopeState::Ready) {
                        // disposed while the view was initializing
                        return;
                    }
                    tracing::info!(
                        %envelope_server_id,
                        container = core.container.name(),
                        "envelope ready"
                    );
                    core.manager
                        .respond(&reply_to, request_id, method, Ok(Value::Null));
                }
                Err(error) => {
                    tracing::warn!(%envelope_server_id, %error, "view init failed");
                    core.transition(EnvelopeState::Initializing, EnvelopeState::AwaitingInit);
                    core.manager.respond(&reply_to, request_id, method, Err(error));
                }
            }
        });
    }
}

#[async_trait]
impl<E: EnvelopeContract> InboundHandler for GuestInbound<E> {
    async fn on_message(&self, incoming: IncomingMessage) {
        let core = &self.0;
        let IncomingMessage { origin, message } = incoming;
        let envelope_server_id = message.envelope_server_id;
        if core.state().is_terminal() {
            return;
        }

        let association = core.lock_association().clone();
        if let Some(association) = &association {
            if !association.accepts(&origin, envelope_server_id) {
                tracing::debug!(
                    %origin,
                    %envelope_server_id,
                    purpose = message.body.purpose(),
                    "ignoring message outside the association"
                );
                return;
            }
        }

        match message.body {
            MessageBody::Request {
                request_id,
                method,
                args,
            } if method == E::INIT_METHOD => {
                self.begin_init(origin, envelope_server_id, request_id, args);
            }
            MessageBody::Request {
                request_id,
                method,
                args,
            } => {
                let reply_to = Route {
                    envelope_server_id,
                    target_origin: TargetOrigin::Exact(origin),
                };
                if association.is_none() || !core.state().is_ready() {
                    tracing::debug!(method, "request before init; not ready");
                    core.manager.respond(
                        &reply_to,
                        request_id,
                        method,
                        Err(ApiError::new(
                            ApiErrorKind::NotReady,
                            "envelope has not been initialized",
                        )),
                    );
                    return;
                }
                core.manager.spawn_request(
                    reply_to,
                    request_id,
                    method,
                    args,
                    Arc::clone(&core.dispatch),
                );
            }
            MessageBody::Response {
                request_id,
                method,
                result,
                error,
            } => {
                if association.is_some() {
                    core.manager.complete(request_id, &method, result, error);
                }
            }
            MessageBody::Notification { method, args } => {
                if !core.state().is_ready() {
                    tracing::debug!(method, "notification before init; dropped");
                    return;
                }
                tracing::debug!(method, "notification");
                core.manager.enqueue_notification(method, args);
            }
        }
    }

    async fn on_container_removed(&self) {
        let rejected = self.0.dispose();
        tracing::info!(
            container = self.0.container.name(),
            rejected,
            "container removed; envelope disposed"
        );
    }
}

/// Guest-side endpoint.
///
/// `E` is the Envelope API this guest serves, `C` the host's Channel API it calls.
///
/// # 使用例
/// ```ignore
/// let envelope = Envelope::<TaskDetailsEnvelope, TaskDetailsChannel>::new(
///     container, transport, Arc::new(view), BusConfig::default(),
/// );
/// envelope.start()?;
/// envelope.wait_ready().await?;
/// let task = envelope.channel_api()?.get_task("t1").await?;
/// ```
pub struct Envelope<E: EnvelopeContract, C: ApiContract> {
    core: Arc<EnvelopeCore<E>>,
    listener: Mutex<Option<Listener>>,
    _marker: PhantomData<fn() -> C>,
}

impl<E: EnvelopeContract, C: ApiContract> Envelope<E, C> {
    pub fn new<H>(
        container: ContainerHandle,
        transport: Arc<dyn BusTransport>,
        api: Arc<H>,
        config: BusConfig,
    ) -> Self
    where
        H: EnvelopeHandler<E> + 'static,
    {
        Self::with_id_generator(
            container,
            transport,
            api,
            config,
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    pub fn with_id_generator<H>(
        container: ContainerHandle,
        transport: Arc<dyn BusTransport>,
        api: Arc<H>,
        config: BusConfig,
        ids: Arc<dyn IdGenerator>,
    ) -> Self
    where
        H: EnvelopeHandler<E> + 'static,
    {
        let api: Arc<dyn EnvelopeHandler<E>> = api;
        let dispatch = erase::<E, dyn EnvelopeHandler<E>>(Arc::clone(&api));
        let (state, _) = watch::channel(EnvelopeState::Created);
        Self {
            core: Arc::new(EnvelopeCore {
                container,
                manager: Arc::new(MessageManager::new(transport, ids, config)),
                api,
                dispatch,
                state,
                association: Mutex::new(None),
            }),
            listener: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    /// Register the bus listener and set the container's readiness marker.
    ///
    /// Calling it again after a successful start is a no-op.
    pub fn start(&self) -> Result<(), EnvelopeError> {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        match self.core.state() {
            EnvelopeState::Created => {}
            EnvelopeState::Disposed => return Err(EnvelopeError::Disposed),
            _ => return Ok(()),
        }
        let inbound = self.core.manager.transport().listen()?;
        self.core
            .manager
            .start_notifications(Arc::clone(&self.core.dispatch));
        *listener = Some(Listener::spawn(
            inbound,
            self.core.container.watch(),
            Arc::new(GuestInbound(Arc::clone(&self.core))),
        ));
        self.core
            .transition(EnvelopeState::Created, EnvelopeState::AwaitingInit);

        if !self.core.container.mark_ready() {
            self.core.dispose();
            return Err(EnvelopeError::Disposed);
        }
        tracing::info!(
            container = self.core.container.name(),
            origin = %self.core.manager.transport().origin(),
            "envelope listening"
        );
        Ok(())
    }

    pub fn state(&self) -> EnvelopeState {
        self.core.state()
    }

    pub fn association(&self) -> Option<Association> {
        self.core.lock_association().clone()
    }

    /// Wait until the init handshake has completed.
    pub async fn wait_ready(&self) -> Result<Association, EnvelopeError> {
        let mut state = self.core.state.subscribe();
        let reached = state
            .wait_for(|s| matches!(s, EnvelopeState::Ready | EnvelopeState::Disposed))
            .await
            .map(|s| *s);
        match reached {
            Ok(EnvelopeState::Ready) => self.association().ok_or(EnvelopeError::NotReady),
            _ => Err(EnvelopeError::Disposed),
        }
    }

    /// Typed caller for the host's Channel API. Available only once `Ready`.
    pub fn channel_api(&self) -> Result<ApiClient<C>, EnvelopeError> {
        match self.core.state() {
            EnvelopeState::Ready => {}
            EnvelopeState::Disposed => return Err(EnvelopeError::Disposed),
            _ => return Err(EnvelopeError::NotReady),
        }
        let association = self.association().ok_or(EnvelopeError::NotReady)?;
        Ok(ApiClient::new(
            Arc::clone(&self.core.manager),
            Route {
                envelope_server_id: association.envelope_server_id(),
                target_origin: TargetOrigin::Exact(association.origin().clone()),
            },
        ))
    }

    pub fn status(&self) -> EnvelopeStatus {
        EnvelopeStatus {
            state: self.core.state(),
            association: self.association(),
            pending_requests: self.core.manager.pending_requests(),
        }
    }

    /// Reject pending channel-API calls and stop listening. Idempotent.
    pub async fn dispose(&self) {
        let rejected = self.core.dispose();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.stop().await;
            tracing::info!(
                container = self.core.container.name(),
                rejected,
                "envelope disposed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnvelopeBusMessage;
    use crate::impls::InMemoryBus;
    use crate::ports::Inbound;
    use crate::typed::{ApiHandler, NoOperations};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ulid::Ulid;

    struct Greeter;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "method", content = "args")]
    enum GreeterRequest {
        #[serde(rename = "greeter__greet")]
        Greet { name: String },
    }

    impl ApiContract for Greeter {
        const NAME: &'static str = "greeter";
        type Request = GreeterRequest;
        type Notification = NoOperations;
    }

    impl EnvelopeContract for Greeter {
        const INIT_METHOD: &'static str = "greeter__init";
        type InitArgs = String;
    }

    #[derive(Default)]
    struct GreeterView {
        inits: AtomicUsize,
    }

    #[async_trait]
    impl ApiHandler<Greeter> for GreeterView {
        async fn on_request(&self, request: GreeterRequest) -> Result<Value, ApiError> {
            let GreeterRequest::Greet { name } = request;
            Ok(json!(format!("hello {name}")))
        }
    }

    #[async_trait]
    impl EnvelopeHandler<Greeter> for GreeterView {
        async fn init(&self, _association: Association, greeting: String) -> Result<(), ApiError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if greeting.is_empty() {
                return Err(ApiError::new(ApiErrorKind::InvalidArgs, "empty greeting"));
            }
            Ok(())
        }
    }

    struct Harness {
        envelope: Envelope<Greeter, Greeter>,
        view: Arc<GreeterView>,
        host: Arc<dyn BusTransport>,
        host_inbound: Inbound,
        association: Association,
    }

    fn harness() -> Harness {
        let host_origin = Origin::parse("http://host").unwrap();
        let guest_origin = Origin::parse("http://guest").unwrap();
        let (host, guest) = InMemoryBus::pair(host_origin.clone(), guest_origin.clone());
        let host: Arc<dyn BusTransport> = Arc::new(host);
        let host_inbound = host.listen().unwrap();
        let view = Arc::new(GreeterView::default());
        let envelope = Envelope::new(
            ContainerHandle::mount("greeter", guest_origin),
            Arc::new(guest),
            Arc::clone(&view),
            BusConfig::default(),
        );
        let association =
            Association::new(host_origin, EnvelopeServerId::from_ulid(Ulid::new()));
        Harness {
            envelope,
            view,
            host,
            host_inbound,
            association,
        }
    }

    impl Harness {
        fn send_request(&self, method: &str, args: Value) -> RequestId {
            let request_id = RequestId::from_ulid(Ulid::new());
            self.host.post(
                EnvelopeBusMessage::new(
                    self.association.envelope_server_id(),
                    MessageBody::Request {
                        request_id,
                        method: method.to_string(),
                        args,
                    },
                ),
                &TargetOrigin::Any,
            );
            request_id
        }

        fn send_init(&self, greeting: &str) -> RequestId {
            let args = json!({ "association": self.association, "initArgs": greeting });
            self.send_request("greeter__init", args)
        }

        async fn response(&mut self) -> (RequestId, Result<Value, ApiError>) {
            let incoming = self.host_inbound.recv().await.unwrap();
            match incoming.message.body {
                MessageBody::Response {
                    request_id,
                    result,
                    error,
                    ..
                } => (
                    request_id,
                    crate::domain::envelope::response_outcome(result, error),
                ),
                other => panic!("expected a response, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn start_sets_the_readiness_marker() {
        let h = harness();
        assert_eq!(h.envelope.state(), EnvelopeState::Created);
        h.envelope.start().unwrap();
        assert_eq!(h.envelope.state(), EnvelopeState::AwaitingInit);
        assert!(h.envelope.core.container.is_ready());
        // second start is a no-op
        h.envelope.start().unwrap();
    }

    #[tokio::test]
    async fn init_makes_the_envelope_ready() {
        let mut h = harness();
        h.envelope.start().unwrap();

        let id = h.send_init("hi");
        let (reply_id, outcome) = h.response().await;
        assert_eq!(reply_id, id);
        assert_eq!(outcome.unwrap(), Value::Null);
        assert_eq!(h.envelope.wait_ready().await.unwrap(), h.association);
        assert!(h.envelope.channel_api().is_ok());
    }

    #[tokio::test]
    async fn requests_before_init_are_not_ready() {
        let mut h = harness();
        h.envelope.start().unwrap();

        h.send_request("greeter__greet", json!({ "name": "ann" }));
        let (_, outcome) = h.response().await;
        assert_eq!(outcome.unwrap_err().kind, ApiErrorKind::NotReady);
        assert!(matches!(h.envelope.channel_api(), Err(EnvelopeError::NotReady)));
    }

    #[tokio::test]
    async fn second_init_is_rejected_without_rerunning_the_view() {
        let mut h = harness();
        h.envelope.start().unwrap();

        h.send_init("hi");
        h.response().await.1.unwrap();
        h.send_init("again");
        let (_, outcome) = h.response().await;
        assert_eq!(outcome.unwrap_err().kind, ApiErrorKind::DuplicateInit);
        assert_eq!(h.view.inits.load(Ordering::SeqCst), 1);

        // requests are served after init
        h.send_request("greeter__greet", json!({ "name": "ann" }));
        assert_eq!(h.response().await.1.unwrap(), json!("hello ann"));
    }

    #[tokio::test]
    async fn failed_init_can_be_retried() {
        let mut h = harness();
        h.envelope.start().unwrap();

        h.send_init("");
        let (_, outcome) = h.response().await;
        assert_eq!(outcome.unwrap_err().kind, ApiErrorKind::InvalidArgs);
        assert_eq!(h.envelope.state(), EnvelopeState::AwaitingInit);

        h.send_init("hi");
        h.response().await.1.unwrap();
        assert_eq!(h.envelope.state(), EnvelopeState::Ready);
    }

    #[tokio::test]
    async fn malformed_init_args_are_invalid() {
        let mut h = harness();
        h.envelope.start().unwrap();

        h.send_request("greeter__init", json!({ "initArgs": 42 }));
        let (_, outcome) = h.response().await;
        assert_eq!(outcome.unwrap_err().kind, ApiErrorKind::InvalidArgs);
        assert_eq!(h.envelope.state(), EnvelopeState::AwaitingInit);
    }

    #[tokio::test]
    async fn container_removal_disposes_the_envelope() {
        let h = harness();
        h.envelope.start().unwrap();
        h.envelope.core.container.remove();

        assert!(matches!(
            h.envelope.wait_ready().await,
            Err(EnvelopeError::Disposed)
        ));
        assert!(matches!(h.envelope.channel_api(), Err(EnvelopeError::Disposed)));
        h.envelope.dispose().await;
        assert!(matches!(h.envelope.start(), Err(EnvelopeError::Disposed)));
    }
}

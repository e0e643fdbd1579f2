//! MessageManager - request/response の対応付けと pending call の管理
//!
//! # 学習ポイント
//! - oneshot channel による応答待ち（polling しない）
//! - Drop guard による cancel 時の後始末
//! - JoinSet による handler task の追跡（dispose で abort）
//! - notification は専用 task で到着順に処理する（listener を止めない）
//!
//! 1 request = 1 RequestId。response は RequestId と method の両方で照合します。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::config::{BusConfig, ConcurrentCallPolicy};
use crate::domain::envelope::response_outcome;
use crate::domain::{
    ApiError, EnvelopeBusMessage, EnvelopeError, EnvelopeServerId, MessageBody, RequestId,
    TargetOrigin,
};
use crate::ports::{BusTransport, IdGenerator};
use crate::typed::DynHandler;

/// Where outgoing messages of one pairing go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub envelope_server_id: EnvelopeServerId,
    pub target_origin: TargetOrigin,
}

struct PendingCall {
    method: String,
    reply: oneshot::Sender<Result<Value, EnvelopeError>>,
}

pub struct MessageManager {
    transport: Arc<dyn BusTransport>,
    ids: Arc<dyn IdGenerator>,
    config: BusConfig,
    pending: Mutex<HashMap<RequestId, PendingCall>>,
    handlers: Mutex<JoinSet<()>>,
    notifications: Mutex<Option<mpsc::UnboundedSender<(String, Value)>>>,
    disposed: AtomicBool,
}

/// Removes the pending entry if the caller stops waiting (timeout, cancellation).
struct PendingGuard<'a> {
    manager: &'a MessageManager,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.manager.lock_pending().remove(&self.request_id);
    }
}

impl MessageManager {
    pub fn new(
        transport: Arc<dyn BusTransport>,
        ids: Arc<dyn IdGenerator>,
        config: BusConfig,
    ) -> Self {
        Self {
            transport,
            ids,
            config,
            pending: Mutex::new(HashMap::new()),
            handlers: Mutex::new(JoinSet::new()),
            notifications: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn BusTransport> {
        &self.transport
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<RequestId, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handlers(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send a request and wait for its response.
    pub async fn request(
        &self,
        route: &Route,
        method: &str,
        args: Value,
    ) -> Result<Value, EnvelopeError> {
        let request_id = self.ids.generate_request_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.lock_pending();
            // checked under the lock so `dispose` cannot miss this call
            if self.is_disposed() {
                return Err(EnvelopeError::Disposed);
            }
            if self.config.concurrent_calls == ConcurrentCallPolicy::Reject
                && pending.values().any(|call| call.method == method)
            {
                tracing::warn!(method, "rejecting concurrent call");
                return Err(EnvelopeError::ConcurrentCall {
                    method: method.to_string(),
                });
            }
            pending.insert(
                request_id,
                PendingCall {
                    method: method.to_string(),
                    reply: tx,
                },
            );
        }
        let _guard = PendingGuard {
            manager: self,
            request_id,
        };

        tracing::debug!(
            envelope_server_id = %route.envelope_server_id,
            %request_id,
            method,
            "request"
        );
        self.transport.post(
            EnvelopeBusMessage::new(
                route.envelope_server_id,
                MessageBody::Request {
                    request_id,
                    method: method.to_string(),
                    args,
                },
            ),
            &route.target_origin,
        );

        let outcome = match self.config.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(%request_id, method, ?timeout, "request timed out");
                    return Err(EnvelopeError::RequestTimeout {
                        method: method.to_string(),
                        timeout,
                    });
                }
            },
            None => rx.await,
        };
        // a dropped sender means the call was drained without an answer
        outcome.unwrap_or(Err(EnvelopeError::Disposed))
    }

    /// Send a fire-and-forget notification.
    pub fn notify(&self, route: &Route, method: &str, args: Value) -> Result<(), EnvelopeError> {
        if self.is_disposed() {
            return Err(EnvelopeError::Disposed);
        }
        tracing::debug!(
            envelope_server_id = %route.envelope_server_id,
            method,
            "notification"
        );
        self.transport.post(
            EnvelopeBusMessage::new(
                route.envelope_server_id,
                MessageBody::Notification {
                    method: method.to_string(),
                    args,
                },
            ),
            &route.target_origin,
        );
        Ok(())
    }

    /// Post the response to a request handled on this side.
    pub fn respond(
        &self,
        route: &Route,
        request_id: RequestId,
        method: String,
        outcome: Result<Value, ApiError>,
    ) {
        if self.is_disposed() {
            tracing::debug!(%request_id, method, "disposed; dropping response");
            return;
        }
        if let Err(error) = &outcome {
            tracing::debug!(%request_id, method, %error, "responding with error");
        }
        self.transport.post(
            EnvelopeBusMessage::new(
                route.envelope_server_id,
                MessageBody::response(request_id, method, outcome),
            ),
            &route.target_origin,
        );
    }

    /// Resolve the pending call matching an incoming response.
    ///
    /// Returns false when no call with this id and method is waiting.
    pub fn complete(
        &self,
        request_id: RequestId,
        method: &str,
        result: Option<Value>,
        error: Option<ApiError>,
    ) -> bool {
        let call = {
            let mut pending = self.lock_pending();
            match pending.get(&request_id) {
                Some(call) if call.method == method => pending.remove(&request_id),
                Some(call) => {
                    tracing::warn!(
                        %request_id,
                        expected = call.method.as_str(),
                        actual = method,
                        "response method does not match the request"
                    );
                    None
                }
                None => {
                    tracing::debug!(%request_id, method, "response for unknown request");
                    None
                }
            }
        };
        let Some(call) = call else {
            return false;
        };
        let outcome = response_outcome(result, error).map_err(EnvelopeError::Remote);
        // the caller may have given up already
        let _ = call.reply.send(outcome);
        true
    }

    /// Run `handler` for an incoming request on its own task and post the response.
    pub fn spawn_request(
        self: &Arc<Self>,
        route: Route,
        request_id: RequestId,
        method: String,
        args: Value,
        handler: Arc<dyn DynHandler>,
    ) {
        let manager = Arc::clone(self);
        self.spawn_tracked(async move {
            tracing::debug!(
                contract = handler.contract(),
                %request_id,
                method,
                "handling request"
            );
            let outcome = handler.handle_request(&method, args).await;
            manager.respond(&route, request_id, method, outcome);
        });
    }

    /// Spawn a task that `dispose` aborts if it is still running.
    pub fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_disposed() {
            return;
        }
        let mut handlers = self.lock_handlers();
        while handlers.try_join_next().is_some() {}
        handlers.spawn(task);
    }

    /// Start the task that hands incoming notifications to `handler`, one at a time.
    ///
    /// The task is tracked, so a handler that never returns is aborted by `dispose`.
    pub fn start_notifications(&self, handler: Arc<dyn DynHandler>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();
        *self
            .notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.spawn_tracked(async move {
            while let Some((method, args)) = rx.recv().await {
                if let Err(error) = handler.handle_notification(&method, args).await {
                    tracing::warn!(
                        contract = handler.contract(),
                        method,
                        %error,
                        "notification rejected by handler"
                    );
                }
            }
        });
    }

    /// Queue an incoming notification behind the ones already received.
    ///
    /// Returns false if no notification task is running (not started or disposed).
    pub fn enqueue_notification(&self, method: String, args: Value) -> bool {
        let notifications = self
            .notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match notifications.as_ref() {
            Some(tx) => tx.send((method, args)).is_ok(),
            None => false,
        }
    }

    /// Reject every pending call with `Disposed` and abort running handlers.
    ///
    /// Returns the number of calls rejected. Idempotent.
    pub fn dispose(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut pending = self.lock_pending();
            self.disposed.store(true, Ordering::SeqCst);
            pending.drain().map(|(_, call)| call).collect()
        };
        let rejected = drained.len();
        for call in drained {
            let _ = call.reply.send(Err(EnvelopeError::Disposed));
        }
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.lock_handlers().abort_all();
        rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApiErrorKind, Origin};
    use crate::impls::InMemoryBus;
    use crate::ports::{Inbound, SystemClock, UlidGenerator};
    use serde_json::json;
    use std::time::Duration;
    use ulid::Ulid;

    fn setup(config: BusConfig) -> (Arc<MessageManager>, Inbound, Route) {
        let host = Origin::parse("http://host").unwrap();
        let guest = Origin::parse("http://guest").unwrap();
        let (host_end, guest_end) = InMemoryBus::pair(host, guest.clone());
        let inbound = guest_end.listen().unwrap();
        // keep the guest endpoint's slot alive through the receiver only
        drop(guest_end);
        let manager = Arc::new(MessageManager::new(
            Arc::new(host_end),
            Arc::new(UlidGenerator::new(SystemClock)),
            config,
        ));
        let route = Route {
            envelope_server_id: EnvelopeServerId::from_ulid(Ulid::new()),
            target_origin: TargetOrigin::Exact(guest),
        };
        (manager, inbound, route)
    }

    async fn next_request(inbound: &mut Inbound) -> (RequestId, String, Value) {
        let incoming = inbound.recv().await.unwrap();
        match incoming.message.body {
            MessageBody::Request {
                request_id,
                method,
                args,
            } => (request_id, method, args),
            other => panic!("expected a request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_resolves_the_matching_request() {
        let (manager, mut inbound, route) = setup(BusConfig::default());

        let call = tokio::spawn({
            let manager = manager.clone();
            let route = route.clone();
            async move { manager.request(&route, "view__get", json!({"id": 1})).await }
        });

        let (request_id, method, args) = next_request(&mut inbound).await;
        assert_eq!(method, "view__get");
        assert_eq!(args, json!({"id": 1}));
        assert_eq!(manager.pending_requests(), 1);

        assert!(manager.complete(request_id, "view__get", Some(json!({"ok": true})), None));
        assert_eq!(call.await.unwrap().unwrap(), json!({"ok": true}));
        assert_eq!(manager.pending_requests(), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_are_correlated_by_request_id() {
        let (manager, mut inbound, route) = setup(BusConfig::default());

        let first = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", json!(1)).await }
        });
        let (id1, _, _) = next_request(&mut inbound).await;
        let second = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", json!(2)).await }
        });
        let (id2, _, _) = next_request(&mut inbound).await;

        // answer out of order
        manager.complete(id2, "view__get", Some(json!("two")), None);
        manager.complete(id1, "view__get", Some(json!("one")), None);

        assert_eq!(first.await.unwrap().unwrap(), json!("one"));
        assert_eq!(second.await.unwrap().unwrap(), json!("two"));
    }

    #[tokio::test]
    async fn reject_policy_refuses_a_second_call_in_flight() {
        let config = BusConfig::default().with_concurrent_calls(ConcurrentCallPolicy::Reject);
        let (manager, mut inbound, route) = setup(config);

        let first = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", Value::Null).await }
        });
        let (id1, _, _) = next_request(&mut inbound).await;

        let err = manager
            .request(&route, "view__get", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::ConcurrentCall { ref method } if method == "view__get"));

        manager.complete(id1, "view__get", None, None);
        assert_eq!(first.await.unwrap().unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn remote_errors_are_surfaced() {
        let (manager, mut inbound, route) = setup(BusConfig::default());
        let call = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", Value::Null).await }
        });
        let (id, _, _) = next_request(&mut inbound).await;
        manager.complete(
            id,
            "view__get",
            None,
            Some(ApiError::new(ApiErrorKind::BackingOperation, "down")),
        );
        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.remote_kind(), Some(ApiErrorKind::BackingOperation));
    }

    #[tokio::test]
    async fn mismatched_or_unknown_responses_are_ignored() {
        let (manager, mut inbound, route) = setup(BusConfig::default());
        let call = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", Value::Null).await }
        });
        let (id, _, _) = next_request(&mut inbound).await;

        assert!(!manager.complete(id, "view__other", Some(json!(1)), None));
        assert!(!manager.complete(RequestId::from_ulid(Ulid::new()), "view__get", None, None));
        assert_eq!(manager.pending_requests(), 1);

        assert!(manager.complete(id, "view__get", Some(json!(2)), None));
        assert_eq!(call.await.unwrap().unwrap(), json!(2));
    }

    #[tokio::test]
    async fn dispose_rejects_pending_calls() {
        let (manager, mut inbound, route) = setup(BusConfig::default());
        let call = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", Value::Null).await }
        });
        next_request(&mut inbound).await;

        assert_eq!(manager.dispose(), 1);
        assert!(matches!(call.await.unwrap(), Err(EnvelopeError::Disposed)));

        // later calls fail fast
        assert!(matches!(
            manager.request(&route, "view__get", Value::Null).await,
            Err(EnvelopeError::Disposed)
        ));
        assert!(matches!(
            manager.notify(&route, "view__ping", Value::Null),
            Err(EnvelopeError::Disposed)
        ));
        assert_eq!(manager.dispose(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_removes_the_pending_call() {
        let config = BusConfig::default().with_request_timeout(Duration::from_millis(200));
        let (manager, _inbound, route) = setup(config);

        let err = manager
            .request(&route, "view__get", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::RequestTimeout { .. }));
        assert_eq!(manager.pending_requests(), 0);
    }

    #[tokio::test]
    async fn cancelled_callers_do_not_leak_pending_calls() {
        let (manager, mut inbound, route) = setup(BusConfig::default());
        let call = tokio::spawn({
            let (manager, route) = (manager.clone(), route.clone());
            async move { manager.request(&route, "view__get", Value::Null).await }
        });
        next_request(&mut inbound).await;
        assert_eq!(manager.pending_requests(), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(manager.pending_requests(), 0);
    }

    /// Records notification methods; `view__hang` never returns.
    struct Recorder(tokio::sync::mpsc::UnboundedSender<String>);

    #[async_trait::async_trait]
    impl DynHandler for Recorder {
        fn contract(&self) -> &'static str {
            "view"
        }

        async fn handle_request(&self, _method: &str, _args: Value) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }

        async fn handle_notification(&self, method: &str, _args: Value) -> Result<(), ApiError> {
            if method == "view__hang" {
                std::future::pending::<()>().await;
            }
            let _ = self.0.send(method.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn notifications_run_in_order_and_dispose_aborts_a_stuck_one() {
        let (manager, _inbound, _route) = setup(BusConfig::default());
        let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
        manager.start_notifications(Arc::new(Recorder(tx)));

        for method in ["view__a", "view__b", "view__hang", "view__c"] {
            assert!(manager.enqueue_notification(method.into(), Value::Null));
        }
        assert_eq!(seen.recv().await.unwrap(), "view__a");
        assert_eq!(seen.recv().await.unwrap(), "view__b");

        // view__c waits behind the stuck handler
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.try_recv().is_err());

        manager.dispose();
        assert!(!manager.enqueue_notification("view__d".into(), Value::Null));
        // the aborted task dropped its handler, closing the channel
        assert!(seen.recv().await.is_none());
    }
}

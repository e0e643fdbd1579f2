//! ApiClient - 相手側 API を呼ぶための型付き proxy
//!
//! host 側では `EnvelopeServer::envelope_api()`、guest 側では
//! `Envelope::channel_api()` から取得します。view ごとの便利メソッド
//! （`get_task` など）は各 view モジュールで `impl ApiClient<...>` として定義します。

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::codec::PayloadCodec;
use super::contract::{ApiContract, EnvelopeContract, InitRequest};
use crate::app::manager::{MessageManager, Route};
use crate::domain::{Association, EnvelopeError};

pub struct ApiClient<A: ApiContract> {
    manager: Arc<MessageManager>,
    route: Route,
    _marker: PhantomData<fn() -> A>,
}

impl<A: ApiContract> Clone for ApiClient<A> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            route: self.route.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A: ApiContract> ApiClient<A> {
    pub(crate) fn new(manager: Arc<MessageManager>, route: Route) -> Self {
        Self {
            manager,
            route,
            _marker: PhantomData,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Send a request and wait for the matching response.
    pub async fn request<O: DeserializeOwned>(&self, request: A::Request) -> Result<O, EnvelopeError> {
        let (method, args) = PayloadCodec::encode(A::NAME, &request)?;
        let result = self.manager.request(&self.route, &method, args).await?;
        Ok(PayloadCodec::decode_result(&method, result)?)
    }

    /// Fire-and-forget.
    pub fn notify(&self, notification: A::Notification) -> Result<(), EnvelopeError> {
        let (method, args) = PayloadCodec::encode(A::NAME, &notification)?;
        self.manager.notify(&self.route, &method, args)
    }
}

impl<E: EnvelopeContract> ApiClient<E> {
    /// Send the `<view>__init` handshake request.
    pub async fn init(&self, association: Association, init_args: E::InitArgs) -> Result<(), EnvelopeError> {
        let payload = InitRequest {
            association,
            init_args,
        };
        let args = PayloadCodec::encode_result(E::INIT_METHOD, &payload)?;
        self.manager.request(&self.route, E::INIT_METHOD, args).await?;
        Ok(())
    }
}

//! Handler trait - API の実装側
//!
//! # 学習ポイント
//! - ジェネリック trait (`ApiHandler<A>`)
//! - Object-safe trait (`DynHandler`)
//! - Type erasure パターン (`TypedHandler<A, H>` → `DynHandler`)
//!
//! 各 view は「1 operation = 1 method」の trait（例: `TaskDetailsChannelApi`）を定義し、
//! その trait を実装した型に blanket impl で `ApiHandler` を与えます。

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::codec::PayloadCodec;
use super::contract::{ApiContract, EnvelopeContract};
use crate::domain::{ApiError, Association};

/// Serves the operations of contract `A`.
#[async_trait]
pub trait ApiHandler<A: ApiContract>: Send + Sync {
    async fn on_request(&self, request: A::Request) -> Result<Value, ApiError>;

    async fn on_notification(&self, _notification: A::Notification) {}
}

/// Serves an Envelope API, including its init handshake.
#[async_trait]
pub trait EnvelopeHandler<E: EnvelopeContract>: ApiHandler<E> {
    async fn init(&self, association: Association, init_args: E::InitArgs) -> Result<(), ApiError>;
}

/// Object-safe view of any `ApiHandler`, working on raw wire values.
#[async_trait]
pub trait DynHandler: Send + Sync {
    fn contract(&self) -> &'static str;

    async fn handle_request(&self, method: &str, args: Value) -> Result<Value, ApiError>;

    async fn handle_notification(&self, method: &str, args: Value) -> Result<(), ApiError>;
}

pub struct TypedHandler<A: ApiContract, H: ?Sized> {
    handler: Arc<H>,
    _marker: PhantomData<fn() -> A>,
}

impl<A: ApiContract, H: ?Sized> TypedHandler<A, H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<A, H> DynHandler for TypedHandler<A, H>
where
    A: ApiContract,
    H: ApiHandler<A> + ?Sized + 'static,
{
    fn contract(&self) -> &'static str {
        A::NAME
    }

    async fn handle_request(&self, method: &str, args: Value) -> Result<Value, ApiError> {
        let request: A::Request = PayloadCodec::decode(A::NAME, method, args)?;
        self.handler.on_request(request).await
    }

    async fn handle_notification(&self, method: &str, args: Value) -> Result<(), ApiError> {
        let notification: A::Notification = PayloadCodec::decode(A::NAME, method, args)?;
        self.handler.on_notification(notification).await;
        Ok(())
    }
}

/// Erase a typed handler for the message manager.
pub fn erase<A, H>(handler: Arc<H>) -> Arc<dyn DynHandler>
where
    A: ApiContract,
    H: ApiHandler<A> + ?Sized + 'static,
{
    Arc::new(TypedHandler::<A, H>::new(handler))
}

/// Encode an operation's output as a response value.
pub fn reply<O: Serialize>(method: &str, output: O) -> Result<Value, ApiError> {
    Ok(PayloadCodec::encode_result(method, &output)?)
}

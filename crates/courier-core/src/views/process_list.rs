//! Process list view
//!
//! - Envelope API: `processList__init`, `processList__getCurrentState`,
//!   `processList__refresh`（notification）
//! - Channel API: `processList__initialLoad`, `processList__query`, `processList__openProcess`
//!
//! `initialLoad` でフィルタとソートを driver に渡し、以降の `query` はページ指定だけを送ります。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{ProcessInstance, ProcessListFilter, ProcessListState, SortBy};
use crate::domain::{ApiError, Association, EnvelopeError};
use crate::typed::{
    ApiClient, ApiContract, ApiHandler, EnvelopeContract, EnvelopeHandler, NoOperations, reply,
};

pub struct ProcessListEnvelope;

pub struct ProcessListChannel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessListInitArgs {
    #[serde(default)]
    pub initial_state: ProcessListState,
    /// Label used for one process instance, e.g. "Travel".
    pub singular_process_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum ProcessListEnvelopeRequest {
    #[serde(rename = "processList__getCurrentState")]
    GetCurrentState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum ProcessListEnvelopeNotification {
    #[serde(rename = "processList__refresh")]
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum ProcessListChannelRequest {
    #[serde(rename = "processList__initialLoad", rename_all = "camelCase")]
    InitialLoad {
        #[serde(default)]
        filter: ProcessListFilter,
        #[serde(default)]
        order_by: SortBy,
    },

    #[serde(rename = "processList__query")]
    Query { offset: usize, limit: usize },

    #[serde(rename = "processList__openProcess", rename_all = "camelCase")]
    OpenProcess { process_instance_id: String },
}

impl ApiContract for ProcessListEnvelope {
    const NAME: &'static str = "processListEnvelope";
    type Request = ProcessListEnvelopeRequest;
    type Notification = ProcessListEnvelopeNotification;
}

impl EnvelopeContract for ProcessListEnvelope {
    const INIT_METHOD: &'static str = "processList__init";
    type InitArgs = ProcessListInitArgs;
}

impl ApiContract for ProcessListChannel {
    const NAME: &'static str = "processListChannel";
    type Request = ProcessListChannelRequest;
    type Notification = NoOperations;
}

#[async_trait]
pub trait ProcessListEnvelopeApi: Send + Sync {
    async fn init(
        &self,
        association: Association,
        init_args: ProcessListInitArgs,
    ) -> Result<(), ApiError>;

    /// Filters and sort currently applied in the view.
    async fn get_current_state(&self) -> Result<ProcessListState, ApiError>;

    /// Re-run the current query.
    async fn refresh(&self);
}

#[async_trait]
pub trait ProcessListChannelApi: Send + Sync {
    async fn initial_load(&self, filter: ProcessListFilter, order_by: SortBy)
    -> Result<(), ApiError>;

    async fn query(&self, offset: usize, limit: usize) -> Result<Vec<ProcessInstance>, ApiError>;

    async fn open_process(&self, process_instance_id: String) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: ProcessListEnvelopeApi + ?Sized> ApiHandler<ProcessListEnvelope> for T {
    async fn on_request(&self, request: ProcessListEnvelopeRequest) -> Result<Value, ApiError> {
        match request {
            ProcessListEnvelopeRequest::GetCurrentState => reply(
                "processList__getCurrentState",
                self.get_current_state().await?,
            ),
        }
    }

    async fn on_notification(&self, notification: ProcessListEnvelopeNotification) {
        match notification {
            ProcessListEnvelopeNotification::Refresh => self.refresh().await,
        }
    }
}

#[async_trait]
impl<T: ProcessListEnvelopeApi + ?Sized> EnvelopeHandler<ProcessListEnvelope> for T {
    async fn init(
        &self,
        association: Association,
        init_args: ProcessListInitArgs,
    ) -> Result<(), ApiError> {
        ProcessListEnvelopeApi::init(self, association, init_args).await
    }
}

#[async_trait]
impl<T: ProcessListChannelApi + ?Sized> ApiHandler<ProcessListChannel> for T {
    async fn on_request(&self, request: ProcessListChannelRequest) -> Result<Value, ApiError> {
        match request {
            ProcessListChannelRequest::InitialLoad { filter, order_by } => reply(
                "processList__initialLoad",
                self.initial_load(filter, order_by).await?,
            ),
            ProcessListChannelRequest::Query { offset, limit } => {
                reply("processList__query", self.query(offset, limit).await?)
            }
            ProcessListChannelRequest::OpenProcess {
                process_instance_id,
            } => reply(
                "processList__openProcess",
                self.open_process(process_instance_id).await?,
            ),
        }
    }
}

impl ApiClient<ProcessListEnvelope> {
    pub async fn get_current_state(&self) -> Result<ProcessListState, EnvelopeError> {
        self.request(ProcessListEnvelopeRequest::GetCurrentState)
            .await
    }

    pub fn refresh(&self) -> Result<(), EnvelopeError> {
        self.notify(ProcessListEnvelopeNotification::Refresh)
    }
}

impl ApiClient<ProcessListChannel> {
    pub async fn initial_load(
        &self,
        filter: ProcessListFilter,
        order_by: SortBy,
    ) -> Result<(), EnvelopeError> {
        self.request(ProcessListChannelRequest::InitialLoad { filter, order_by })
            .await
    }

    pub async fn query(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ProcessInstance>, EnvelopeError> {
        self.request(ProcessListChannelRequest::Query { offset, limit })
            .await
    }

    pub async fn open_process(
        &self,
        process_instance_id: impl Into<String>,
    ) -> Result<(), EnvelopeError> {
        self.request(ProcessListChannelRequest::OpenProcess {
            process_instance_id: process_instance_id.into(),
        })
        .await
    }
}

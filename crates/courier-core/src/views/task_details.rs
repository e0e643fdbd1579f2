//! Task details view
//!
//! - Envelope API: `taskDetails__init`, `taskDetails__setTask`（notification）
//! - Channel API: `taskDetails__getTask`, `taskDetails__openProcessInstance`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::UserTaskInstance;
use crate::domain::{ApiError, Association, EnvelopeError};
use crate::typed::{
    ApiClient, ApiContract, ApiHandler, EnvelopeContract, EnvelopeHandler, NoOperations, reply,
};

/// Envelope API of the task details guest.
pub struct TaskDetailsEnvelope;

/// Channel API the task details guest calls on the host.
pub struct TaskDetailsChannel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetailsInitArgs {
    pub task: UserTaskInstance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum TaskDetailsEnvelopeNotification {
    #[serde(rename = "taskDetails__setTask")]
    SetTask { task: UserTaskInstance },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum TaskDetailsChannelRequest {
    #[serde(rename = "taskDetails__getTask", rename_all = "camelCase")]
    GetTask { task_id: String },

    #[serde(
        rename = "taskDetails__openProcessInstance",
        rename_all = "camelCase"
    )]
    OpenProcessInstance { process_instance_id: String },
}

impl ApiContract for TaskDetailsEnvelope {
    const NAME: &'static str = "taskDetailsEnvelope";
    type Request = NoOperations;
    type Notification = TaskDetailsEnvelopeNotification;
}

impl EnvelopeContract for TaskDetailsEnvelope {
    const INIT_METHOD: &'static str = "taskDetails__init";
    type InitArgs = TaskDetailsInitArgs;
}

impl ApiContract for TaskDetailsChannel {
    const NAME: &'static str = "taskDetailsChannel";
    type Request = TaskDetailsChannelRequest;
    type Notification = NoOperations;
}

/// Implemented by the guest view.
#[async_trait]
pub trait TaskDetailsEnvelopeApi: Send + Sync {
    async fn init(
        &self,
        association: Association,
        init_args: TaskDetailsInitArgs,
    ) -> Result<(), ApiError>;

    /// The host selected another task while the view is open.
    async fn set_task(&self, task: UserTaskInstance);
}

/// Implemented by the host driver.
#[async_trait]
pub trait TaskDetailsChannelApi: Send + Sync {
    async fn get_task(&self, task_id: String) -> Result<UserTaskInstance, ApiError>;

    async fn open_process_instance(&self, process_instance_id: String) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: TaskDetailsEnvelopeApi + ?Sized> ApiHandler<TaskDetailsEnvelope> for T {
    async fn on_request(&self, request: NoOperations) -> Result<Value, ApiError> {
        match request {}
    }

    async fn on_notification(&self, notification: TaskDetailsEnvelopeNotification) {
        match notification {
            TaskDetailsEnvelopeNotification::SetTask { task } => self.set_task(task).await,
        }
    }
}

#[async_trait]
impl<T: TaskDetailsEnvelopeApi + ?Sized> EnvelopeHandler<TaskDetailsEnvelope> for T {
    async fn init(
        &self,
        association: Association,
        init_args: TaskDetailsInitArgs,
    ) -> Result<(), ApiError> {
        TaskDetailsEnvelopeApi::init(self, association, init_args).await
    }
}

#[async_trait]
impl<T: TaskDetailsChannelApi + ?Sized> ApiHandler<TaskDetailsChannel> for T {
    async fn on_request(&self, request: TaskDetailsChannelRequest) -> Result<Value, ApiError> {
        match request {
            TaskDetailsChannelRequest::GetTask { task_id } => {
                reply("taskDetails__getTask", self.get_task(task_id).await?)
            }
            TaskDetailsChannelRequest::OpenProcessInstance {
                process_instance_id,
            } => reply(
                "taskDetails__openProcessInstance",
                self.open_process_instance(process_instance_id).await?,
            ),
        }
    }
}

impl ApiClient<TaskDetailsEnvelope> {
    pub fn set_task(&self, task: UserTaskInstance) -> Result<(), EnvelopeError> {
        self.notify(TaskDetailsEnvelopeNotification::SetTask { task })
    }
}

impl ApiClient<TaskDetailsChannel> {
    pub async fn get_task(
        &self,
        task_id: impl Into<String>,
    ) -> Result<UserTaskInstance, EnvelopeError> {
        self.request(TaskDetailsChannelRequest::GetTask {
            task_id: task_id.into(),
        })
        .await
    }

    pub async fn open_process_instance(
        &self,
        process_instance_id: impl Into<String>,
    ) -> Result<(), EnvelopeError> {
        self.request(TaskDetailsChannelRequest::OpenProcessInstance {
            process_instance_id: process_instance_id.into(),
        })
        .await
    }
}

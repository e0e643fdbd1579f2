//! Task form view
//!
//! - Envelope API: `taskForm__init`
//! - Channel API: `taskForm__getTaskFormSchema`, `taskForm__doSubmit`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{User, UserTaskInstance};
use crate::domain::{ApiError, Association, EnvelopeError};
use crate::typed::{
    ApiClient, ApiContract, ApiHandler, EnvelopeContract, EnvelopeHandler, NoOperations, reply,
};

pub struct TaskFormEnvelope;

pub struct TaskFormChannel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFormInitArgs {
    pub user_task: UserTaskInstance,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum TaskFormChannelRequest {
    #[serde(rename = "taskForm__getTaskFormSchema", rename_all = "camelCase")]
    GetTaskFormSchema { task_id: String },

    /// `phase` is the lifecycle transition to apply, e.g. `complete` or `save`.
    #[serde(rename = "taskForm__doSubmit")]
    DoSubmit {
        phase: String,
        #[serde(default)]
        payload: Value,
    },
}

impl ApiContract for TaskFormEnvelope {
    const NAME: &'static str = "taskFormEnvelope";
    type Request = NoOperations;
    type Notification = NoOperations;
}

impl EnvelopeContract for TaskFormEnvelope {
    const INIT_METHOD: &'static str = "taskForm__init";
    type InitArgs = TaskFormInitArgs;
}

impl ApiContract for TaskFormChannel {
    const NAME: &'static str = "taskFormChannel";
    type Request = TaskFormChannelRequest;
    type Notification = NoOperations;
}

#[async_trait]
pub trait TaskFormEnvelopeApi: Send + Sync {
    async fn init(&self, association: Association, init_args: TaskFormInitArgs)
    -> Result<(), ApiError>;
}

#[async_trait]
pub trait TaskFormChannelApi: Send + Sync {
    /// JSON schema of the form rendered for `task_id`.
    async fn get_task_form_schema(&self, task_id: String) -> Result<Value, ApiError>;

    async fn do_submit(&self, phase: String, payload: Value) -> Result<Value, ApiError>;
}

#[async_trait]
impl<T: TaskFormEnvelopeApi + ?Sized> ApiHandler<TaskFormEnvelope> for T {
    async fn on_request(&self, request: NoOperations) -> Result<Value, ApiError> {
        match request {}
    }
}

#[async_trait]
impl<T: TaskFormEnvelopeApi + ?Sized> EnvelopeHandler<TaskFormEnvelope> for T {
    async fn init(
        &self,
        association: Association,
        init_args: TaskFormInitArgs,
    ) -> Result<(), ApiError> {
        TaskFormEnvelopeApi::init(self, association, init_args).await
    }
}

#[async_trait]
impl<T: TaskFormChannelApi + ?Sized> ApiHandler<TaskFormChannel> for T {
    async fn on_request(&self, request: TaskFormChannelRequest) -> Result<Value, ApiError> {
        match request {
            TaskFormChannelRequest::GetTaskFormSchema { task_id } => reply(
                "taskForm__getTaskFormSchema",
                self.get_task_form_schema(task_id).await?,
            ),
            TaskFormChannelRequest::DoSubmit { phase, payload } => {
                reply("taskForm__doSubmit", self.do_submit(phase, payload).await?)
            }
        }
    }
}

impl ApiClient<TaskFormChannel> {
    pub async fn get_task_form_schema(
        &self,
        task_id: impl Into<String>,
    ) -> Result<Value, EnvelopeError> {
        self.request(TaskFormChannelRequest::GetTaskFormSchema {
            task_id: task_id.into(),
        })
        .await
    }

    pub async fn do_submit(
        &self,
        phase: impl Into<String>,
        payload: Value,
    ) -> Result<Value, EnvelopeError> {
        self.request(TaskFormChannelRequest::DoSubmit {
            phase: phase.into(),
            payload,
        })
        .await
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{ApiError, ApiErrorKind};
use crate::ports::DataIndex;
use crate::views::model::{User, UserTaskInstance};
use crate::views::task_form::TaskFormChannelApi;

/// Host driver for the task form view.
///
/// Bound to the task and user the form was opened for.
pub struct TaskFormDriver {
    data_index: Arc<dyn DataIndex>,
    task: UserTaskInstance,
    user: User,
}

impl TaskFormDriver {
    pub fn new(data_index: Arc<dyn DataIndex>, task: UserTaskInstance, user: User) -> Self {
        Self {
            data_index,
            task,
            user,
        }
    }

    fn may_submit(&self) -> bool {
        match &self.task.actual_owner {
            Some(owner) => owner == &self.user.id,
            None => {
                self.task.potential_groups.is_empty()
                    || self
                        .task
                        .potential_groups
                        .iter()
                        .any(|g| self.user.groups.contains(g))
            }
        }
    }
}

#[async_trait]
impl TaskFormChannelApi for TaskFormDriver {
    async fn get_task_form_schema(&self, task_id: String) -> Result<Value, ApiError> {
        self.data_index
            .task_form_schema(&task_id)
            .await
            .map_err(|e| ApiError::backing(format!("cannot load form for task '{task_id}'"), &e))
    }

    async fn do_submit(&self, phase: String, payload: Value) -> Result<Value, ApiError> {
        if !self.may_submit() {
            return Err(ApiError::new(
                ApiErrorKind::BackingOperation,
                format!("user '{}' may not submit task '{}'", self.user.id, self.task.id),
            ));
        }
        tracing::debug!(task_id = self.task.id.as_str(), phase, "submitting task form");
        self.data_index
            .submit_task(&self.task.id, &phase, payload)
            .await
            .map_err(|e| {
                ApiError::backing(format!("cannot submit task '{}' ({phase})", self.task.id), &e)
            })
    }
}

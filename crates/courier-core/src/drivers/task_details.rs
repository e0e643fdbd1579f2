use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ApiError;
use crate::ports::{DataIndex, Navigator};
use crate::views::model::UserTaskInstance;
use crate::views::task_details::TaskDetailsChannelApi;

/// Host driver for the task details view.
pub struct TaskDetailsDriver {
    data_index: Arc<dyn DataIndex>,
    navigator: Arc<dyn Navigator>,
}

impl TaskDetailsDriver {
    pub fn new(data_index: Arc<dyn DataIndex>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            data_index,
            navigator,
        }
    }
}

#[async_trait]
impl TaskDetailsChannelApi for TaskDetailsDriver {
    async fn get_task(&self, task_id: String) -> Result<UserTaskInstance, ApiError> {
        self.data_index
            .user_task(&task_id)
            .await
            .map_err(|e| ApiError::backing(format!("cannot load task '{task_id}'"), &e))
    }

    async fn open_process_instance(&self, process_instance_id: String) -> Result<(), ApiError> {
        let location = super::process_location(&process_instance_id);
        self.navigator
            .navigate(&location)
            .map_err(|e| ApiError::backing(format!("cannot open process '{process_instance_id}'"), &e))
    }
}

//! DataIndex port - host アプリケーションが持つクエリ機能
//!
//! Driver はこの trait を通して data-index サービス（GraphQL）に問い合わせます。
//! GraphQL の詳細はこのクレートの範囲外です。

use async_trait::async_trait;
use serde_json::Value;

use crate::views::model::{ProcessInstance, ProcessListFilter, SortBy, UserTaskInstance};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataIndexError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("data index unavailable: {0}")]
    Unavailable(String),

    #[error("operation rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait DataIndex: Send + Sync {
    async fn user_task(&self, task_id: &str) -> Result<UserTaskInstance, DataIndexError>;

    async fn task_form_schema(&self, task_id: &str) -> Result<Value, DataIndexError>;

    /// Complete / save / claim a task, depending on `phase`.
    async fn submit_task(
        &self,
        task_id: &str,
        phase: &str,
        payload: Value,
    ) -> Result<Value, DataIndexError>;

    async fn process_instances(
        &self,
        filter: &ProcessListFilter,
        order_by: &SortBy,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ProcessInstance>, DataIndexError>;
}

//! InMemoryDataIndex - 開発用・テスト用の data index
//!
//! tasks / process instances / form schema を HashMap に持ちます。
//! `set_unavailable` で backing operation の失敗を再現できます。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::ports::{DataIndex, DataIndexError};
use crate::views::model::{
    ProcessInstance, ProcessListFilter, SortBy, SortDirection, UserTaskInstance,
};

#[derive(Default)]
struct Store {
    tasks: HashMap<String, UserTaskInstance>,
    schemas: HashMap<String, Value>,
    processes: Vec<ProcessInstance>,
    submissions: Vec<(String, String, Value)>,
}

#[derive(Default)]
pub struct InMemoryDataIndex {
    store: Mutex<Store>,
    unavailable: AtomicBool,
}

impl InMemoryDataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_task(&self, task: UserTaskInstance) {
        self.store.lock().await.tasks.insert(task.id.clone(), task);
    }

    pub async fn insert_schema(&self, task_id: impl Into<String>, schema: Value) {
        self.store.lock().await.schemas.insert(task_id.into(), schema);
    }

    pub async fn insert_process(&self, instance: ProcessInstance) {
        self.store.lock().await.processes.push(instance);
    }

    /// Every `(task_id, phase, payload)` submitted so far.
    pub async fn submissions(&self) -> Vec<(String, String, Value)> {
        self.store.lock().await.submissions.clone()
    }

    /// Make every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DataIndexError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DataIndexError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

fn compare(a: &ProcessInstance, b: &ProcessInstance, field: &str) -> std::cmp::Ordering {
    match field {
        "id" => a.id.cmp(&b.id),
        "processName" => a.process_name.cmp(&b.process_name),
        "state" => (a.state as u8).cmp(&(b.state as u8)),
        "businessKey" => a.business_key.cmp(&b.business_key),
        "end" => a.end.cmp(&b.end),
        _ => a.start.cmp(&b.start),
    }
}

#[async_trait]
impl DataIndex for InMemoryDataIndex {
    async fn user_task(&self, task_id: &str) -> Result<UserTaskInstance, DataIndexError> {
        self.check_available()?;
        self.store
            .lock()
            .await
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DataIndexError::NotFound {
                entity: "user task",
                id: task_id.to_string(),
            })
    }

    async fn task_form_schema(&self, task_id: &str) -> Result<Value, DataIndexError> {
        self.check_available()?;
        self.store
            .lock()
            .await
            .schemas
            .get(task_id)
            .cloned()
            .ok_or_else(|| DataIndexError::NotFound {
                entity: "task form",
                id: task_id.to_string(),
            })
    }

    async fn submit_task(
        &self,
        task_id: &str,
        phase: &str,
        payload: Value,
    ) -> Result<Value, DataIndexError> {
        self.check_available()?;
        let mut store = self.store.lock().await;
        let task = store
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DataIndexError::NotFound {
                entity: "user task",
                id: task_id.to_string(),
            })?;
        if task.state == "Completed" {
            return Err(DataIndexError::Rejected(format!(
                "task '{task_id}' is already completed"
            )));
        }
        if phase == "complete" {
            task.state = "Completed".to_string();
        }
        let state = task.state.clone();
        store
            .submissions
            .push((task_id.to_string(), phase.to_string(), payload));
        Ok(json!({ "id": task_id, "phase": phase, "state": state }))
    }

    async fn process_instances(
        &self,
        filter: &ProcessListFilter,
        order_by: &SortBy,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ProcessInstance>, DataIndexError> {
        self.check_available()?;
        let store = self.store.lock().await;
        let mut matching: Vec<ProcessInstance> = store
            .processes
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            let ord = compare(a, b, &order_by.field);
            match order_by.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

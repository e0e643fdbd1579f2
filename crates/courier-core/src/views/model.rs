//! Domain payloads exchanged by the embedded views.
//!
//! Field names follow the data-index JSON (camelCase) so payloads can be
//! passed through from queries unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A human task as returned by the data index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTaskInstance {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub potential_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub inputs: Value,
}

impl UserTaskInstance {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            state: "Ready".to_string(),
            process_instance_id: None,
            actual_owner: None,
            potential_groups: Vec::new(),
            inputs: Value::Null,
        }
    }
}

/// The user on whose behalf a task form is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessInstanceState {
    Pending,
    Active,
    Completed,
    Aborted,
    Suspended,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub id: String,
    pub process_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub state: ProcessInstanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessListFilter {
    #[serde(default)]
    pub status: Vec<ProcessInstanceState>,
    #[serde(default)]
    pub business_key: Vec<String>,
}

impl ProcessListFilter {
    pub fn matches(&self, instance: &ProcessInstance) -> bool {
        let status_ok = self.status.is_empty() || self.status.contains(&instance.state);
        let key_ok = self.business_key.is_empty()
            || instance
                .business_key
                .as_ref()
                .is_some_and(|key| self.business_key.iter().any(|k| key.contains(k.as_str())));
        status_ok && key_ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortBy {
    fn default() -> Self {
        Self {
            field: "start".to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Filter + sort state of the process list, restored on init.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessListState {
    #[serde(default)]
    pub filters: ProcessListFilter,
    #[serde(default)]
    pub sort_by: SortBy,
}

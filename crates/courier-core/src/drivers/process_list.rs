use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::ApiError;
use crate::ports::{DataIndex, Navigator};
use crate::views::model::{ProcessInstance, ProcessListFilter, ProcessListState, SortBy};
use crate::views::process_list::ProcessListChannelApi;

/// Host driver for the process list view.
///
/// `initial_load` fixes the filter and sort; `query` pages through the result.
pub struct ProcessListDriver {
    data_index: Arc<dyn DataIndex>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<ProcessListState>,
}

impl ProcessListDriver {
    pub fn new(data_index: Arc<dyn DataIndex>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            data_index,
            navigator,
            state: Mutex::new(ProcessListState::default()),
        }
    }

    /// Filter and sort of the last `initial_load`.
    pub fn current_state(&self) -> ProcessListState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ProcessListChannelApi for ProcessListDriver {
    async fn initial_load(
        &self,
        filter: ProcessListFilter,
        order_by: SortBy,
    ) -> Result<(), ApiError> {
        tracing::debug!(?filter, ?order_by, "process list initial load");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ProcessListState {
            filters: filter,
            sort_by: order_by,
        };
        Ok(())
    }

    async fn query(&self, offset: usize, limit: usize) -> Result<Vec<ProcessInstance>, ApiError> {
        let state = self.current_state();
        self.data_index
            .process_instances(&state.filters, &state.sort_by, offset, limit)
            .await
            .map_err(|e| ApiError::backing("cannot query process instances", &e))
    }

    async fn open_process(&self, process_instance_id: String) -> Result<(), ApiError> {
        let location = super::process_location(&process_instance_id);
        self.navigator
            .navigate(&location)
            .map_err(|e| ApiError::backing(format!("cannot open process '{process_instance_id}'"), &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApiErrorKind;
    use crate::impls::{InMemoryDataIndex, RecordingNavigator};
    use crate::views::model::{ProcessInstanceState, SortDirection};
    use chrono::{Duration, TimeZone, Utc};

    async fn index_with(n: usize) -> Arc<InMemoryDataIndex> {
        let index = Arc::new(InMemoryDataIndex::new());
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        for i in 0..n {
            index
                .insert_process(ProcessInstance {
                    id: format!("p{i}"),
                    process_id: "travels".into(),
                    process_name: Some("Travels".into()),
                    state: if i % 2 == 0 {
                        ProcessInstanceState::Active
                    } else {
                        ProcessInstanceState::Completed
                    },
                    business_key: None,
                    start: base + Duration::minutes(i as i64),
                    end: None,
                })
                .await;
        }
        index
    }

    #[tokio::test]
    async fn query_uses_the_state_from_initial_load() {
        let driver = ProcessListDriver::new(index_with(6).await, Arc::new(RecordingNavigator::new()));
        driver
            .initial_load(
                ProcessListFilter {
                    status: vec![ProcessInstanceState::Active],
                    business_key: vec![],
                },
                SortBy {
                    field: "start".into(),
                    direction: SortDirection::Asc,
                },
            )
            .await
            .unwrap();

        let page = driver.query(0, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p2"]);

        let page = driver.query(2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(driver.current_state().filters.status, vec![ProcessInstanceState::Active]);
    }

    #[tokio::test]
    async fn query_failures_are_backing_errors() {
        let index = index_with(1).await;
        index.set_unavailable(true);
        let driver = ProcessListDriver::new(index, Arc::new(RecordingNavigator::new()));

        let err = driver.query(0, 10).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::BackingOperation);
        assert!(err.cause.is_some());
    }

    #[tokio::test]
    async fn open_process_navigates_to_the_instance() {
        let navigator = Arc::new(RecordingNavigator::new());
        let driver = ProcessListDriver::new(index_with(0).await, navigator.clone());
        driver.open_process("p7".into()).await.unwrap();
        assert_eq!(navigator.visited(), vec!["/Process/p7".to_string()]);
    }
}

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use courier_core::drivers::{ProcessListDriver, TaskDetailsDriver};
use courier_core::impls::{InMemoryBus, InMemoryDataIndex, RecordingNavigator};
use courier_core::ports::DataIndex;
use courier_core::views::model::{
    ProcessInstance, ProcessInstanceState, ProcessListState, UserTaskInstance,
};
use courier_core::views::process_list::{
    ProcessListChannel, ProcessListEnvelope, ProcessListEnvelopeApi, ProcessListInitArgs,
};
use courier_core::views::task_details::{
    TaskDetailsChannel, TaskDetailsEnvelope, TaskDetailsEnvelopeApi, TaskDetailsInitArgs,
};
use courier_core::{
    ApiError, Association, BusConfig, ContainerHandle, Envelope, EnvelopeServer, Origin,
};

/// Guest side of the task details demo: remembers the task it renders.
#[derive(Default)]
struct TaskDetailsPage {
    task: Mutex<Option<UserTaskInstance>>,
}

#[async_trait]
impl TaskDetailsEnvelopeApi for TaskDetailsPage {
    async fn init(
        &self,
        association: Association,
        init_args: TaskDetailsInitArgs,
    ) -> Result<(), ApiError> {
        tracing::info!(
            host = %association.origin(),
            task_id = init_args.task.id.as_str(),
            "task details page initialized"
        );
        self.set_task(init_args.task).await;
        Ok(())
    }

    async fn set_task(&self, task: UserTaskInstance) {
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }
}

/// Guest side of the process list demo.
#[derive(Default)]
struct ProcessListPage {
    state: Mutex<ProcessListState>,
}

#[async_trait]
impl ProcessListEnvelopeApi for ProcessListPage {
    async fn init(
        &self,
        _association: Association,
        init_args: ProcessListInitArgs,
    ) -> Result<(), ApiError> {
        tracing::info!(label = init_args.singular_process_label.as_str(), "process list initialized");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = init_args.initial_state;
        Ok(())
    }

    async fn get_current_state(&self) -> Result<ProcessListState, ApiError> {
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn refresh(&self) {
        tracing::info!("process list refresh requested");
    }
}

async fn seed(index: &InMemoryDataIndex) {
    let mut task = UserTaskInstance::new("t1", "Review");
    task.process_instance_id = Some("p1".into());
    index.insert_task(task).await;

    let now = Utc::now();
    for (i, state) in [
        ProcessInstanceState::Active,
        ProcessInstanceState::Completed,
        ProcessInstanceState::Active,
    ]
    .into_iter()
    .enumerate()
    {
        index
            .insert_process(ProcessInstance {
                id: format!("p{}", i + 1),
                process_id: "travels".into(),
                process_name: Some("Travels".into()),
                state,
                business_key: Some(format!("TRV-{:03}", i + 1)),
                start: now - Duration::hours(i as i64),
                end: None,
            })
            .await;
    }
}

/// Embed the task details view and let it fetch its task through the channel.
async fn task_details_demo(
    config: &BusConfig,
    host: &Origin,
    index: Arc<InMemoryDataIndex>,
    navigator: Arc<RecordingNavigator>,
) -> anyhow::Result<()> {
    let guest = Origin::parse("http://localhost:9001")?;
    let (host_end, guest_end) = InMemoryBus::pair(host.clone(), guest.clone());
    let container = ContainerHandle::mount("task-details", guest);

    let server = EnvelopeServer::<TaskDetailsEnvelope, TaskDetailsChannel>::builder(
        container.clone(),
        host.clone(),
    )
    .transport(Arc::new(host_end))
    .driver(Arc::new(TaskDetailsDriver::new(index.clone(), navigator)))
    .config(config.clone())
    .generate()?;

    let page = Arc::new(TaskDetailsPage::default());
    let envelope = Envelope::<TaskDetailsEnvelope, TaskDetailsChannel>::new(
        container,
        Arc::new(guest_end),
        page,
        config.clone(),
    );
    envelope.start()?;

    let task = index.user_task("t1").await?;
    server.init(TaskDetailsInitArgs { task }).await?;
    envelope.wait_ready().await?;

    let channel = envelope.channel_api()?;
    let task = channel.get_task("t1").await?;
    tracing::info!(task_id = task.id.as_str(), name = task.name.as_str(), "guest fetched task");
    channel.open_process_instance("p1").await?;

    tracing::info!(status = %serde_json::to_string(&server.status())?, "host status");
    envelope.dispose().await;
    server.dispose().await;
    Ok(())
}

/// Embed the process list view and page through the instances.
async fn process_list_demo(
    config: &BusConfig,
    host: &Origin,
    index: Arc<InMemoryDataIndex>,
    navigator: Arc<RecordingNavigator>,
) -> anyhow::Result<()> {
    let guest = Origin::parse("http://localhost:9002")?;
    let (host_end, guest_end) = InMemoryBus::pair(host.clone(), guest.clone());
    let container = ContainerHandle::mount("process-list", guest);

    let server = EnvelopeServer::<ProcessListEnvelope, ProcessListChannel>::generate(
        container.clone(),
        host.clone(),
        Arc::new(host_end),
        Arc::new(ProcessListDriver::new(index, navigator)),
    )?;
    let envelope = Envelope::<ProcessListEnvelope, ProcessListChannel>::new(
        container.clone(),
        Arc::new(guest_end),
        Arc::new(ProcessListPage::default()),
        config.clone(),
    );
    envelope.start()?;

    server
        .init(ProcessListInitArgs {
            initial_state: ProcessListState::default(),
            singular_process_label: "Travel".into(),
        })
        .await?;
    envelope.wait_ready().await?;

    let channel = envelope.channel_api()?;
    let state = server.envelope_api().get_current_state().await?;
    channel.initial_load(state.filters, state.sort_by).await?;
    let mut offset = 0;
    loop {
        let page = channel.query(offset, 2).await?;
        if page.is_empty() {
            break;
        }
        for instance in &page {
            tracing::info!(
                id = instance.id.as_str(),
                state = ?instance.state,
                business_key = instance.business_key.as_deref(),
                "process instance"
            );
        }
        offset += page.len();
    }
    channel.open_process("p2").await?;
    server.envelope_api().refresh()?;

    // removing the container tears down both sides
    container.remove();
    server.dispose().await;
    envelope.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BusConfig::from_env()?;
    tracing::info!(?config, "bus configuration");

    let host = Origin::parse("http://localhost:9000")?;
    let index = Arc::new(InMemoryDataIndex::new());
    seed(&index).await;
    let navigator = Arc::new(RecordingNavigator::new());

    task_details_demo(&config, &host, index.clone(), navigator.clone()).await?;
    process_list_demo(&config, &host, index, navigator.clone()).await?;

    tracing::info!(visited = ?navigator.visited(), "navigation log");
    Ok(())
}

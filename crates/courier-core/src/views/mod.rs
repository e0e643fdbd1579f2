//! Views - 埋め込まれる画面ごとの API 定義
//!
//! 各 view は 2 つの contract を持ちます。
//! - **Envelope API**（guest が実装し、host が呼ぶ）: init を含む
//! - **Channel API**（host の driver が実装し、guest が呼ぶ）
//!
//! wire 上の method 名は `<view>__<operation>` です。

pub mod model;
pub mod process_list;
pub mod task_details;
pub mod task_form;

pub use self::model::{
    ProcessInstance, ProcessInstanceState, ProcessListFilter, ProcessListState, SortBy,
    SortDirection, User, UserTaskInstance,
};
pub use self::process_list::{
    ProcessListChannel, ProcessListChannelApi, ProcessListEnvelope, ProcessListEnvelopeApi,
    ProcessListInitArgs,
};
pub use self::task_details::{
    TaskDetailsChannel, TaskDetailsChannelApi, TaskDetailsEnvelope, TaskDetailsEnvelopeApi,
    TaskDetailsInitArgs,
};
pub use self::task_form::{
    TaskFormChannel, TaskFormChannelApi, TaskFormEnvelope, TaskFormEnvelopeApi, TaskFormInitArgs,
};

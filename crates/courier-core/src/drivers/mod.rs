//! Drivers - host 側で Channel API を実装するアダプタ
//!
//! 各 driver は `DataIndex`（クエリ）と `Navigator`（画面遷移）に委譲します。
//! backing operation の失敗は `ApiErrorKind::BackingOperation` として guest に返ります（握りつぶさない）。

pub mod process_list;
pub mod task_details;
pub mod task_form;

pub use self::process_list::ProcessListDriver;
pub use self::task_details::TaskDetailsDriver;
pub use self::task_form::TaskFormDriver;

/// Host route of a process instance page.
fn process_location(process_instance_id: &str) -> String {
    format!("/Process/{process_instance_id}")
}

//! Status - 両側の状態スナップショット
//!
//! ログやデバッグ表示向け。serialize できるので CLI からそのまま出力できます。

use serde::Serialize;

use crate::domain::{Association, ContainerStatus, EnvelopeServerId, EnvelopeState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub envelope_server_id: EnvelopeServerId,
    #[serde(serialize_with = "container_status")]
    pub container: ContainerStatus,
    /// Requests sent to the guest that have not been answered yet.
    pub pending_requests: usize,
    pub disposed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeStatus {
    pub state: EnvelopeState,
    pub association: Option<Association>,
    /// Channel-API calls sent to the host that have not been answered yet.
    pub pending_requests: usize,
}

fn container_status<S: serde::Serializer>(
    status: &ContainerStatus,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let name = match status {
        ContainerStatus::Mounted => "mounted",
        ContainerStatus::Ready => "ready",
        ContainerStatus::Removed => "removed",
    };
    serializer.serialize_str(name)
}

use serde::{Deserialize, Serialize};

use super::ids::EnvelopeServerId;
use super::origin::Origin;

/// The (origin, envelope server id) pair identifying one host/guest pairing.
///
/// Created once by the host when it embeds a guest and handed to the guest
/// inside the init request. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    origin: Origin,
    envelope_server_id: EnvelopeServerId,
}

impl Association {
    pub fn new(origin: Origin, envelope_server_id: EnvelopeServerId) -> Self {
        Self {
            origin,
            envelope_server_id,
        }
    }

    /// Origin of the host page.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn envelope_server_id(&self) -> EnvelopeServerId {
        self.envelope_server_id
    }

    /// Does a message from `origin` addressed to `envelope_server_id` belong to this pairing?
    pub fn accepts(&self, origin: &Origin, envelope_server_id: EnvelopeServerId) -> bool {
        &self.origin == origin && self.envelope_server_id == envelope_server_id
    }
}

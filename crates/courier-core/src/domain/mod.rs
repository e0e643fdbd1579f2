//! Domain model (ids, origins, association, container, wire message, state, errors).

pub mod association;
pub mod container;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod origin;
pub mod state;

pub use self::association::Association;
pub use self::container::{ContainerHandle, ContainerStatus};
pub use self::envelope::{EnvelopeBusMessage, MessageBody};
pub use self::errors::{ApiError, ApiErrorKind, EnvelopeError};
pub use self::ids::{EnvelopeServerId, IdParseError, RequestId};
pub use self::origin::{Origin, OriginError, TargetOrigin};
pub use self::state::EnvelopeState;

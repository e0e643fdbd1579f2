//! State - guest 側 envelope の状態機械
//!
//! # 状態遷移
//! - Created → AwaitingInit（listener 登録、readiness marker）
//! - AwaitingInit → Initializing（init 受信）
//! - Initializing → Ready（view の init 成功）
//! - Initializing → AwaitingInit（view の init 失敗、再試行可能）
//! - * → Disposed（container 取り外し / dispose）

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvelopeState {
    /// Container mounted, nothing wired yet.
    Created,
    /// Listening; waiting for the host's init request.
    AwaitingInit,
    /// The view's init handler is running.
    Initializing,
    /// Init resolved; the view is live and may call the channel API.
    Ready,
    /// Torn down. Terminal.
    Disposed,
}

impl EnvelopeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EnvelopeState::Disposed)
    }

    /// Can an init request be accepted in this state?
    pub fn accepts_init(self) -> bool {
        matches!(self, EnvelopeState::AwaitingInit)
    }

    pub fn is_ready(self) -> bool {
        matches!(self, EnvelopeState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EnvelopeState::Created, false)]
    #[case(EnvelopeState::AwaitingInit, true)]
    #[case(EnvelopeState::Initializing, false)]
    #[case(EnvelopeState::Ready, false)]
    #[case(EnvelopeState::Disposed, false)]
    fn only_awaiting_init_accepts_init(#[case] state: EnvelopeState, #[case] accepts: bool) {
        assert_eq!(state.accepts_init(), accepts);
    }

    #[test]
    fn disposed_is_the_only_terminal_state() {
        assert!(EnvelopeState::Disposed.is_terminal());
        assert!(!EnvelopeState::Ready.is_terminal());
    }
}

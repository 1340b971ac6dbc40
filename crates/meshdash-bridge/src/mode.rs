//! Current conversation target.
//!
//! Only the engine context owns a [`ModeStateMachine`]; other contexts see
//! the mode through the published bridge view.

use tracing::debug;

use meshdash_shared::types::{Mode, ModeKind};

use crate::engine::EngineState;

/// Next mode for a switch request. Unresolvable targets keep `current`.
pub fn transition(current: &Mode, kind: ModeKind, target: &str, state: &EngineState) -> Mode {
    match kind {
        ModeKind::Public => Mode::Broadcast,
        ModeKind::Channel if target.is_empty() => current.clone(),
        ModeKind::Channel => Mode::Channel(target.to_string()),
        ModeKind::Dm => match state.find_peer_by_nickname(target) {
            Some(peer) => Mode::DirectMessage {
                peer_id: peer.id.clone(),
                nickname: target.to_string(),
            },
            None => current.clone(),
        },
    }
}

#[derive(Debug, Default)]
pub struct ModeStateMachine {
    current: Mode,
}

impl ModeStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Mode {
        &self.current
    }

    /// Apply a switch request. Returns whether the mode changed.
    pub fn switch(&mut self, kind: ModeKind, target: &str, state: &EngineState) -> bool {
        let next = transition(&self.current, kind, target, state);
        if next == self.current {
            debug!(?kind, target, "Mode unchanged");
            return false;
        }
        debug!(from = ?self.current, to = ?next, "Mode switched");
        self.current = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PeerState;
    use meshdash_shared::types::PeerId;

    fn state_with_bob() -> EngineState {
        let mut state = EngineState::default();
        let id = PeerId::new("b0b0b0b0cafe");
        state.peers.insert(
            id.clone(),
            PeerState {
                id,
                nickname: Some("bob".into()),
                fingerprint: None,
            },
        );
        state
    }

    #[test]
    fn test_initial_mode_is_broadcast() {
        assert_eq!(*ModeStateMachine::new().current(), Mode::Broadcast);
    }

    #[test]
    fn test_switch_to_channel_and_back() {
        let state = EngineState::default();
        let mut machine = ModeStateMachine::new();

        assert!(machine.switch(ModeKind::Channel, "#ops", &state));
        assert_eq!(*machine.current(), Mode::Channel("#ops".into()));

        assert!(machine.switch(ModeKind::Public, "", &state));
        assert_eq!(*machine.current(), Mode::Broadcast);
    }

    #[test]
    fn test_dm_resolves_peer() {
        let state = state_with_bob();
        let mut machine = ModeStateMachine::new();

        assert!(machine.switch(ModeKind::Dm, "bob", &state));
        assert_eq!(
            *machine.current(),
            Mode::DirectMessage {
                peer_id: PeerId::new("b0b0b0b0cafe"),
                nickname: "bob".into()
            }
        );
    }

    #[test]
    fn test_unknown_dm_target_is_identity() {
        let state = state_with_bob();
        let mut machine = ModeStateMachine::new();
        machine.switch(ModeKind::Channel, "#ops", &state);

        assert!(!machine.switch(ModeKind::Dm, "unknown-nick", &state));
        assert_eq!(*machine.current(), Mode::Channel("#ops".into()));
    }

    #[test]
    fn test_empty_channel_target_is_identity() {
        let state = EngineState::default();
        let current = Mode::Broadcast;
        assert_eq!(
            transition(&current, ModeKind::Channel, "", &state),
            Mode::Broadcast
        );
    }
}

//! Contract between the bridge and the external mesh engine.
//!
//! The engine lives inside the engine execution context and is only ever
//! touched by the [`ChatEngineAdapter`](crate::adapter::ChatEngineAdapter).
//! Inbound traffic and link changes arrive on an [`EngineEvent`] channel
//! that the engine implementation feeds from its own I/O.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use meshdash_shared::crypto::ChannelKey;
use meshdash_shared::error::EngineError;
use meshdash_shared::protocol::{ChatMessage, SenderEnvelope};
use meshdash_shared::types::PeerId;

/// A message delivered by the engine, as `(message, sender, is_private)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message: ChatMessage,
    pub sender: SenderEnvelope,
    pub is_private: bool,
}

/// Notifications sent *from* the engine to the adapter.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A chat message arrived from the mesh.
    Message(InboundMessage),
    /// The engine established a link (e.g. discovery found a node).
    Connected,
    /// The engine lost its link.
    Disconnected,
}

/// Engine-side view of a known peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerState {
    pub id: PeerId,
    pub nickname: Option<String>,
    pub fingerprint: Option<String>,
}

/// Point-in-time copy of engine state. Carries no key material: only the
/// names of channels for which a key is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub nickname: String,
    pub peer_id: PeerId,
    pub peers: BTreeMap<PeerId, PeerState>,
    pub active_channels: BTreeSet<String>,
    pub discovered_channels: BTreeSet<String>,
    pub protected_channels: BTreeSet<String>,
    pub keyed_channels: BTreeSet<String>,
    pub channel_creators: HashMap<String, String>,
    pub session_count: usize,
}

impl EngineState {
    /// First peer whose nickname matches exactly.
    pub fn find_peer_by_nickname(&self, nickname: &str) -> Option<&PeerState> {
        self.peers
            .values()
            .find(|peer| peer.nickname.as_deref() == Some(nickname))
    }

    pub fn is_local(&self, peer_id: &PeerId) -> bool {
        *peer_id == self.peer_id
    }

    /// Display nickname for a sender: ours, the peer table's, or the short id.
    pub fn display_nickname(&self, peer_id: &PeerId) -> String {
        if self.is_local(peer_id) {
            return self.nickname.clone();
        }
        self.peers
            .get(peer_id)
            .and_then(|peer| peer.nickname.clone())
            .unwrap_or_else(|| peer_id.short().to_string())
    }
}

/// Operations the adapter needs from a mesh engine.
///
/// Futures returned here run on the engine's own single-threaded context
/// and need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait MeshEngine {
    /// Try to establish a link. `false` means no link; the adapter then
    /// falls back to discovery.
    async fn connect(&mut self) -> bool;

    /// Start background discovery after a failed connect.
    async fn start_discovery(&mut self) {}

    async fn handshake(&mut self) -> Result<(), EngineError>;

    /// Send to everyone, or to `channel` when given. Returns the message
    /// as framed so it can be echoed locally.
    async fn send_broadcast(
        &mut self,
        text: &str,
        channel: Option<&str>,
    ) -> Result<ChatMessage, EngineError>;

    async fn send_direct(
        &mut self,
        text: &str,
        peer_id: &PeerId,
        nickname: &str,
    ) -> Result<ChatMessage, EngineError>;

    async fn join_channel(&mut self, name: &str, password: Option<&str>)
        -> Result<(), EngineError>;

    /// Update the local nickname and announce it to the mesh.
    async fn change_nickname(&mut self, name: &str) -> Result<(), EngineError>;

    fn state(&self) -> EngineState;

    fn channel_key(&self, channel: &str) -> Option<ChannelKey>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_peers() -> EngineState {
        let mut state = EngineState {
            nickname: "me".into(),
            peer_id: PeerId::new("00000000ffff"),
            ..Default::default()
        };
        for (id, nick) in [("aaaaaaaa1111", Some("alice")), ("bbbbbbbb2222", None)] {
            let id = PeerId::new(id);
            state.peers.insert(
                id.clone(),
                PeerState {
                    id,
                    nickname: nick.map(str::to_string),
                    fingerprint: None,
                },
            );
        }
        state
    }

    #[test]
    fn test_find_peer_by_nickname() {
        let state = state_with_peers();
        assert_eq!(
            state.find_peer_by_nickname("alice").map(|p| p.id.as_str()),
            Some("aaaaaaaa1111")
        );
        assert!(state.find_peer_by_nickname("mallory").is_none());
    }

    #[test]
    fn test_display_nickname_fallbacks() {
        let state = state_with_peers();
        assert_eq!(state.display_nickname(&PeerId::new("00000000ffff")), "me");
        assert_eq!(state.display_nickname(&PeerId::new("aaaaaaaa1111")), "alice");
        assert_eq!(state.display_nickname(&PeerId::new("bbbbbbbb2222")), "bbbbbbbb");
        assert_eq!(state.display_nickname(&PeerId::new("cccccccc3333")), "cccccccc");
    }
}

//! In-process mesh engine.
//!
//! `LoopbackEngine` keeps the whole mesh in memory: peers, channels and
//! keys are whatever the paired [`LoopbackControl`] puts there, and every
//! frame the engine would have put on the air is recorded instead. The
//! server runs on it when no radio engine is linked in, and the tests use
//! the control half to script the mesh.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use meshdash_shared::crypto::{derive_channel_key, encrypt_for_channel, ChannelKey};
use meshdash_shared::error::EngineError;
use meshdash_shared::protocol::{ChatMessage, SenderEnvelope};
use meshdash_shared::types::PeerId;

use crate::engine::{EngineEvent, EngineState, InboundMessage, MeshEngine, PeerState};

/// A frame the engine would have transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentFrame {
    Broadcast(ChatMessage),
    Direct { peer_id: PeerId, message: ChatMessage },
    Join { channel: String },
    Announce { nickname: String },
}

#[derive(Debug, Default)]
struct Mesh {
    nickname: String,
    peer_id: PeerId,
    link_up: bool,
    peers: BTreeMap<PeerId, PeerState>,
    active: BTreeSet<String>,
    discovered: BTreeSet<String>,
    // BLAKE3 commitment to the channel key, per protected channel
    commitments: HashMap<String, blake3::Hash>,
    keys: HashMap<String, ChannelKey>,
    creators: HashMap<String, String>,
    sent: Vec<SentFrame>,
}

fn lock(mesh: &Mutex<Mesh>) -> MutexGuard<'_, Mesh> {
    mesh.lock().unwrap_or_else(|e| e.into_inner())
}

fn random_peer_id() -> PeerId {
    PeerId::new(hex::encode(rand::random::<[u8; 8]>()))
}

pub struct LoopbackEngine {
    mesh: Arc<Mutex<Mesh>>,
}

/// Scripting half of a [`LoopbackEngine`]. Cloneable and `Send`.
#[derive(Clone)]
pub struct LoopbackControl {
    mesh: Arc<Mutex<Mesh>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl LoopbackEngine {
    /// Create an engine with a fresh random peer id. The link starts down.
    pub fn new(
        nickname: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>, LoopbackControl) {
        let mesh = Arc::new(Mutex::new(Mesh {
            nickname: nickname.into(),
            peer_id: random_peer_id(),
            ..Default::default()
        }));
        let (events, events_rx) = mpsc::unbounded_channel();
        let control = LoopbackControl {
            mesh: mesh.clone(),
            events,
        };
        (Self { mesh }, events_rx, control)
    }
}

impl MeshEngine for LoopbackEngine {
    async fn connect(&mut self) -> bool {
        lock(&self.mesh).link_up
    }

    async fn start_discovery(&mut self) {
        debug!("Loopback discovery started");
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        let mesh = lock(&self.mesh);
        if !mesh.link_up {
            return Err(EngineError::NotConnected);
        }
        debug!(peers = mesh.peers.len(), "Loopback handshake complete");
        Ok(())
    }

    async fn send_broadcast(
        &mut self,
        text: &str,
        channel: Option<&str>,
    ) -> Result<ChatMessage, EngineError> {
        let mut mesh = lock(&self.mesh);
        let mut message = ChatMessage::plain(Uuid::new_v4().to_string(), text);

        if let Some(channel) = channel {
            if !mesh.active.contains(channel) {
                return Err(EngineError::InvalidChannel(channel.to_string()));
            }
            message = message.in_channel(channel);
            if let Some(key) = mesh.keys.get(channel) {
                let creator = mesh
                    .creators
                    .get(channel)
                    .map(String::as_str)
                    .unwrap_or_default();
                let ciphertext = encrypt_for_channel(key, text, creator)?;
                message = message.encrypted(ciphertext);
            }
        }

        mesh.sent.push(SentFrame::Broadcast(message.clone()));
        Ok(message)
    }

    async fn send_direct(
        &mut self,
        text: &str,
        peer_id: &PeerId,
        nickname: &str,
    ) -> Result<ChatMessage, EngineError> {
        let mut mesh = lock(&self.mesh);
        if !mesh.peers.contains_key(peer_id) {
            return Err(EngineError::UnknownPeer(peer_id.to_string()));
        }

        let mut message = ChatMessage::plain(Uuid::new_v4().to_string(), text);
        message.recipient_nickname = Some(nickname.to_string());

        mesh.sent.push(SentFrame::Direct {
            peer_id: peer_id.clone(),
            message: message.clone(),
        });
        Ok(message)
    }

    async fn join_channel(
        &mut self,
        name: &str,
        password: Option<&str>,
    ) -> Result<(), EngineError> {
        if !name.starts_with('#') || name.len() < 2 {
            return Err(EngineError::InvalidChannel(name.to_string()));
        }

        let mut mesh = lock(&self.mesh);
        let commitment = mesh.commitments.get(name).copied();
        match (commitment, password) {
            (Some(_), None) => {
                return Err(EngineError::JoinRejected {
                    channel: name.to_string(),
                    reason: "password required".into(),
                });
            }
            (Some(commitment), Some(password)) => {
                let key = derive_channel_key(password, name);
                if blake3::hash(&key) != commitment {
                    return Err(EngineError::WrongPassword(name.to_string()));
                }
                mesh.keys.insert(name.to_string(), key);
            }
            (None, Some(password)) => {
                // First to set a password owns the channel
                let key = derive_channel_key(password, name);
                let owner = mesh.peer_id.to_string();
                mesh.commitments.insert(name.to_string(), blake3::hash(&key));
                mesh.keys.insert(name.to_string(), key);
                mesh.creators.insert(name.to_string(), owner);
            }
            (None, None) => {}
        }

        mesh.active.insert(name.to_string());
        mesh.discovered.insert(name.to_string());
        mesh.sent.push(SentFrame::Join {
            channel: name.to_string(),
        });
        Ok(())
    }

    async fn change_nickname(&mut self, name: &str) -> Result<(), EngineError> {
        let mut mesh = lock(&self.mesh);
        mesh.nickname = name.to_string();
        mesh.sent.push(SentFrame::Announce {
            nickname: name.to_string(),
        });
        Ok(())
    }

    fn state(&self) -> EngineState {
        let mesh = lock(&self.mesh);
        EngineState {
            nickname: mesh.nickname.clone(),
            peer_id: mesh.peer_id.clone(),
            peers: mesh.peers.clone(),
            active_channels: mesh.active.clone(),
            discovered_channels: mesh.discovered.clone(),
            protected_channels: mesh.commitments.keys().cloned().collect(),
            keyed_channels: mesh.keys.keys().cloned().collect(),
            channel_creators: mesh.creators.clone(),
            session_count: mesh.peers.len(),
        }
    }

    fn channel_key(&self, channel: &str) -> Option<ChannelKey> {
        lock(&self.mesh).keys.get(channel).copied()
    }
}

impl LoopbackControl {
    pub fn peer_id(&self) -> PeerId {
        lock(&self.mesh).peer_id.clone()
    }

    pub fn add_peer(
        &self,
        id: impl Into<String>,
        nickname: Option<&str>,
        fingerprint: Option<&str>,
    ) -> PeerId {
        let id = PeerId::new(id);
        lock(&self.mesh).peers.insert(
            id.clone(),
            PeerState {
                id: id.clone(),
                nickname: nickname.map(str::to_string),
                fingerprint: fingerprint.map(str::to_string),
            },
        );
        debug!(peer = %id, "Loopback peer added");
        id
    }

    pub fn remove_peer(&self, id: &PeerId) -> bool {
        lock(&self.mesh).peers.remove(id).is_some()
    }

    /// Make a channel known to the mesh. With a password it becomes
    /// protected and owned by `creator`.
    pub fn discover_channel(&self, name: &str, password: Option<&str>, creator: &str) {
        let mut mesh = lock(&self.mesh);
        mesh.discovered.insert(name.to_string());
        if let Some(password) = password {
            let key = derive_channel_key(password, name);
            mesh.commitments.insert(name.to_string(), blake3::hash(&key));
            mesh.creators.insert(name.to_string(), creator.to_string());
        }
    }

    /// Raise or drop the link, emitting an event on change.
    pub fn set_link(&self, up: bool) {
        let changed = {
            let mut mesh = lock(&self.mesh);
            let changed = mesh.link_up != up;
            mesh.link_up = up;
            changed
        };
        if changed {
            info!(up, "Loopback link changed");
            let event = if up {
                EngineEvent::Connected
            } else {
                EngineEvent::Disconnected
            };
            let _ = self.events.send(event);
        }
    }

    /// Deliver a message as if it came off the mesh from `sender`.
    pub fn deliver(&self, sender: &PeerId, message: ChatMessage, is_private: bool) {
        let _ = self.events.send(EngineEvent::Message(InboundMessage {
            message,
            sender: SenderEnvelope::new(sender.clone()),
            is_private,
        }));
    }

    /// Everything transmitted so far, oldest first.
    pub fn sent(&self) -> Vec<SentFrame> {
        lock(&self.mesh).sent.clone()
    }
}

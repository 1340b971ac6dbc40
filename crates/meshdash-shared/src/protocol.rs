use serde::{Deserialize, Serialize};

use crate::types::{ConnectionStatus, DisplayMessage, PeerId};

/// A chat message as framed by the mesh engine, before display formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Engine-assigned message id (empty when the engine does not assign one)
    pub id: String,
    /// Plaintext content; meaningless when `is_encrypted` is set
    pub content: String,
    /// Channel the message was posted to, if any
    pub channel: Option<String>,
    pub is_encrypted: bool,
    /// Channel ciphertext (nonce || ciphertext) for encrypted messages
    pub encrypted_content: Option<Vec<u8>>,
    /// Target nickname for direct messages we sent ourselves
    pub recipient_nickname: Option<String>,
}

impl ChatMessage {
    pub fn plain(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            channel: None,
            is_encrypted: false,
            encrypted_content: None,
            recipient_nickname: None,
        }
    }

    pub fn in_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn encrypted(mut self, ciphertext: Vec<u8>) -> Self {
        self.is_encrypted = true;
        self.content.clear();
        self.encrypted_content = Some(ciphertext);
        self
    }
}

/// Who a message came from, as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderEnvelope {
    pub sender_id: PeerId,
}

impl SenderEnvelope {
    pub fn new(sender_id: PeerId) -> Self {
        Self { sender_id }
    }
}

/// Events pushed to every subscribed observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    NewMessage(DisplayMessage),
    ConnectionStatus { status: ConnectionStatus },
}

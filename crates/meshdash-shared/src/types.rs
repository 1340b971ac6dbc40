use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{PUBLIC_MODE_NAME, SHORT_ID_LEN};

/// Truncate an identifier to its short display form.
pub fn short_form(s: &str) -> &str {
    match s.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// Peer identity as reported by the mesh engine (hex string)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        short_form(&self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// The conversation target that plain sends are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Broadcast,
    Channel(String),
    DirectMessage { peer_id: PeerId, nickname: String },
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Broadcast => ModeKind::Public,
            Self::Channel(_) => ModeKind::Channel,
            Self::DirectMessage { .. } => ModeKind::Dm,
        }
    }

    pub fn descriptor(&self) -> ModeDescriptor {
        let name = match self {
            Self::Broadcast => PUBLIC_MODE_NAME.to_string(),
            Self::Channel(name) => name.clone(),
            Self::DirectMessage { nickname, .. } => format!("DM with {nickname}"),
        };
        ModeDescriptor {
            kind: self.kind(),
            name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Public,
    Channel,
    Dm,
}

impl FromStr for ModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "channel" => Ok(Self::Channel),
            "dm" => Ok(Self::Dm),
            other => Err(format!("unknown mode type: {other}")),
        }
    }
}

/// `{type, name}` pair describing the current mode to the web UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeDescriptor {
    #[serde(rename = "type")]
    pub kind: ModeKind,
    pub name: String,
}

/// A chat message formatted for observers. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub id: String,
    pub content: String,
    #[serde(rename = "sender")]
    pub sender_nickname: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_private: bool,
    pub is_channel: bool,
    #[serde(rename = "channel")]
    pub channel_name: Option<String>,
    #[serde(rename = "recipient")]
    pub recipient_nickname: Option<String>,
    pub is_encrypted: bool,
    pub is_own: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerView {
    pub id: String,
    pub nickname: String,
    #[serde(rename = "is_online")]
    pub online: bool,
    #[serde(rename = "fingerprint")]
    pub fingerprint_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelView {
    pub name: String,
    #[serde(rename = "is_joined")]
    pub joined: bool,
    #[serde(rename = "is_protected")]
    pub password_protected: bool,
    #[serde(rename = "has_key")]
    pub has_local_key: bool,
    pub member_count: usize,
    pub owner: Option<String>,
}

//! Types shared between the engine bridge and the web server: the display
//! data model, channel crypto and the engine error taxonomy.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{CryptoError, EngineError};
pub use protocol::{ChatMessage, PushEvent, SenderEnvelope};
pub use types::{
    ChannelView, ConnectionStatus, DisplayMessage, Mode, ModeDescriptor, ModeKind, PeerId,
    PeerView,
};

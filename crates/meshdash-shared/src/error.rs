use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext, wrong key or wrong creator")]
    DecryptionFailed,

    #[error("Decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

/// Failures reported by a mesh engine implementation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not connected to the mesh")]
    NotConnected,

    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    #[error("Wrong password for channel {0}")]
    WrongPassword(String),

    #[error("Channel {channel} rejected join: {reason}")]
    JoinRejected { channel: String, reason: String },

    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Transport error: {0}")]
    Transport(String),
}

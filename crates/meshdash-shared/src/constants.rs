/// Application name
pub const APP_NAME: &str = "meshdash";

/// Maximum number of display messages kept in memory
pub const HISTORY_CAPACITY: usize = 100;

/// Number of messages handed to an observer that connects late
pub const BACKFILL_LIMIT: usize = 50;

/// Engine polling interval in milliseconds
pub const DEFAULT_TICK_MS: u64 = 100;

/// Capacity of the push channel feeding websocket observers
pub const PUSH_CHANNEL_CAPACITY: usize = 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Characters of a peer id / fingerprint shown in short form
pub const SHORT_ID_LEN: usize = 8;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Channel key size in bytes
pub const CHANNEL_KEY_SIZE: usize = 32;

/// Key derivation context (BLAKE3)
pub const KDF_CONTEXT_CHANNEL_KEY: &str = "meshdash-channel-key-v1";

/// Display name of the broadcast mode
pub const PUBLIC_MODE_NAME: &str = "Public Chat";

/// Shown instead of channel content whose decryption failed
pub const PLACEHOLDER_DECRYPT_FAILED: &str = "[Encrypted - decryption failed]";

/// Shown instead of channel content when no key is held
pub const PLACEHOLDER_NO_KEY: &str = "[Encrypted - join channel with password]";

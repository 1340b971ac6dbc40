//! Turns inbound engine messages into [`DisplayMessage`]s, keeps the
//! bounded history and fans each new message out to observers.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use meshdash_shared::constants::{PLACEHOLDER_DECRYPT_FAILED, PLACEHOLDER_NO_KEY};
use meshdash_shared::crypto::{decrypt_from_channel, ChannelKey};
use meshdash_shared::error::CryptoError;
use meshdash_shared::protocol::{ChatMessage, PushEvent};
use meshdash_shared::types::DisplayMessage;

use crate::engine::{EngineState, InboundMessage};
use crate::history::SharedHistory;

/// Why encrypted content could not be shown.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Undecryptable {
    #[error("no key held for the channel")]
    MissingKey,

    #[error("message carries no ciphertext")]
    MissingCiphertext,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl Undecryptable {
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::MissingKey => PLACEHOLDER_NO_KEY,
            Self::MissingCiphertext | Self::Crypto(_) => PLACEHOLDER_DECRYPT_FAILED,
        }
    }
}

/// Decrypt channel content with the channel key, binding the channel
/// creator's identity as associated data.
pub fn decrypt_content(
    message: &ChatMessage,
    state: &EngineState,
    key: Option<&ChannelKey>,
) -> Result<String, Undecryptable> {
    let (Some(channel), Some(key)) = (message.channel.as_deref(), key) else {
        return Err(Undecryptable::MissingKey);
    };
    let ciphertext = message
        .encrypted_content
        .as_deref()
        .ok_or(Undecryptable::MissingCiphertext)?;
    let creator = state
        .channel_creators
        .get(channel)
        .map(String::as_str)
        .unwrap_or_default();

    Ok(decrypt_from_channel(key, ciphertext, creator)?)
}

pub struct MessageBroadcaster {
    history: SharedHistory,
    push: broadcast::Sender<PushEvent>,
}

impl MessageBroadcaster {
    pub fn new(history: SharedHistory, push: broadcast::Sender<PushEvent>) -> Self {
        Self { history, push }
    }

    /// Format, append and push one inbound message. Must only be called
    /// from the engine context, one message at a time.
    pub fn publish(
        &self,
        inbound: InboundMessage,
        state: &EngineState,
        key: Option<&ChannelKey>,
    ) -> DisplayMessage {
        let message = self.format(inbound, state, key);
        self.history.push(message.clone());

        let receivers = self.push.receiver_count();
        let _ = self.push.send(PushEvent::NewMessage(message.clone()));
        debug!(
            id = %message.id,
            channel = ?message.channel_name,
            private = message.is_private,
            receivers,
            "Message published"
        );
        message
    }

    fn format(
        &self,
        inbound: InboundMessage,
        state: &EngineState,
        key: Option<&ChannelKey>,
    ) -> DisplayMessage {
        let InboundMessage {
            message,
            sender,
            is_private,
        } = inbound;

        let content = if message.is_encrypted {
            decrypt_content(&message, state, key).unwrap_or_else(|e| {
                warn!(
                    id = %message.id,
                    channel = ?message.channel,
                    error = %e,
                    "Showing placeholder for encrypted message"
                );
                e.placeholder().to_string()
            })
        } else {
            message.content
        };

        let recipient_nickname = if is_private {
            message
                .recipient_nickname
                .or_else(|| Some(state.nickname.clone()))
        } else {
            None
        };

        let id = if message.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            message.id
        };

        DisplayMessage {
            id,
            content,
            sender_nickname: state.display_nickname(&sender.sender_id),
            sender_id: sender.sender_id.to_string(),
            timestamp: Utc::now(),
            is_private,
            is_channel: message.channel.is_some(),
            channel_name: message.channel,
            recipient_nickname,
            is_encrypted: message.is_encrypted,
            is_own: state.is_local(&sender.sender_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshdash_shared::crypto::{derive_channel_key, encrypt_for_channel};
    use meshdash_shared::protocol::SenderEnvelope;
    use meshdash_shared::types::PeerId;

    fn state() -> EngineState {
        let mut state = EngineState {
            nickname: "me".into(),
            peer_id: PeerId::new("11112222aaaa"),
            ..Default::default()
        };
        state
            .channel_creators
            .insert("#vault".into(), "c0ffee00".into());
        state
    }

    fn broadcaster() -> (MessageBroadcaster, broadcast::Receiver<PushEvent>, SharedHistory) {
        let (push, rx) = broadcast::channel(16);
        let history = SharedHistory::new(100);
        (MessageBroadcaster::new(history.clone(), push), rx, history)
    }

    fn from(sender: &str, message: ChatMessage, is_private: bool) -> InboundMessage {
        InboundMessage {
            message,
            sender: SenderEnvelope::new(PeerId::new(sender)),
            is_private,
        }
    }

    #[test]
    fn test_plain_message_is_appended_and_pushed() {
        let (broadcaster, mut rx, history) = broadcaster();
        let display = broadcaster.publish(
            from("99998888bbbb", ChatMessage::plain("m1", "hello"), false),
            &state(),
            None,
        );

        assert_eq!(display.content, "hello");
        assert_eq!(display.sender_nickname, "99998888");
        assert!(!display.is_own);
        assert!(history.contains("m1"));
        match rx.try_recv().unwrap() {
            PushEvent::NewMessage(pushed) => assert_eq!(pushed, display),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_encrypted_without_key_placeholder() {
        let (broadcaster, _rx, _history) = broadcaster();
        let message = ChatMessage::plain("m2", "")
            .in_channel("#vault")
            .encrypted(vec![0u8; 48]);
        let display = broadcaster.publish(from("99998888bbbb", message, false), &state(), None);

        assert_eq!(display.content, "[Encrypted - join channel with password]");
        assert!(display.is_encrypted);
        assert!(display.is_channel);
    }

    #[test]
    fn test_encrypted_with_wrong_key_placeholder() {
        let (broadcaster, _rx, _history) = broadcaster();
        let right = derive_channel_key("right", "#vault");
        let wrong = derive_channel_key("wrong", "#vault");
        let ciphertext = encrypt_for_channel(&right, "top secret", "c0ffee00").unwrap();
        let message = ChatMessage::plain("m3", "")
            .in_channel("#vault")
            .encrypted(ciphertext);

        let display =
            broadcaster.publish(from("99998888bbbb", message, false), &state(), Some(&wrong));
        assert_eq!(display.content, "[Encrypted - decryption failed]");
    }

    #[test]
    fn test_encrypted_with_key_decrypts() {
        let (broadcaster, _rx, _history) = broadcaster();
        let key = derive_channel_key("right", "#vault");
        let ciphertext = encrypt_for_channel(&key, "top secret", "c0ffee00").unwrap();
        let message = ChatMessage::plain("m4", "")
            .in_channel("#vault")
            .encrypted(ciphertext);

        let display =
            broadcaster.publish(from("99998888bbbb", message, false), &state(), Some(&key));
        assert_eq!(display.content, "top secret");
    }

    #[test]
    fn test_wrong_creator_fails_decryption() {
        let (broadcaster, _rx, _history) = broadcaster();
        let key = derive_channel_key("right", "#vault");
        let ciphertext = encrypt_for_channel(&key, "top secret", "someone-else").unwrap();
        let message = ChatMessage::plain("m5", "")
            .in_channel("#vault")
            .encrypted(ciphertext);

        let display =
            broadcaster.publish(from("99998888bbbb", message, false), &state(), Some(&key));
        assert_eq!(display.content, PLACEHOLDER_DECRYPT_FAILED);
    }

    #[test]
    fn test_inbound_private_addressed_to_us() {
        let (broadcaster, _rx, _history) = broadcaster();
        let display = broadcaster.publish(
            from("99998888bbbb", ChatMessage::plain("m6", "psst"), true),
            &state(),
            None,
        );
        assert!(display.is_private);
        assert_eq!(display.recipient_nickname.as_deref(), Some("me"));
    }

    #[test]
    fn test_own_message_flagged() {
        let (broadcaster, _rx, _history) = broadcaster();
        let display = broadcaster.publish(
            from("11112222aaaa", ChatMessage::plain("", "hi"), false),
            &state(),
            None,
        );
        assert!(display.is_own);
        assert_eq!(display.sender_nickname, "me");
        assert!(!display.id.is_empty());
    }

    #[test]
    fn test_publish_without_observers_still_records() {
        let (push, rx) = broadcast::channel(4);
        drop(rx);
        let history = SharedHistory::new(100);
        let broadcaster = MessageBroadcaster::new(history.clone(), push);

        broadcaster.publish(
            from("99998888bbbb", ChatMessage::plain("m7", "anyone?"), false),
            &state(),
            None,
        );
        assert_eq!(history.len(), 1);
    }
}

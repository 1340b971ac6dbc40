//! Intents submitted by request handlers.
//!
//! Constructors validate and normalise their input, so a [`Command`] that
//! exists is always well-formed. Validation failures are reported to the
//! caller synchronously; everything after enqueueing is fire-and-forget.

use thiserror::Error;

use meshdash_shared::types::ModeKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message content is required")]
    EmptyContent,

    #[error("Target nickname is required")]
    MissingTarget,

    #[error("Channel name is required")]
    MissingChannel,

    #[error("Nickname is required")]
    MissingNickname,

    #[error("Unknown mode type: {0}")]
    UnknownModeKind(String),

    #[error("Mode {0} requires a target")]
    MissingModeTarget(&'static str),
}

/// An intent to be applied to the engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendBroadcast { text: String },
    SendDirect { text: String, nickname: String },
    JoinChannel { name: String, password: Option<String> },
    ChangeNickname { name: String },
    SwitchMode { kind: ModeKind, target: String },
}

impl Command {
    pub fn send_broadcast(text: &str) -> Result<Self, ValidationError> {
        let text = non_empty(text).ok_or(ValidationError::EmptyContent)?;
        Ok(Self::SendBroadcast { text })
    }

    pub fn send_direct(text: &str, nickname: &str) -> Result<Self, ValidationError> {
        let text = non_empty(text).ok_or(ValidationError::EmptyContent)?;
        let nickname = non_empty(nickname).ok_or(ValidationError::MissingTarget)?;
        Ok(Self::SendDirect { text, nickname })
    }

    /// A missing leading `#` is added; an empty password means none.
    pub fn join_channel(name: &str, password: Option<&str>) -> Result<Self, ValidationError> {
        let name = normalize_channel_name(name).ok_or(ValidationError::MissingChannel)?;
        let password = password.filter(|p| !p.is_empty()).map(str::to_string);
        Ok(Self::JoinChannel { name, password })
    }

    pub fn change_nickname(name: &str) -> Result<Self, ValidationError> {
        let name = non_empty(name).ok_or(ValidationError::MissingNickname)?;
        Ok(Self::ChangeNickname { name })
    }

    pub fn switch_mode(kind: &str, target: Option<&str>) -> Result<Self, ValidationError> {
        let kind: ModeKind = kind
            .parse()
            .map_err(|_| ValidationError::UnknownModeKind(kind.to_string()))?;
        let target = target.unwrap_or_default();

        let target = match kind {
            ModeKind::Public => String::new(),
            ModeKind::Channel => normalize_channel_name(target)
                .ok_or(ValidationError::MissingModeTarget("channel"))?,
            ModeKind::Dm => non_empty(target).ok_or(ValidationError::MissingModeTarget("dm"))?,
        };

        Ok(Self::SwitchMode { kind, target })
    }

    /// Short name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendBroadcast { .. } => "send_broadcast",
            Self::SendDirect { .. } => "send_direct",
            Self::JoinChannel { .. } => "join_channel",
            Self::ChangeNickname { .. } => "change_nickname",
            Self::SwitchMode { .. } => "switch_mode",
        }
    }
}

pub fn normalize_channel_name(name: &str) -> Option<String> {
    let name = name.trim();
    let bare = name.strip_prefix('#').unwrap_or(name);
    if bare.is_empty() {
        return None;
    }
    Some(format!("#{bare}"))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_rejects_blank() {
        assert_eq!(
            Command::send_broadcast("   "),
            Err(ValidationError::EmptyContent)
        );
        assert_eq!(
            Command::send_broadcast(" hi "),
            Ok(Command::SendBroadcast { text: "hi".into() })
        );
    }

    #[test]
    fn test_direct_requires_target() {
        assert_eq!(
            Command::send_direct("hello", ""),
            Err(ValidationError::MissingTarget)
        );
        assert_eq!(
            Command::send_direct("", "bob"),
            Err(ValidationError::EmptyContent)
        );
    }

    #[test]
    fn test_join_normalises_name_and_password() {
        assert_eq!(
            Command::join_channel("general", Some("")),
            Ok(Command::JoinChannel {
                name: "#general".into(),
                password: None
            })
        );
        assert_eq!(
            Command::join_channel("#general", Some("secret")),
            Ok(Command::JoinChannel {
                name: "#general".into(),
                password: Some("secret".into())
            })
        );
        assert_eq!(
            Command::join_channel("#", None),
            Err(ValidationError::MissingChannel)
        );
    }

    #[test]
    fn test_nickname_required() {
        assert_eq!(
            Command::change_nickname(""),
            Err(ValidationError::MissingNickname)
        );
    }

    #[test]
    fn test_switch_mode_parsing() {
        assert_eq!(
            Command::switch_mode("public", None),
            Ok(Command::SwitchMode {
                kind: ModeKind::Public,
                target: String::new()
            })
        );
        assert_eq!(
            Command::switch_mode("channel", Some("ops")),
            Ok(Command::SwitchMode {
                kind: ModeKind::Channel,
                target: "#ops".into()
            })
        );
        assert_eq!(
            Command::switch_mode("dm", Some("")),
            Err(ValidationError::MissingModeTarget("dm"))
        );
        assert!(matches!(
            Command::switch_mode("group", Some("x")),
            Err(ValidationError::UnknownModeKind(_))
        ));
    }
}

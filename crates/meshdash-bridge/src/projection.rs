//! Read-only projections computed from an [`EngineState`] on every query.

use meshdash_shared::types::{short_form, ChannelView, PeerView};

use crate::engine::EngineState;

pub fn peer_views(state: &EngineState) -> Vec<PeerView> {
    state
        .peers
        .values()
        .map(|peer| PeerView {
            id: peer.id.to_string(),
            nickname: peer
                .nickname
                .clone()
                .unwrap_or_else(|| peer.id.short().to_string()),
            online: true,
            fingerprint_prefix: peer
                .fingerprint
                .as_deref()
                .map(|fp| short_form(fp).to_string()),
        })
        .collect()
}

/// Union of joined and discovered channels, sorted by name.
pub fn channel_views(state: &EngineState) -> Vec<ChannelView> {
    state
        .active_channels
        .union(&state.discovered_channels)
        .map(|name| {
            let joined = state.active_channels.contains(name);
            ChannelView {
                name: name.clone(),
                joined,
                password_protected: state.protected_channels.contains(name),
                has_local_key: state.keyed_channels.contains(name),
                member_count: if joined { state.peers.len() } else { 0 },
                owner: state.channel_creators.get(name).cloned(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PeerState;
    use meshdash_shared::types::PeerId;

    fn sample_state() -> EngineState {
        let mut state = EngineState::default();
        for (id, nick, fp) in [
            ("aaaaaaaa0001", Some("alice"), Some("0123456789abcdef")),
            ("bbbbbbbb0002", None, None),
        ] {
            let id = PeerId::new(id);
            state.peers.insert(
                id.clone(),
                PeerState {
                    id,
                    nickname: nick.map(str::to_string),
                    fingerprint: fp.map(str::to_string),
                },
            );
        }
        state.active_channels.insert("#general".into());
        state.discovered_channels.insert("#general".into());
        state.discovered_channels.insert("#vault".into());
        state.protected_channels.insert("#vault".into());
        state
            .channel_creators
            .insert("#vault".into(), "c0ffee00".into());
        state
    }

    #[test]
    fn test_peer_views() {
        let peers = peer_views(&sample_state());
        assert_eq!(peers.len(), 2);

        let alice = &peers[0];
        assert_eq!(alice.nickname, "alice");
        assert!(alice.online);
        assert_eq!(alice.fingerprint_prefix.as_deref(), Some("01234567"));

        let anonymous = &peers[1];
        assert_eq!(anonymous.nickname, "bbbbbbbb");
        assert_eq!(anonymous.fingerprint_prefix, None);
    }

    #[test]
    fn test_channel_views_union_without_duplicates() {
        let channels = channel_views(&sample_state());
        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["#general", "#vault"]);
    }

    #[test]
    fn test_channel_view_fields() {
        let channels = channel_views(&sample_state());

        let general = &channels[0];
        assert!(general.joined);
        assert_eq!(general.member_count, 2);
        assert!(!general.password_protected);

        let vault = &channels[1];
        assert!(!vault.joined);
        assert_eq!(vault.member_count, 0);
        assert!(vault.password_protected);
        assert!(!vault.has_local_key);
        assert_eq!(vault.owner.as_deref(), Some("c0ffee00"));
    }
}

//! The request-handler side of the bridge.
//!
//! A [`BridgeHandle`] is cheap to clone and is all a request handler ever
//! touches: it can submit commands and read snapshots, never the engine.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use meshdash_shared::protocol::PushEvent;
use meshdash_shared::types::{
    ChannelView, ConnectionStatus, DisplayMessage, Mode, ModeDescriptor, PeerView,
};

use crate::command::Command;
use crate::engine::EngineState;
use crate::history::SharedHistory;
use crate::projection;
use crate::queue::{CommandSender, SubmitError};
use crate::status::ShutdownSignal;

/// What the engine context last published: engine state plus the mode.
#[derive(Debug, Clone, Default)]
pub struct BridgeView {
    pub state: EngineState,
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub status: ConnectionStatus,
    pub nickname: String,
    pub peer_id: String,
    pub peer_count: usize,
    pub session_count: usize,
    pub current_mode: ModeDescriptor,
}

#[derive(Clone)]
pub struct BridgeHandle {
    pub(crate) commands: CommandSender,
    pub(crate) view: watch::Receiver<Arc<BridgeView>>,
    pub(crate) status: watch::Receiver<ConnectionStatus>,
    pub(crate) history: SharedHistory,
    pub(crate) push: broadcast::Sender<PushEvent>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) backfill: usize,
}

impl BridgeHandle {
    /// Enqueue a command. Never waits on the engine.
    pub fn submit(&self, command: Command) -> Result<(), SubmitError> {
        self.commands.submit(command)
    }

    /// Latest published view; may trail the engine by up to one tick.
    pub fn view(&self) -> Arc<BridgeView> {
        self.view.borrow().clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn mode(&self) -> Mode {
        self.view().mode.clone()
    }

    pub fn status_report(&self) -> StatusReport {
        let view = self.view();
        let status = self.connection_status();
        StatusReport {
            connected: status.is_connected(),
            status,
            nickname: view.state.nickname.clone(),
            peer_id: view.state.peer_id.to_string(),
            peer_count: view.state.peers.len(),
            session_count: view.state.session_count,
            current_mode: view.mode.descriptor(),
        }
    }

    pub fn peers(&self) -> Vec<PeerView> {
        projection::peer_views(&self.view().state)
    }

    pub fn channels(&self) -> Vec<ChannelView> {
        projection::channel_views(&self.view().state)
    }

    /// Backfill for a late observer: the most recent messages, oldest first.
    pub fn recent_messages(&self) -> Vec<DisplayMessage> {
        self.history.last(self.backfill)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.push.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.push.receiver_count()
    }

    /// Ask the engine loop to stop. Only the first call has an effect.
    pub fn request_shutdown(&self) -> bool {
        self.shutdown.trigger()
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }
}

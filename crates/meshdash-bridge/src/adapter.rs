//! The engine execution context.
//!
//! [`ChatEngineAdapter`] owns the engine and is the only code that mutates
//! it. It runs a fixed-interval loop on a dedicated single-threaded runtime:
//! every tick it drains the command queue and applies each command in
//! submission order, and between ticks it handles engine events as they
//! arrive. Request handlers talk to it exclusively through the
//! [`BridgeHandle`] returned by [`bridge`].

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use meshdash_shared::constants::{
    BACKFILL_LIMIT, DEFAULT_TICK_MS, HISTORY_CAPACITY, PUSH_CHANNEL_CAPACITY,
};
use meshdash_shared::error::EngineError;
use meshdash_shared::protocol::{ChatMessage, SenderEnvelope};
use meshdash_shared::types::{ConnectionStatus, Mode, ModeKind};

use crate::broadcaster::MessageBroadcaster;
use crate::command::Command;
use crate::engine::{EngineEvent, EngineState, InboundMessage, MeshEngine};
use crate::handle::{BridgeHandle, BridgeView};
use crate::history::SharedHistory;
use crate::mode::ModeStateMachine;
use crate::queue::{command_queue, CommandQueue};
use crate::settings::{AppSettings, SettingsError, SettingsStore};
use crate::status::{ConnectionStatusTracker, ShutdownSignal};

/// Bridge tuning.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub tick: Duration,
    pub history_capacity: usize,
    pub backfill: usize,
    pub push_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            history_capacity: HISTORY_CAPACITY,
            backfill: BACKFILL_LIMIT,
            push_capacity: PUSH_CHANNEL_CAPACITY,
        }
    }
}

/// Why a single command could not be applied. Logged, never returned to
/// the submitter.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("No peer with nickname {0}")]
    UnknownNickname(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to persist settings: {0}")]
    Settings(#[from] SettingsError),
}

/// Wire an engine into a bridge.
///
/// `events` is the receiving half of the channel the engine publishes its
/// inbound traffic on. Returns the handle for request handlers and the
/// adapter to run on the engine context.
pub fn bridge<E, S>(
    engine: E,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    settings: S,
    config: BridgeConfig,
) -> (BridgeHandle, ChatEngineAdapter<E, S>)
where
    E: MeshEngine,
    S: SettingsStore,
{
    let (commands, queue) = command_queue();
    let (push, _) = broadcast::channel(config.push_capacity);
    let shutdown = ShutdownSignal::new();
    let tracker = ConnectionStatusTracker::new(push.clone(), shutdown.clone());
    let history = SharedHistory::new(config.history_capacity);
    let (view_tx, view_rx) = watch::channel(Arc::new(BridgeView {
        state: engine.state(),
        mode: Mode::Broadcast,
    }));

    let handle = BridgeHandle {
        commands,
        view: view_rx,
        status: tracker.watch(),
        history: history.clone(),
        push: push.clone(),
        shutdown,
        backfill: config.backfill,
    };

    let adapter = ChatEngineAdapter {
        engine,
        settings,
        queue,
        events,
        events_open: true,
        mode: ModeStateMachine::new(),
        broadcaster: MessageBroadcaster::new(history, push),
        tracker,
        view: view_tx,
        tick_interval: config.tick,
    };

    (handle, adapter)
}

/// Run the adapter on its own OS thread with a current-thread runtime.
///
/// The engine's futures never leave that thread, so they need not be
/// `Send`. The thread exits once the shutdown signal has been observed.
pub fn spawn_engine_thread<E, S>(
    adapter: ChatEngineAdapter<E, S>,
) -> std::io::Result<JoinHandle<()>>
where
    E: MeshEngine + Send + 'static,
    S: SettingsStore + Send + 'static,
{
    std::thread::Builder::new()
        .name("mesh-engine".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(error = %e, "Failed to build engine runtime");
                    return;
                }
            };
            let local = tokio::task::LocalSet::new();
            local.block_on(&runtime, adapter.run());
        })
}

pub struct ChatEngineAdapter<E, S> {
    engine: E,
    settings: S,
    queue: CommandQueue,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    events_open: bool,
    mode: ModeStateMachine,
    broadcaster: MessageBroadcaster,
    tracker: ConnectionStatusTracker,
    view: watch::Sender<Arc<BridgeView>>,
    tick_interval: Duration,
}

impl<E, S> ChatEngineAdapter<E, S>
where
    E: MeshEngine,
    S: SettingsStore,
{
    /// Connect, then loop until shutdown is requested.
    pub async fn run(mut self) {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            "Engine context started"
        );
        self.start().await;

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.tracker.is_running() {
                        break;
                    }
                    self.tick().await;
                }
                event = self.events.recv(), if self.events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("Engine event stream closed");
                        self.events_open = false;
                    }
                },
            }
        }

        self.stop();
    }

    /// Bring the engine up. A failed connect is not fatal: the engine is
    /// left discovering and the status stays disconnected.
    pub async fn start(&mut self) {
        self.tracker.transition(ConnectionStatus::Connecting);

        if self.engine.connect().await {
            self.tracker.transition(ConnectionStatus::Connected);
        } else {
            self.tracker.transition(ConnectionStatus::Disconnected);
            info!("No mesh link, continuing in discovery mode");
            self.engine.start_discovery().await;
        }

        if let Err(e) = self.engine.handshake().await {
            warn!(error = %e, "Handshake failed");
        }

        self.publish_view();
    }

    /// One polling step: apply every queued command, then republish the
    /// view. Returns how many commands were taken from the queue.
    pub async fn tick(&mut self) -> usize {
        let batch: Vec<Command> = self.queue.drain().collect();
        let taken = batch.len();

        for command in batch {
            let label = command.label();
            match self.apply(command).await {
                Ok(()) => debug!(command = label, "Command applied"),
                Err(e) => warn!(command = label, error = %e, "Command not applied"),
            }
        }

        self.publish_view();
        taken
    }

    /// Handle every engine event that is already waiting.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Message(inbound) => {
                let state = self.engine.state();
                self.publish(inbound, &state);
            }
            EngineEvent::Connected => {
                self.tracker.transition(ConnectionStatus::Connected);
            }
            EngineEvent::Disconnected => {
                self.tracker.transition(ConnectionStatus::Disconnected);
            }
        }
    }

    async fn apply(&mut self, command: Command) -> Result<(), ApplyError> {
        match command {
            Command::SendBroadcast { text } => match self.mode.current().clone() {
                Mode::DirectMessage { peer_id, nickname } => {
                    debug!(peer = %peer_id, "Broadcast redirected to current DM");
                    let sent = self.engine.send_direct(&text, &peer_id, &nickname).await?;
                    self.echo(sent, true);
                }
                Mode::Channel(channel) => {
                    let sent = self.engine.send_broadcast(&text, Some(&channel)).await?;
                    self.echo(sent, false);
                }
                Mode::Broadcast => {
                    let sent = self.engine.send_broadcast(&text, None).await?;
                    self.echo(sent, false);
                }
            },

            Command::SendDirect { text, nickname } => {
                let peer_id = self
                    .engine
                    .state()
                    .find_peer_by_nickname(&nickname)
                    .map(|peer| peer.id.clone())
                    .ok_or_else(|| ApplyError::UnknownNickname(nickname.clone()))?;
                let sent = self.engine.send_direct(&text, &peer_id, &nickname).await?;
                self.echo(sent, true);
            }

            Command::JoinChannel { name, password } => {
                self.engine.join_channel(&name, password.as_deref()).await?;
                info!(channel = %name, protected = password.is_some(), "Joined channel");
            }

            Command::ChangeNickname { name } => {
                self.engine.change_nickname(&name).await?;
                info!(nickname = %name, "Nickname changed");
                self.persist_settings().await?;
            }

            Command::SwitchMode { kind, target } => {
                let state = self.engine.state();
                let changed = self.mode.switch(kind, &target, &state);
                if !changed
                    && kind == ModeKind::Dm
                    && state.find_peer_by_nickname(&target).is_none()
                {
                    info!(nickname = %target, "No peer with that nickname, mode unchanged");
                }
            }
        }
        Ok(())
    }

    async fn persist_settings(&self) -> Result<(), SettingsError> {
        let state = self.engine.state();
        let settings = AppSettings {
            nickname: Some(state.nickname),
            joined_channels: state.active_channels.into_iter().collect(),
        };
        self.settings.save(&settings).await
    }

    /// Show a message we just sent the same way inbound traffic is shown.
    fn echo(&self, message: ChatMessage, is_private: bool) {
        let state = self.engine.state();
        let inbound = InboundMessage {
            message,
            sender: SenderEnvelope::new(state.peer_id.clone()),
            is_private,
        };
        self.publish(inbound, &state);
    }

    fn publish(&self, inbound: InboundMessage, state: &EngineState) {
        let key = inbound
            .message
            .channel
            .as_deref()
            .and_then(|channel| self.engine.channel_key(channel));
        self.broadcaster.publish(inbound, state, key.as_ref());
    }

    fn publish_view(&self) {
        self.view.send_replace(Arc::new(BridgeView {
            state: self.engine.state(),
            mode: self.mode.current().clone(),
        }));
    }

    fn stop(&mut self) {
        let dropped = self.queue.close();
        if dropped > 0 {
            warn!(dropped, "Dropping commands still queued at shutdown");
        }
        self.tracker.transition(ConnectionStatus::Disconnected);
        info!("Engine context stopped");
    }

    pub fn mode(&self) -> &Mode {
        self.mode.current()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.tracker.status()
    }
}

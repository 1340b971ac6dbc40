// Bridge between HTTP request handlers and a single-threaded mesh engine.

pub mod adapter;
pub mod broadcaster;
pub mod command;
pub mod engine;
pub mod handle;
pub mod history;
pub mod loopback;
pub mod mode;
pub mod projection;
pub mod queue;
pub mod settings;
pub mod status;

pub use adapter::{bridge, spawn_engine_thread, ApplyError, BridgeConfig, ChatEngineAdapter};
pub use broadcaster::MessageBroadcaster;
pub use command::{Command, ValidationError};
pub use engine::{EngineEvent, EngineState, InboundMessage, MeshEngine, PeerState};
pub use handle::{BridgeHandle, BridgeView, StatusReport};
pub use history::{HistoryBuffer, SharedHistory};
pub use loopback::{LoopbackControl, LoopbackEngine, SentFrame};
pub use mode::ModeStateMachine;
pub use queue::{CommandSender, SubmitError};
pub use settings::{AppSettings, JsonFileSettings, MemorySettings, SettingsError, SettingsStore};
pub use status::{ConnectionStatusTracker, ShutdownSignal};

//! Connection status and the process-wide running flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use meshdash_shared::protocol::PushEvent;
use meshdash_shared::types::ConnectionStatus;

/// Running flag shared by the signal handler and the engine loop.
/// Starts running; can be stopped exactly once.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    running: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns `true` for the call that actually stopped the flag.
    pub fn trigger(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            info!("Shutdown requested");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Single writer of [`ConnectionStatus`]. Every change is pushed to
/// observers as it happens.
#[derive(Debug)]
pub struct ConnectionStatusTracker {
    status: watch::Sender<ConnectionStatus>,
    push: broadcast::Sender<PushEvent>,
    shutdown: ShutdownSignal,
}

impl ConnectionStatusTracker {
    pub fn new(push: broadcast::Sender<PushEvent>, shutdown: ShutdownSignal) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            status,
            push,
            shutdown,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Move to `next`. Returns whether this was an actual transition.
    pub fn transition(&self, next: ConnectionStatus) -> bool {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });

        if changed {
            info!(status = next.as_str(), "Connection status changed");
            let _ = self.push.send(PushEvent::ConnectionStatus { status: next });
        }
        changed
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (ConnectionStatusTracker, broadcast::Receiver<PushEvent>) {
        let (push, rx) = broadcast::channel(16);
        (ConnectionStatusTracker::new(push, ShutdownSignal::new()), rx)
    }

    #[test]
    fn test_starts_disconnected() {
        let (tracker, _rx) = tracker();
        assert_eq!(tracker.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_each_transition_is_pushed() {
        let (tracker, mut rx) = tracker();
        assert!(tracker.transition(ConnectionStatus::Connecting));
        assert!(tracker.transition(ConnectionStatus::Connected));

        for expected in [ConnectionStatus::Connecting, ConnectionStatus::Connected] {
            match rx.try_recv().unwrap() {
                PushEvent::ConnectionStatus { status } => assert_eq!(status, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_same_status_not_pushed() {
        let (tracker, mut rx) = tracker();
        assert!(!tracker.transition(ConnectionStatus::Disconnected));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_watchers_see_latest() {
        let (tracker, _rx) = tracker();
        let watcher = tracker.watch();
        tracker.transition(ConnectionStatus::Connected);
        assert_eq!(*watcher.borrow(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_shutdown_flag_flips_once() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(signal.is_running());
        assert!(other.trigger());
        assert!(!signal.trigger());
        assert!(!signal.is_running());
    }
}

//! Multi-producer, single-consumer command queue.
//!
//! Request handlers hold cheap [`CommandSender`] clones; the engine context
//! owns the one [`CommandQueue`]. Submission never blocks and only fails once
//! the consumer has closed the queue at shutdown.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::command::Command;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Engine is shutting down, command dropped")]
    ShuttingDown,
}

/// Create a connected sender/queue pair.
pub fn command_queue() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandQueue { rx })
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    pub fn submit(&self, command: Command) -> Result<(), SubmitError> {
        self.tx
            .send(command)
            .map_err(|_| SubmitError::ShuttingDown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    /// Take the commands queued at the time of the call, in submission order.
    ///
    /// Commands submitted while the batch is being consumed wait for the
    /// next call. Dropping the iterator early leaves the rest queued.
    pub fn drain(&mut self) -> Drain<'_> {
        let remaining = self.rx.len();
        Drain {
            rx: &mut self.rx,
            remaining,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Refuse further submissions and discard whatever is still queued.
    /// Returns the number of discarded commands.
    pub fn close(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

pub struct Drain<'a> {
    rx: &'a mut mpsc::UnboundedReceiver<Command>,
    remaining: usize,
}

impl Iterator for Drain<'_> {
    type Item = Command;

    fn next(&mut self) -> Option<Command> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.rx.try_recv().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nick(name: &str) -> Command {
        Command::ChangeNickname { name: name.into() }
    }

    #[test]
    fn test_drain_preserves_fifo() {
        let (tx, mut queue) = command_queue();
        for name in ["a", "b", "c"] {
            tx.submit(nick(name)).unwrap();
        }

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained, vec![nick("a"), nick("b"), nick("c")]);
        assert!(queue.is_empty());
        assert_eq!(queue.drain().count(), 0);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let (tx, mut queue) = command_queue();
        tx.submit(nick("same")).unwrap();
        tx.submit(nick("same")).unwrap();

        assert_eq!(queue.drain().count(), 2);
    }

    #[test]
    fn test_partial_drain_leaves_rest() {
        let (tx, mut queue) = command_queue();
        for name in ["a", "b", "c"] {
            tx.submit(nick(name)).unwrap();
        }

        let first = queue.drain().next();
        assert_eq!(first, Some(nick("a")));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().next(), Some(nick("b")));
    }

    #[test]
    fn test_submissions_during_drain_wait_for_next_batch() {
        let (tx, mut queue) = command_queue();
        tx.submit(nick("a")).unwrap();

        let mut batch = queue.drain();
        tx.submit(nick("late")).unwrap();
        assert_eq!(batch.next(), Some(nick("a")));
        assert_eq!(batch.next(), None);

        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![nick("late")]);
    }

    #[test]
    fn test_submit_fails_after_close() {
        let (tx, mut queue) = command_queue();
        tx.submit(nick("a")).unwrap();
        tx.submit(nick("b")).unwrap();

        assert_eq!(queue.close(), 2);
        assert!(tx.is_closed());
        assert_eq!(tx.submit(nick("c")), Err(SubmitError::ShuttingDown));
    }

    #[test]
    fn test_submit_fails_when_consumer_dropped() {
        let (tx, queue) = command_queue();
        drop(queue);
        assert_eq!(tx.submit(nick("a")), Err(SubmitError::ShuttingDown));
    }
}

//! Bounded hand-off of loudness samples to the avatar task

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Create a level queue together with its one consumer.
///
/// The queue holds at least `capacity` levels (the channel rounds up to a
/// power of two). When full, the oldest level is overwritten: a stale mouth
/// position is worth less than the newest one.
pub fn level_channel(capacity: usize) -> (LevelQueue, LevelReceiver) {
    let (sender, receiver) = broadcast::channel(capacity.max(1));
    (
        LevelQueue { sender },
        LevelReceiver { receiver, dropped: 0 },
    )
}

/// Producer side. Never blocks; dropping it closes the queue.
#[derive(Debug)]
pub struct LevelQueue {
    sender: broadcast::Sender<f32>,
}

impl LevelQueue {
    /// Enqueue a level. Returns false once the consumer is gone.
    pub fn offer(&self, level: f32) -> bool {
        self.sender.send(level).is_ok()
    }
}

/// Consumer side, owned by whoever feeds the avatar
#[derive(Debug)]
pub struct LevelReceiver {
    receiver: broadcast::Receiver<f32>,
    dropped: u64,
}

impl LevelReceiver {
    /// Next level, or `None` once the queue is dropped and drained
    pub async fn recv(&mut self) -> Option<f32> {
        loop {
            match self.receiver.recv().await {
                Ok(level) => return Some(level),
                Err(RecvError::Lagged(skipped)) => self.dropped += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next level if one is already waiting
    pub fn try_recv(&mut self) -> Option<f32> {
        loop {
            match self.receiver.try_recv() {
                Ok(level) => return Some(level),
                Err(TryRecvError::Lagged(skipped)) => self.dropped += skipped,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Levels overwritten because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

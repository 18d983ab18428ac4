//! Same-key synchronization between state handles.
//!
//! Two handles bound to the same URL key must agree before the flush lands.
//! Every write is broadcast as a [`KeyChange`]; handles subscribe to the key
//! they care about.

use tokio::sync::broadcast;

/// Capacity of the change channel; slow subscribers skip older changes.
const CHANNEL_CAPACITY: usize = 64;

/// A write to one URL key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub key: String,
    /// New serialized value, `None` when the key was removed.
    pub query: Option<String>,
}

/// Broadcasts [`KeyChange`]s to every subscriber of a session.
#[derive(Debug, Clone)]
pub struct SyncEmitter {
    sender: broadcast::Sender<KeyChange>,
}

impl Default for SyncEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEmitter {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Broadcast a change. Returns the number of subscribers reached.
    pub fn emit(&self, key: impl Into<String>, query: Option<String>) -> usize {
        let change = KeyChange {
            key: key.into(),
            query,
        };
        // No subscribers is not an error.
        self.sender.send(change).unwrap_or(0)
    }

    /// Receive changes to `key` only.
    #[must_use]
    pub fn subscribe(&self, key: impl Into<String>) -> KeySubscription {
        KeySubscription {
            key: key.into(),
            receiver: self.sender.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Stream of changes to one key.
#[derive(Debug)]
pub struct KeySubscription {
    key: String,
    receiver: broadcast::Receiver<KeyChange>,
}

impl KeySubscription {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next change to the key.
    ///
    /// Returns `None` once the emitter is gone.
    pub async fn recv(&mut self) -> Option<KeyChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.key == self.key => return Some(change),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(key = %self.key, skipped, "subscriber lagged, changes skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered change to the key, without waiting.
    pub fn try_recv(&mut self) -> Option<KeyChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if change.key == self.key => return Some(change),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(key = %self.key, skipped, "subscriber lagged, changes skipped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filters_by_key() {
        let emitter = SyncEmitter::new();
        let mut q = emitter.subscribe("q");

        emitter.emit("page", Some("2".into()));
        emitter.emit("q", Some("rust".into()));

        let change = q.recv().await.unwrap();
        assert_eq!(change.key, "q");
        assert_eq!(change.query.as_deref(), Some("rust"));
        assert!(q.try_recv().is_none());
    }

    #[test]
    fn emit_without_subscribers() {
        let emitter = SyncEmitter::new();
        assert_eq!(emitter.emit("q", None), 0);
        let _sub = emitter.subscribe("q");
        assert_eq!(emitter.subscriber_count(), 1);
        assert_eq!(emitter.emit("q", None), 1);
    }

    #[test]
    fn lagged_subscriber_keeps_latest() {
        let emitter = SyncEmitter::new();
        let mut sub = emitter.subscribe("n");
        for i in 0..(CHANNEL_CAPACITY + 10) {
            emitter.emit("n", Some(i.to_string()));
        }
        let first = sub.try_recv().unwrap();
        assert_eq!(first.query, Some("10".to_string()));
    }

    #[tokio::test]
    async fn closed_emitter_ends_subscription() {
        let emitter = SyncEmitter::new();
        let mut sub = emitter.subscribe("q");
        drop(emitter);
        assert_eq!(sub.recv().await, None);
    }
}

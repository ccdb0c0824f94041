use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Keyed fan-out of events over tokio broadcast channels.
///
/// One channel exists per key (a project id in this crate). Channels are
/// created on first use and can be dropped again once nobody listens.
///
/// # Examples
///
/// ```rust,no_run
/// use branchcanvas::utils::EventBroadcaster;
///
/// # async fn example() {
/// let broadcaster = EventBroadcaster::<String, String>::new(256);
///
/// let mut receiver = broadcaster.subscribe("project-1".to_string()).await;
/// broadcaster
///     .publish("project-1".to_string(), "node moved".to_string())
///     .await;
///
/// let _ = receiver.recv().await;
/// broadcaster.cleanup_idle().await;
/// # }
/// ```
pub struct EventBroadcaster<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    channels: Arc<RwLock<HashMap<K, broadcast::Sender<V>>>>,
    buffer_size: usize,
}

impl<K, V> EventBroadcaster<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `buffer_size` events are kept per channel before slow receivers lag.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            buffer_size,
        }
    }

    pub async fn subscribe(&self, key: K) -> broadcast::Receiver<V> {
        self.get_or_create(key).await.subscribe()
    }

    /// Send `event` to every receiver of `key`.
    ///
    /// Returns how many receivers got it. Events published while nobody is
    /// subscribed are dropped and `0` is returned.
    pub async fn publish(&self, key: K, event: V) -> usize {
        let sender = {
            let channels = self.channels.read().await;
            channels.get(&key).cloned()
        };
        match sender {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn receiver_count(&self, key: &K) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(key)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the channel for `key`; its receivers observe a closed channel.
    pub async fn close(&self, key: &K) -> bool {
        let mut channels = self.channels.write().await;
        channels.remove(key).is_some()
    }

    /// Remove channels without receivers and return how many were dropped.
    pub async fn cleanup_idle(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn channel_count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.len()
    }

    async fn get_or_create(&self, key: K) -> broadcast::Sender<V> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(&key) {
                return sender.clone();
            }
        }

        let mut channels = self.channels.write().await;
        // another task may have created it while we waited for the write lock
        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .clone()
    }
}

impl<K, V> Clone for EventBroadcaster<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            buffer_size: self.buffer_size,
        }
    }
}

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::soap;

/// Per-subscription notification backlog cap.
const BACKLOG_CAP: usize = 256;

/// A pull-point subscription: a FIFO of pre-rendered notification XML
/// fragments plus a fixed termination time.
pub struct Subscription {
    pub id: String,
    pub termination_time: OffsetDateTime,
    messages: Mutex<VecDeque<String>>,
}

impl Subscription {
    fn new(id: String, ttl: Duration) -> Self {
        Self {
            id,
            termination_time: OffsetDateTime::now_utc() + ttl,
            messages: Mutex::new(VecDeque::new()),
        }
    }

    pub fn expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.termination_time
    }

    async fn push(&self, message: String) {
        let mut messages = self.messages.lock().await;
        if messages.len() == BACKLOG_CAP {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Drains up to `limit` queued notifications, oldest first.
    pub async fn pull_messages(&self, limit: usize) -> Vec<String> {
        let mut messages = self.messages.lock().await;
        let take = messages.len().min(limit);
        messages.drain(..take).collect()
    }

    pub fn termination_time_utc(&self) -> String {
        soap::format_utc(self.termination_time)
    }
}

/// Registry of pull-point subscriptions. Expiry is lazy: expired entries
/// are ignored by lookups and broadcasts but stay in the map for the
/// process lifetime.
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: RwLock<HashMap<String, Arc<Subscription>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, ttl: Duration) -> Arc<Subscription> {
        let id = uuid::Uuid::new_v4().to_string();
        let subscription = Arc::new(Subscription::new(id.clone(), ttl));
        self.subscriptions
            .write()
            .await
            .insert(id, subscription.clone());
        debug!(id = %subscription.id, "subscription created");
        subscription
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Subscription>> {
        let subscription = self.subscriptions.read().await.get(id).cloned()?;
        if subscription.expired() {
            return None;
        }
        Some(subscription)
    }

    /// Queues a notification on every live subscription. Expired ones are
    /// skipped but not removed.
    pub async fn broadcast(&self, message: &str) {
        let snapshot: Vec<Arc<Subscription>> =
            self.subscriptions.read().await.values().cloned().collect();

        for subscription in snapshot {
            if !subscription.expired() {
                subscription.push(message.to_string()).await;
            }
        }
    }

    /// Total entries held, expired included.
    pub async fn count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// True when at least one live subscription exists; lets the pump skip
    /// rendering when nobody listens.
    pub async fn any_active(&self) -> bool {
        self.subscriptions
            .read()
            .await
            .values()
            .any(|subscription| !subscription.expired())
    }

    /// Some live subscription, for clients that pull without addressing a
    /// specific reference.
    pub async fn first_active(&self) -> Option<Arc<Subscription>> {
        self.subscriptions
            .read()
            .await
            .values()
            .find(|subscription| !subscription.expired())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pull_drains_fifo() {
        let manager = SubscriptionManager::new();
        let sub = manager.create(Duration::from_secs(60)).await;

        manager.broadcast("a").await;
        manager.broadcast("b").await;
        manager.broadcast("c").await;

        assert_eq!(sub.pull_messages(2).await, ["a", "b"]);
        assert_eq!(sub.pull_messages(10).await, ["c"]);
        assert!(sub.pull_messages(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_subscription_is_ignored_but_kept() {
        let manager = SubscriptionManager::new();
        let sub = manager.create(Duration::from_secs(0)).await;

        manager.broadcast("a").await;
        assert!(manager.get(&sub.id).await.is_none());
        assert!(!manager.any_active().await);
        assert!(manager.first_active().await.is_none());
        // The broadcast never reached the expired subscription.
        assert!(sub.pull_messages(10).await.is_empty());
        // Expired entries stay in the map; nothing sweeps them.
        assert_eq!(manager.count().await, 1);
    }

    #[tokio::test]
    async fn test_backlog_is_bounded() {
        let manager = SubscriptionManager::new();
        let sub = manager.create(Duration::from_secs(60)).await;

        for i in 0..BACKLOG_CAP + 5 {
            manager.broadcast(&format!("m{i}")).await;
        }
        let got = sub.pull_messages(BACKLOG_CAP + 10).await;
        assert_eq!(got.len(), BACKLOG_CAP);
        assert_eq!(got[0], "m5");
    }
}

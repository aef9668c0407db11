//! Progress fan-out: a typed outbound queue per audit id.
//!
//! Delivery is best-effort. A subscriber that went away is pruned the
//! next time a publish hits its closed channel; the pipeline never
//! blocks on observers. There is no replay: late joiners catch up via
//! the audit registry snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use vigil_common::ProgressUpdate;

/// Handle identifying one subscription, for explicit unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

pub struct ProgressBroadcaster {
    subscribers: RwLock<HashMap<Uuid, Vec<(SubscriberId, UnboundedSender<ProgressUpdate>)>>>,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer for one audit id. Updates published before
    /// this call are not replayed.
    pub async fn subscribe(
        &self,
        audit_id: Uuid,
    ) -> (SubscriberId, UnboundedReceiver<ProgressUpdate>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .await
            .entry(audit_id)
            .or_default()
            .push((id, tx));
        debug!("Observer {:?} subscribed to audit {}", id, audit_id);
        (id, rx)
    }

    pub async fn unsubscribe(&self, audit_id: Uuid, subscriber_id: SubscriberId) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(list) = subscribers.get_mut(&audit_id) {
            list.retain(|(id, _)| *id != subscriber_id);
            if list.is_empty() {
                subscribers.remove(&audit_id);
            }
        }
    }

    /// Deliver an update to every current observer of its audit id.
    /// Closed channels are dropped from the list as they are found.
    pub async fn publish(&self, update: ProgressUpdate) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(list) = subscribers.get_mut(&update.audit_id) {
            list.retain(|(_, tx)| tx.send(update.clone()).is_ok());
            if list.is_empty() {
                subscribers.remove(&update.audit_id);
            }
        }
    }

    /// Drop all observers of a finished audit.
    pub async fn close_audit(&self, audit_id: Uuid) {
        self.subscribers.write().await.remove(&audit_id);
    }

    pub async fn subscriber_count(&self, audit_id: Uuid) -> usize {
        self.subscribers
            .read()
            .await
            .get(&audit_id)
            .map_or(0, |l| l.len())
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::AuditPhase;

    fn update(audit_id: Uuid, progress: u8) -> ProgressUpdate {
        ProgressUpdate::new(audit_id, AuditPhase::Gathering, progress, "collecting")
    }

    #[tokio::test]
    async fn test_fan_out_to_multiple_observers() {
        let broadcaster = ProgressBroadcaster::new();
        let audit_id = Uuid::new_v4();
        let (_a, mut rx_a) = broadcaster.subscribe(audit_id).await;
        let (_b, mut rx_b) = broadcaster.subscribe(audit_id).await;

        broadcaster.publish(update(audit_id, 20)).await;

        assert_eq!(rx_a.recv().await.unwrap().progress, 20);
        assert_eq!(rx_b.recv().await.unwrap().progress, 20);
    }

    #[tokio::test]
    async fn test_updates_scoped_to_audit_id() {
        let broadcaster = ProgressBroadcaster::new();
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (_id, mut rx) = broadcaster.subscribe(watched).await;

        broadcaster.publish(update(other, 40)).await;
        broadcaster.publish(update(watched, 20)).await;

        // Only the watched audit's update arrives
        assert_eq!(rx.recv().await.unwrap().audit_id, watched);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_observer_is_pruned_on_publish() {
        let broadcaster = ProgressBroadcaster::new();
        let audit_id = Uuid::new_v4();
        let (_a, rx_a) = broadcaster.subscribe(audit_id).await;
        let (_b, mut rx_b) = broadcaster.subscribe(audit_id).await;
        drop(rx_a);

        broadcaster.publish(update(audit_id, 40)).await;

        assert_eq!(broadcaster.subscriber_count(audit_id).await, 1);
        assert_eq!(rx_b.recv().await.unwrap().progress, 40);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let broadcaster = ProgressBroadcaster::new();
        let audit_id = Uuid::new_v4();
        let (id, mut rx) = broadcaster.subscribe(audit_id).await;

        broadcaster.unsubscribe(audit_id, id).await;
        broadcaster.publish(update(audit_id, 60)).await;

        // Channel closed by unsubscribe, nothing delivered
        assert!(rx.recv().await.is_none());
        assert_eq!(broadcaster.subscriber_count(audit_id).await, 0);
    }

    #[tokio::test]
    async fn test_watching_a_finished_audit_leaves_no_entry() {
        let broadcaster = ProgressBroadcaster::new();
        let audit_id = Uuid::new_v4();

        // The audit finishes and drops its observers
        let (_early, _rx) = broadcaster.subscribe(audit_id).await;
        broadcaster.close_audit(audit_id).await;
        assert_eq!(broadcaster.subscriber_count(audit_id).await, 0);

        // A late watcher subscribes, sees the terminal state, and
        // unsubscribes; no dead sender may remain behind
        let (late, mut rx) = broadcaster.subscribe(audit_id).await;
        broadcaster.unsubscribe(audit_id, late).await;
        assert_eq!(broadcaster.subscriber_count(audit_id).await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_observers_is_noop() {
        let broadcaster = ProgressBroadcaster::new();
        broadcaster.publish(update(Uuid::new_v4(), 80)).await;
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use printdash_core::CombinedPayload;
use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Live receiving end handed to one connected viewer.
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<Arc<CombinedPayload>>,
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose queue was full; they miss this tick only.
    pub skipped: usize,
    /// Subscribers whose receiver is gone; removed from the live set.
    pub dropped: usize,
}

/// Fan-out of combined payloads to every connected subscriber.
///
/// Delivery never waits on a subscriber: each has a small bounded queue and
/// a full queue just misses the current tick.
pub struct Hub {
    buffer: usize,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Arc<CombinedPayload>>>>,
    latest: Mutex<Option<Arc<CombinedPayload>>>,
}

impl Hub {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscribers: Mutex::new(HashMap::new()),
            latest: Mutex::new(None),
        }
    }

    /// Registers a subscriber, primed with the latest payload if any.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        // Holding the subscriber lock keeps a concurrent broadcast from
        // landing between priming and insertion.
        let mut subs = self.subscribers.lock().await;
        if let Some(latest) = self.latest.lock().await.clone() {
            let _ = tx.try_send(latest);
        }
        let id = Uuid::new_v4();
        subs.insert(id, tx);
        tracing::info!(subscriber = %id, live = subs.len(), "subscriber connected");
        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subs = self.subscribers.lock().await;
        if subs.remove(&id).is_some() {
            tracing::info!(subscriber = %id, live = subs.len(), "subscriber disconnected");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Last payload handed to [`Hub::broadcast`].
    pub async fn latest(&self) -> Option<Arc<CombinedPayload>> {
        self.latest.lock().await.clone()
    }

    /// Pushes `payload` to every live subscriber; dead ones are removed.
    pub async fn broadcast(&self, payload: CombinedPayload) -> BroadcastReport {
        let payload = Arc::new(payload);
        let mut subs = self.subscribers.lock().await;
        *self.latest.lock().await = Some(Arc::clone(&payload));

        let mut report = BroadcastReport::default();
        subs.retain(|id, tx| match tx.try_send(Arc::clone(&payload)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(subscriber = %id, "subscriber lagging; skipped this tick");
                report.skipped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::info!(subscriber = %id, "subscriber gone; dropping");
                report.dropped += 1;
                false
            }
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printdash_core::{Snapshot, SourceKey};

    fn payload(cpu: f64) -> CombinedPayload {
        CombinedPayload::assemble(
            &SourceKey::layout(["a"]),
            vec![(SourceKey::system(), Snapshot::new().with("cpu", cpu))],
        )
    }

    #[tokio::test]
    async fn delivers_to_every_live_subscriber() {
        let hub = Hub::new(4);
        let mut a = hub.subscribe().await;
        let mut b = hub.subscribe().await;

        let report = hub.broadcast(payload(1.0)).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(*a.rx.recv().await.unwrap(), payload(1.0));
        assert_eq!(*b.rx.recv().await.unwrap(), payload(1.0));
    }

    #[tokio::test]
    async fn broken_subscriber_is_dropped_without_affecting_others() {
        let hub = Hub::new(4);
        let mut alive = hub.subscribe().await;
        let dead = hub.subscribe().await;
        drop(dead.rx);

        let report = hub.broadcast(payload(2.0)).await;

        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                skipped: 0,
                dropped: 1
            }
        );
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(*alive.rx.recv().await.unwrap(), payload(2.0));
    }

    #[tokio::test]
    async fn full_subscriber_is_skipped_not_dropped() {
        let hub = Hub::new(1);
        let mut slow = hub.subscribe().await;

        hub.broadcast(payload(1.0)).await;
        let report = hub.broadcast(payload(2.0)).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(*slow.rx.recv().await.unwrap(), payload(1.0));

        hub.broadcast(payload(3.0)).await;
        assert_eq!(*slow.rx.recv().await.unwrap(), payload(3.0));
    }

    #[tokio::test]
    async fn new_subscriber_receives_latest_payload() {
        let hub = Hub::new(2);
        assert!(hub.latest().await.is_none());
        hub.broadcast(payload(7.0)).await;

        let mut late = hub.subscribe().await;

        assert_eq!(*late.rx.recv().await.unwrap(), payload(7.0));
        assert_eq!(hub.latest().await.as_deref(), Some(&payload(7.0)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn subscribing_during_broadcasts_never_duplicates_a_payload() {
        let hub = Arc::new(Hub::new(64));
        let rounds = 40;

        let broadcaster = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for i in 1..=rounds {
                    hub.broadcast(payload(i as f64)).await;
                    tokio::task::yield_now().await;
                }
            })
        };
        let mut subs = Vec::new();
        for _ in 0..rounds {
            subs.push(hub.subscribe().await);
            tokio::task::yield_now().await;
        }
        broadcaster.await.unwrap();

        for mut sub in subs {
            let mut seen = Vec::new();
            while let Ok(p) = sub.rx.try_recv() {
                seen.push(p);
            }
            for pair in seen.windows(2) {
                assert_ne!(pair[0], pair[1], "payload delivered twice");
            }
            if let Some(last) = seen.last() {
                assert_eq!(**last, payload(rounds as f64));
            }
        }
    }

    #[tokio::test]
    async fn unsubscribe_removes_subscriber() {
        let hub = Hub::new(2);
        let sub = hub.subscribe().await;
        hub.unsubscribe(sub.id).await;
        assert_eq!(hub.subscriber_count().await, 0);
        assert_eq!(hub.broadcast(payload(1.0)).await, BroadcastReport::default());
    }
}

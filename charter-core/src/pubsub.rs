use async_trait::async_trait;
use charter_shared::DomainEvent;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::CoreResult;

/// Delivery key. Ordering is only guaranteed within one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Chat thread of one customer
    Chat(Uuid),
    /// Transitions and payment settlements of one booking
    Booking(Uuid),
    /// Notifications of one user
    Notifications(Uuid),
}

impl Topic {
    pub fn key(&self) -> String {
        match self {
            Topic::Chat(id) => format!("chat:{}", id),
            Topic::Booking(id) => format!("booking:{}", id),
            Topic::Notifications(id) => format!("notifications:{}", id),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Publish/subscribe port.
///
/// Contract: at-least-once delivery to every subscriber that is alive at
/// publish time, in publish order per topic. A subscriber going away never
/// affects the others.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: Topic, event: DomainEvent) -> CoreResult<()>;

    async fn subscribe(&self, topic: Topic) -> CoreResult<Subscription>;
}

/// A live stream of events for one topic. Dropping it unsubscribes.
pub struct Subscription {
    topic: Topic,
    rx: mpsc::UnboundedReceiver<DomainEvent>,
}

impl Subscription {
    pub fn new(topic: Topic, rx: mpsc::UnboundedReceiver<DomainEvent>) -> Self {
        Self { topic, rx }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next event, or `None` once the bus side has shut down.
    pub async fn next(&mut self) -> Option<DomainEvent> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<DomainEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Single-process bus. Each subscriber owns its own unbounded queue, so a
/// slow or departed subscriber cannot drop events queued for another one.
#[derive(Default)]
pub struct InProcessBus {
    subscribers: Mutex<HashMap<Topic, Vec<mpsc::UnboundedSender<DomainEvent>>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on a topic; closed ones are not counted.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        let subscribers = self.subscribers.lock().await;
        subscribers
            .get(&topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn publish(&self, topic: Topic, event: DomainEvent) -> CoreResult<()> {
        let mut subscribers = self.subscribers.lock().await;

        if let Some(senders) = subscribers.get_mut(&topic) {
            let before = senders.len();
            senders.retain(|tx| tx.send(event.clone()).is_ok());

            let pruned = before - senders.len();
            if pruned > 0 {
                tracing::debug!("Pruned {} closed subscriber(s) from {}", pruned, topic);
            }
            if senders.is_empty() {
                subscribers.remove(&topic);
            }
        }

        Ok(())
    }

    async fn subscribe(&self, topic: Topic) -> CoreResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .await
            .entry(topic)
            .or_default()
            .push(tx);
        Ok(Subscription::new(topic, rx))
    }
}

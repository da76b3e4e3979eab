// Real-Time Broadcast Hub
//
// Publish/subscribe fan-out of state deltas to every connected observer.
// One broadcast channel per topic: delivery order per connection matches
// publish order within a topic, no ordering is guaranteed across topics.
// Per-connection send queues are independent; a slow consumer observes
// `Lagged` after the bounded backlog and is disconnected by the transport
// instead of ever stalling a publisher.

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{HostEvent, Topic};

pub struct BroadcastHub {
    jobs_tx: broadcast::Sender<HostEvent>,
    queue_tx: broadcast::Sender<HostEvent>,
}

impl BroadcastHub {
    /// Create a hub with the given per-topic backlog capacity
    pub fn new(capacity: usize) -> Self {
        let (jobs_tx, _) = broadcast::channel(capacity);
        let (queue_tx, _) = broadcast::channel(capacity);
        Self { jobs_tx, queue_tx }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<HostEvent> {
        match topic {
            Topic::Jobs => &self.jobs_tx,
            Topic::Queue => &self.queue_tx,
        }
    }

    /// Publish an event to every subscriber of its topic
    ///
    /// Never blocks and never fails: with no subscribers the event is
    /// simply dropped.
    pub fn publish(&self, event: HostEvent) {
        let topic = event.topic();
        match self.sender(topic).send(event) {
            Ok(count) => debug!(topic = %topic, subscribers = count, "Event published"),
            Err(_) => debug!(topic = %topic, "Event dropped, no subscribers"),
        }
    }

    /// Open a subscription to one topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<HostEvent> {
        self.sender(topic).subscribe()
    }

    /// Current number of subscribers on a topic
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }
}

//! Fan-out of world events to participants and observers.

use std::collections::BTreeMap;

use tandem_protocol::{ClientId, ServerEvent};
use tokio::sync::mpsc;
use tracing::debug;

use crate::ReplicatedTransform;

/// Channel the world pushes events into for one subscriber.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Who is listening.
///
/// Participants are keyed by their client id so they can be detached on
/// disconnect; observers (tests, tooling) get a number of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubscriberKey {
    Participant(ClientId),
    Observer(u64),
}

/// Every subscriber, in a stable order.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: BTreeMap<SubscriberKey, EventSender>,
    next_observer: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a fresh observer key.
    pub fn next_observer_key(&mut self) -> SubscriberKey {
        let key = SubscriberKey::Observer(self.next_observer);
        self.next_observer += 1;
        key
    }

    /// Adds or replaces a subscriber. Does not touch transforms; see
    /// [`EventBus::subscribe_transform`].
    pub fn attach(&mut self, key: SubscriberKey, sender: EventSender) {
        if self.subscribers.insert(key, sender).is_some() {
            debug!(subscriber = ?key, "event subscriber replaced");
        }
    }

    pub fn detach(&mut self, key: SubscriberKey) -> bool {
        self.subscribers.remove(&key).is_some()
    }

    pub fn sender(&self, key: SubscriberKey) -> Option<&EventSender> {
        self.subscribers.get(&key)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Hooks every current subscriber up to a freshly spawned transform.
    pub fn subscribe_transform(&self, transform: &mut ReplicatedTransform) {
        for (key, sender) in &self.subscribers {
            transform.subscribe(*key, Box::new(sender.clone()));
        }
    }

    /// Sends `event` to every subscriber. Subscribers whose channel has
    /// closed are dropped.
    pub fn publish(&mut self, event: ServerEvent) {
        self.subscribers.retain(|key, sender| {
            let alive = sender.send(event.clone()).is_ok();
            if !alive {
                debug!(subscriber = ?key, "dropping closed event subscriber");
            }
            alive
        });
    }

    /// Sends `event` to one subscriber only.
    pub fn send_to(&self, key: SubscriberKey, event: ServerEvent) -> bool {
        self.subscribers
            .get(&key)
            .is_some_and(|sender| sender.send(event).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use tandem_protocol::EntityId;

    use super::*;

    fn camera_event() -> ServerEvent {
        ServerEvent::CameraMoved {
            position: Vec3::new(0.0, 2.0, -10.0),
        }
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut bus = EventBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.attach(SubscriberKey::Participant(ClientId::HOST), tx_a);
        let observer = bus.next_observer_key();
        bus.attach(observer, tx_b);

        bus.publish(camera_event());

        assert_eq!(rx_a.try_recv().unwrap(), camera_event());
        assert_eq!(rx_b.try_recv().unwrap(), camera_event());
    }

    #[test]
    fn test_publish_prunes_closed_subscribers() {
        let mut bus = EventBus::new();
        let (tx, rx) = mpsc::unbounded_channel();
        bus.attach(SubscriberKey::Participant(ClientId(7)), tx);
        drop(rx);

        bus.publish(camera_event());

        assert!(bus.is_empty());
    }

    #[test]
    fn test_send_to_targets_single_subscriber() {
        let mut bus = EventBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.attach(SubscriberKey::Participant(ClientId(1)), tx_a);
        bus.attach(SubscriberKey::Participant(ClientId(2)), tx_b);

        assert!(bus.send_to(SubscriberKey::Participant(ClientId(2)), camera_event()));

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), camera_event());
    }

    #[test]
    fn test_subscribe_transform_registers_all_subscribers() {
        let mut bus = EventBus::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        bus.attach(SubscriberKey::Participant(ClientId(1)), tx_a);
        bus.attach(SubscriberKey::Observer(0), tx_b);
        let mut transform = ReplicatedTransform::authority(EntityId(1), Vec3::ZERO);

        bus.subscribe_transform(&mut transform);

        assert_eq!(transform.observer_count(), 2);
    }

    #[test]
    fn test_observer_keys_are_unique() {
        let mut bus = EventBus::new();
        assert_ne!(bus.next_observer_key(), bus.next_observer_key());
    }
}

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, ResourceType};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast fan-out of applied events, one channel per resource type.
/// The engine publishes after every applied event; refused operations
/// publish nothing.
pub struct ChangeFeed {
    channels: DashMap<ResourceType, broadcast::Sender<Event>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self { channels: DashMap::new() }
    }

    /// Subscribe to one resource type's events. Creates the channel if needed.
    pub fn subscribe(&self, resource_type: ResourceType) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(resource_type)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish an applied event. No-op if nobody is listening.
    pub fn publish(&self, resource_type: ResourceType, event: &Event) {
        if let Some(sender) = self.channels.get(&resource_type) {
            let _ = sender.send(event.clone());
        }
    }
}

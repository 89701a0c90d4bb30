//! Event bus implementation.
//!
//! The bus is an ordinary value: construct one, wrap it in an `Arc`, and hand
//! it to every component that broadcasts. Independent instances never share
//! subscribers. Nothing is retained after delivery; an observer that attaches
//! late reads current values from `ServerState` instead of replaying events.

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{AppEvent, EventCategory};

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.simple().to_string()[..8])
    }
}

/// Which events a handler wants
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Every event.
    #[default]
    All,
    /// Events in any of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Whether `event` passes the filter
    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type EventHandler = Box<dyn Fn(AppEvent) + Send + Sync>;

/// Event bus tuning
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Events buffered per async receiver before the slowest one lags.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Event bus errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventBusError {
    /// Neither a handler nor a receiver is attached
    #[error("No active subscribers")]
    NoSubscribers,
}

/// Fan-out of engine events to observers
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
    handlers: RwLock<HashMap<SubscriptionId, (EventFilter, EventHandler)>>,
    config: EventBusConfig,
}

impl EventBus {
    /// Bus with the default channel capacity
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Bus with explicit tuning
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Deliver `event` to matching handlers, then to every async receiver
    ///
    /// Returns the number of receivers reached, or `NoSubscribers` when
    /// nobody at all is listening.
    pub fn publish(&self, event: AppEvent) -> Result<usize, EventBusError> {
        let handlers = self.handlers.read();
        for (filter, handler) in handlers.values() {
            if filter.matches(&event) {
                handler(event.clone());
            }
        }

        match self.sender.send(event) {
            Ok(count) => Ok(count),
            Err(_) if handlers.is_empty() => Err(EventBusError::NoSubscribers),
            Err(_) => Ok(0),
        }
    }

    /// Publish without caring whether anyone is listening
    pub fn emit(&self, event: AppEvent) {
        tracing::trace!("emit {}", event.description());
        let _ = self.publish(event);
    }

    /// Attach a synchronous handler
    ///
    /// The handler runs on the publishing task and must return quickly.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Box::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Receiver for consuming events from an async task
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Detach a handler; false when the id is unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Attached synchronous handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Bus tuning
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::events::{JogEvent, MachineEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tool_changing(changing: bool) -> AppEvent {
        AppEvent::Machine(MachineEvent::ToolChangingChanged { changing })
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let id = bus.subscribe(EventFilter::All, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(), 1);
        bus.emit(tool_changing(true));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(tool_changing(false));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert!(matches!(
            bus.publish(tool_changing(true)),
            Err(EventBusError::NoSubscribers)
        ));
        // emit swallows the same condition
        bus.emit(tool_changing(false));

        let _handler = bus.subscribe(EventFilter::All, |_| {});
        assert!(matches!(bus.publish(tool_changing(true)), Ok(0)));
    }

    #[test]
    fn test_event_filtering() {
        let bus = EventBus::new();
        let machine_count = Arc::new(AtomicUsize::new(0));
        let jog_count = Arc::new(AtomicUsize::new(0));

        let mc = machine_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Machine]),
            move |_| {
                mc.fetch_add(1, Ordering::SeqCst);
            },
        );
        let jc = jog_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Jog]),
            move |_| {
                jc.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.emit(tool_changing(true));
        bus.emit(AppEvent::Jog(JogEvent::Stopped {
            id: "j1".to_string(),
            reason: "client-stop".to_string(),
        }));
        bus.emit(tool_changing(false));

        assert_eq!(machine_count.load(Ordering::SeqCst), 2);
        assert_eq!(jog_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_receiver() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        assert_eq!(bus.publish(tool_changing(true)).ok(), Some(1));
        assert_eq!(receiver.recv().await.unwrap(), tool_changing(true));
    }
}

// Event Bus Implementation - Pub/Sub for Cycle Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Lets the CLI, runners and observers follow cycles without touching the
// cycle lock.
//
// In-memory only: events are lost on restart and dropped for receivers that
// fall more than `capacity` events behind.

use crate::domain::cycle::LoopId;
use crate::domain::events::CycleEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to cycle events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<CycleEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers. Never blocks.
    pub fn publish(&self, event: CycleEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all cycle events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single loop instance
    /// Useful when several loops share one bus
    pub fn subscribe_loop(&self, loop_id: LoopId) -> LoopEventReceiver {
        LoopEventReceiver {
            receiver: self.sender.subscribe(),
            loop_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all cycle events
pub struct EventReceiver {
    receiver: broadcast::Receiver<CycleEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<CycleEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<CycleEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one loop instance
pub struct LoopEventReceiver {
    receiver: broadcast::Receiver<CycleEvent>,
    loop_id: LoopId,
}

impl LoopEventReceiver {
    /// Receive the next event for the subscribed loop
    /// Events from other loops are skipped
    pub async fn recv(&mut self) -> Result<CycleEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.loop_id() == self.loop_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn started(loop_id: LoopId, cycle_id: u64) -> CycleEvent {
        CycleEvent::CycleStarted {
            loop_id,
            cycle_id,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let loop_id = LoopId::new();

        event_bus.publish(started(loop_id, 1));

        match receiver.recv().await.unwrap() {
            CycleEvent::CycleStarted { loop_id: id, cycle_id, .. } => {
                assert_eq!(id, loop_id);
                assert_eq!(cycle_id, 1);
            }
            _ => panic!("Wrong event type received"),
        }
    }

    #[tokio::test]
    async fn test_loop_event_filtering() {
        let event_bus = EventBus::new(10);
        let loop_id = LoopId::new();
        let other_loop_id = LoopId::new();

        let mut receiver = event_bus.subscribe_loop(loop_id);

        event_bus.publish(started(other_loop_id, 1));
        event_bus.publish(started(loop_id, 2));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.loop_id(), loop_id);
        assert_eq!(received.cycle_id(), Some(2));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(CycleEvent::MetricsReset {
            loop_id: LoopId::new(),
            reset_at: Utc::now(),
        });

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_dropped_events() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();
        let loop_id = LoopId::new();

        for cycle_id in 1..=5 {
            event_bus.publish(started(loop_id, cycle_id));
        }

        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(3))));
        assert_eq!(receiver.try_recv().unwrap().cycle_id(), Some(4));
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::default();
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}

//! Broadcast notifier for queue events
//!
//! Delivery is best effort: no acknowledgment, no persistence of missed
//! events, no per-recipient targeting. Observers filter by company code or
//! OTP on their side. Publishing never blocks the triggering request.

use crate::error::Result;
use crate::types::{CounterStatusChange, CustomerTurn, QueueEvent};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// Trait for publishing queue events
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish a counter activation/deactivation event
    async fn counter_status_changed(&self, event: CounterStatusChange) -> Result<()>;

    /// Publish a "your turn" event
    async fn customer_turn(&self, event: CustomerTurn) -> Result<()>;
}

/// Notifier backed by a tokio broadcast channel
///
/// Each connected observer holds a receiver; slow observers lag and drop
/// events rather than applying backpressure to the sender.
pub struct ChannelNotifier {
    sender: broadcast::Sender<QueueEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe a new observer to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    /// Number of currently connected observers
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: QueueEvent) {
        // send only fails when nobody is listening, which is fine
        match self.sender.send(event) {
            Ok(observers) => debug!("Event delivered to {} observers", observers),
            Err(_) => debug!("Event dropped, no connected observers"),
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn counter_status_changed(&self, event: CounterStatusChange) -> Result<()> {
        self.publish(QueueEvent::CounterStatusChange(event));
        Ok(())
    }

    async fn customer_turn(&self, event: CustomerTurn) -> Result<()> {
        self.publish(QueueEvent::CustomerTurn(event));
        Ok(())
    }
}

/// Mock notifier for testing
#[derive(Debug, Default)]
pub struct MockNotifier {
    events: std::sync::Mutex<Vec<QueueEvent>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events (for testing)
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published customer-turn events only (for testing)
    pub fn turn_events(&self) -> Vec<CustomerTurn> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                QueueEvent::CustomerTurn(turn) => Some(turn),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded events (for testing)
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn counter_status_changed(&self, event: CounterStatusChange) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(QueueEvent::CounterStatusChange(event));
        }
        Ok(())
    }

    async fn customer_turn(&self, event: CustomerTurn) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(QueueEvent::CustomerTurn(event));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_event() -> CustomerTurn {
        CustomerTurn {
            otp: "123456".to_string(),
            counter_number: 1,
            company_code: "ABCDEF".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_observers_is_ok() {
        let notifier = ChannelNotifier::new(16);
        assert_eq!(notifier.observer_count(), 0);
        notifier.customer_turn(turn_event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_all_observers_receive_events() {
        let notifier = ChannelNotifier::new(16);
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        notifier
            .counter_status_changed(CounterStatusChange {
                counter_id: uuid::Uuid::new_v4(),
                is_active: false,
                company_code: "ABCDEF".to_string(),
            })
            .await
            .unwrap();
        notifier.customer_turn(turn_event()).await.unwrap();

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(
                rx.recv().await.unwrap(),
                QueueEvent::CounterStatusChange(_)
            ));
            assert!(matches!(
                rx.recv().await.unwrap(),
                QueueEvent::CustomerTurn(_)
            ));
        }
    }

    #[tokio::test]
    async fn test_mock_notifier_records_events() {
        let notifier = MockNotifier::new();
        notifier.customer_turn(turn_event()).await.unwrap();

        let turns = notifier.turn_events();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].otp, "123456");

        notifier.clear();
        assert!(notifier.events().is_empty());
    }
}

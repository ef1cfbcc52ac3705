//! Push notifications from the trainer to any number of subscribers

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::stats::StatusSnapshot;

/// A log line pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl LogEntry {
    /// Stamp a message with the current time
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Trainer notification
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Status(StatusSnapshot),
    Log(LogEntry),
}

/// Fan-out of notifications.
///
/// Sending never blocks; a subscriber that falls more than the channel
/// capacity behind loses the oldest messages.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn status(&self, snapshot: StatusSnapshot) {
        self.publish(Notification::Status(snapshot));
    }

    pub fn log(&self, message: impl Into<String>) {
        self.publish(Notification::Log(LogEntry::now(message)));
    }

    fn publish(&self, notification: Notification) {
        // No subscribers is not an error
        if self.sender.send(notification).is_err() {
            trace!("notification dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out() {
        let notifier = Notifier::new(8);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.log("hello");
        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                Notification::Log(entry) => assert_eq!(entry.message, "hello"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_oldest() {
        let notifier = Notifier::new(2);
        let mut rx = notifier.subscribe();
        for i in 0..5 {
            notifier.log(format!("line {i}"));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        match rx.recv().await.unwrap() {
            Notification::Log(entry) => assert_eq!(entry.message, "line 3"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_send_without_subscribers() {
        Notifier::new(4).log("nobody listening");
    }
}

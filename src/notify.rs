//! Live notification fan-out to connected dashboard viewers.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

/// Event pushed to every `/ws` subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum Notification {
    Status { connected: bool, message: String },
    Qr { payload: String },
}

/// Broadcast-only publish/subscribe channel.
///
/// Subscribers see events published after they subscribe; there is no replay
/// and slow subscribers skip what they missed.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        // Err only means nobody is listening.
        if self.tx.send(notification).is_err() {
            trace!("notification dropped: no subscribers");
        }
    }

    pub fn status(&self, connected: bool, message: impl Into<String>) {
        self.publish(Notification::Status {
            connected,
            message: message.into(),
        });
    }

    pub fn qr(&self, payload: impl Into<String>) {
        self.publish(Notification::Qr {
            payload: payload.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let notifier = Notifier::new();
        notifier.status(false, "nobody home");
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let notifier = Notifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.qr("2@code");
        notifier.status(true, "WhatsApp connected");

        for rx in [&mut a, &mut b] {
            assert_eq!(
                rx.recv().await.unwrap(),
                Notification::Qr {
                    payload: "2@code".into()
                }
            );
            assert!(matches!(
                rx.recv().await.unwrap(),
                Notification::Status {
                    connected: true,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_history() {
        let notifier = Notifier::new();
        let _keepalive = notifier.subscribe();
        notifier.status(false, "before");

        let mut late = notifier.subscribe();
        notifier.status(true, "after");
        match late.recv().await.unwrap() {
            Notification::Status { message, .. } => assert_eq!(message, "after"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wire_format() {
        let status = serde_json::to_value(Notification::Status {
            connected: false,
            message: "Logged out".into(),
        })
        .unwrap();
        assert_eq!(status["event"], "status");
        assert_eq!(status["data"]["connected"], false);
        assert_eq!(status["data"]["message"], "Logged out");

        let qr = serde_json::to_value(Notification::Qr {
            payload: "2@x".into(),
        })
        .unwrap();
        assert_eq!(qr["event"], "qr");
        assert_eq!(qr["data"]["payload"], "2@x");
    }
}

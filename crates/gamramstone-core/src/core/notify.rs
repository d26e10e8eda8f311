//! Notification Surface
//!
//! The core decides what to tell the user and with which kind; rendering is
//! left to whatever implements [`Notifier`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info};

use super::NoticeId;

/// Default capacity of the broadcast channel
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Kind of a transient message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    /// Stays visible until dismissed
    Loading,
}

/// A transient user-facing message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NoticeId,
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    pub fn loading(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Loading, message)
    }
}

/// Sink for user-facing messages
pub trait Notifier: Send + Sync {
    /// Shows a message
    fn notify(&self, notification: Notification);

    /// Removes a message, typically a `Loading` one
    fn dismiss(&self, id: &str);

    /// Decorative celebration after a confirmed apply
    fn celebrate(&self) {}
}

// =============================================================================
// Broadcast Notifier
// =============================================================================

/// Event published by [`BroadcastNotifier`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum NotifierEvent {
    Shown(Notification),
    Dismissed { id: NoticeId },
    Celebrated,
}

/// Publishes notifications to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<NotifierEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifierEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: NotifierEvent) {
        // No subscribers is not an error; the message is simply unseen.
        let _ = self.sender.send(event);
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        self.publish(NotifierEvent::Shown(notification));
    }

    fn dismiss(&self, id: &str) {
        self.publish(NotifierEvent::Dismissed { id: id.to_string() });
    }

    fn celebrate(&self) {
        self.publish(NotifierEvent::Celebrated);
    }
}

// =============================================================================
// Tracing Notifier
// =============================================================================

/// Writes notifications to the log; used by headless frontends
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => error!(id = %notification.id, "{}", notification.message),
            _ => info!(
                id = %notification.id,
                kind = ?notification.kind,
                "{}",
                notification.message
            ),
        }
    }

    fn dismiss(&self, _id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_ids_are_unique() {
        let a = Notification::success("a");
        let b = Notification::success("a");
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn test_broadcast_notifier_publishes_in_order() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe();

        let loading = Notification::loading("Uploading...");
        let loading_id = loading.id.clone();
        notifier.notify(loading);
        notifier.dismiss(&loading_id);
        notifier.celebrate();

        assert!(matches!(
            rx.recv().await.unwrap(),
            NotifierEvent::Shown(n) if n.kind == NotificationKind::Loading
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            NotifierEvent::Dismissed { id: loading_id }
        );
        assert_eq!(rx.recv().await.unwrap(), NotifierEvent::Celebrated);
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_panic() {
        let notifier = BroadcastNotifier::new();
        notifier.notify(Notification::error("nobody listens"));
    }
}

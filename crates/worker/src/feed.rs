//! Latest polled notification state, published to subscribers.

use desk_core::NotificationList;
use tokio::sync::watch;

/// Unread badge and notification list as last polled.
pub struct NotificationFeed {
    unread: watch::Sender<u64>,
    notifications: watch::Sender<Option<NotificationList>>,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self {
            unread: watch::channel(0).0,
            notifications: watch::channel(None).0,
        }
    }

    pub fn subscribe_unread(&self) -> watch::Receiver<u64> {
        self.unread.subscribe()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<Option<NotificationList>> {
        self.notifications.subscribe()
    }

    pub fn unread(&self) -> u64 {
        *self.unread.borrow()
    }

    /// Publish a new unread count; subscribers only wake on change.
    pub fn publish_unread(&self, count: u64) {
        self.unread.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
    }

    pub fn publish_notifications(&self, list: NotificationList) {
        let unread = list.unread_count;
        self.notifications.send_replace(Some(list));
        self.publish_unread(unread);
    }

    /// Forget everything (logout).
    pub fn reset(&self) {
        self.publish_unread(0);
        self.notifications.send_replace(None);
    }
}

use serde::{Deserialize, Serialize};

use crate::{
    events::LifecycleEvent,
    model::{BasicNotification, NotificationAction, NotificationId},
};

/// Payload handed to the host notification center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeNotification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub close_button_text: String,
    pub actions: Vec<NotificationAction>,
}

impl From<&BasicNotification> for NativeNotification {
    fn from(notification: &BasicNotification) -> Self {
        Self {
            id: notification.id(),
            title: notification.title.clone(),
            body: notification.message.clone(),
            close_button_text: notification.close_button_text.clone(),
            actions: notification.actions.clone(),
        }
    }
}

/// Platform-specific notification adapters will implement this trait.
///
/// `present` must not block on user interaction; closed/action responses are
/// reported later as [`crate::events::HostEvent`]s carrying the same id.
pub trait NativeNotifier: Send + Sync {
    fn present(&self, notification: NativeNotification) -> anyhow::Result<()>;
}

/// Receiver of lifecycle transitions (the UI side of the application).
pub trait DisplayTarget: Send + Sync {
    fn deliver(&self, event: &LifecycleEvent) -> anyhow::Result<()>;
}

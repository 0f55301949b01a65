use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::{BasicNotification, NotificationId};

/// Transition reported to the display target once a shown notification was
/// closed or acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "notification")]
pub enum LifecycleEvent {
    #[serde(rename = "notification-started")]
    Started(BasicNotification),
    #[serde(rename = "notification-ended")]
    Ended(BasicNotification),
    #[serde(rename = "notification-skipped")]
    Skipped(BasicNotification),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Started(_) => "notification-started",
            LifecycleEvent::Ended(_) => "notification-ended",
            LifecycleEvent::Skipped(_) => "notification-skipped",
        }
    }

    pub fn notification(&self) -> &BasicNotification {
        match self {
            LifecycleEvent::Started(n) | LifecycleEvent::Ended(n) | LifecycleEvent::Skipped(n) => n,
        }
    }
}

/// Response from the host notification center for a presented notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HostEvent {
    Closed { id: NotificationId },
    ActionInvoked { id: NotificationId, index: usize },
}

impl HostEvent {
    pub fn id(&self) -> NotificationId {
        match self {
            HostEvent::Closed { id } | HostEvent::ActionInvoked { id, .. } => *id,
        }
    }

    pub fn signal(&self) -> &'static str {
        match self {
            HostEvent::Closed { .. } => "closed",
            HostEvent::ActionInvoked { .. } => "action",
        }
    }
}

/// Sending half of the host event channel. Cheap to clone and usable from
/// plain OS threads.
#[derive(Debug, Clone)]
pub struct HostEventSender {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostEventSender {
    /// Returns `false` once the scheduler has shut down.
    pub fn send(&self, event: HostEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(id = %event.id(), signal = event.signal(), "host event dropped after shutdown");
                false
            }
        }
    }
}

pub type HostEventReceiver = mpsc::UnboundedReceiver<HostEvent>;

pub fn host_channel() -> (HostEventSender, HostEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HostEventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationKind;
    use chrono::Utc;

    #[test]
    fn lifecycle_event_uses_wire_names() {
        let n = BasicNotification::new(NotificationKind::Start, "Run", "Start Run now", "Start Run", Utc::now());
        let event = LifecycleEvent::Skipped(n.clone());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "notification-skipped");
        assert_eq!(value["notification"]["title"], "Run");
        assert_eq!(event.name(), "notification-skipped");
        assert_eq!(event.notification().id(), n.id());
    }

    #[test]
    fn sender_reports_closed_channel() {
        let (tx, rx) = host_channel();
        let id = NotificationId::from(7);
        assert!(tx.send(HostEvent::Closed { id }));
        drop(rx);
        assert!(!tx.send(HostEvent::ActionInvoked { id, index: 0 }));
    }
}

use anyhow::{Context, Result};
use notify_rust::{Notification, Timeout};
use remind_core::{HostEvent, HostEventSender, NativeNotification, NativeNotifier, NotificationId};

/// Action key XDG servers report when the notification body is clicked.
const DEFAULT_ACTION: &str = "default";
/// Pseudo action notify-rust reports once the notification is closed.
const CLOSED_ACTION: &str = "__closed";

/// Presents notifications through the desktop notification center and
/// reports the user's response as [`HostEvent`]s.
pub struct DesktopNotifier {
    app_name: String,
    #[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
    host_events: HostEventSender,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>, host_events: HostEventSender) -> Self {
        Self {
            app_name: app_name.into(),
            host_events,
        }
    }

    fn build(&self, notification: &NativeNotification) -> Notification {
        let mut builder = Notification::new();
        builder
            .appname(&self.app_name)
            .summary(&notification.title)
            .body(&notification.body)
            .timeout(Timeout::Never);
        for (index, action) in notification.actions.iter().enumerate() {
            builder.action(&index.to_string(), &action.text);
        }
        if !notification.close_button_text.is_empty() {
            builder.action(DEFAULT_ACTION, &notification.close_button_text);
        }
        builder
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn show(&self, builder: Notification, id: NotificationId) -> Result<()> {
        spawn_response_thread(id, self.host_events.clone(), move |host_events| {
            let handle = builder.show()?;
            handle.wait_for_action(|action| match host_event_for_action(id, action) {
                Some(event) => {
                    host_events.send(event);
                }
                None => tracing::debug!(%id, action, "ignoring notification action"),
            });
            Ok(())
        })
    }

    // No response callbacks outside XDG; the notification is fire-and-forget.
    #[cfg(not(all(unix, not(target_os = "macos"))))]
    fn show(&self, builder: Notification, id: NotificationId) -> Result<()> {
        builder
            .show()
            .with_context(|| format!("failed to show notification {id}"))?;
        Ok(())
    }
}

impl NativeNotifier for DesktopNotifier {
    fn present(&self, notification: NativeNotification) -> Result<()> {
        let builder = self.build(&notification);
        self.show(builder, notification.id)
    }
}

/// Show and wait on a dedicated thread so presenting never blocks the
/// scheduler. The thread owns the native handle and ends once the
/// notification server reports an action or a close.
#[cfg(all(unix, not(target_os = "macos")))]
fn spawn_response_thread<F>(id: NotificationId, host_events: HostEventSender, show: F) -> Result<()>
where
    F: FnOnce(HostEventSender) -> Result<()> + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("notification-{}", id.get()))
        .spawn(move || {
            if let Err(err) = show(host_events) {
                tracing::error!(%id, error = ?err, "failed to show notification");
            }
        })
        .context("failed to spawn notification response thread")?;
    Ok(())
}

/// Map a notify-rust action key back to the engine's host event. Action
/// buttons are keyed by their index.
pub fn host_event_for_action(id: NotificationId, action: &str) -> Option<HostEvent> {
    match action {
        CLOSED_ACTION | DEFAULT_ACTION => Some(HostEvent::Closed { id }),
        other => other
            .parse::<usize>()
            .ok()
            .map(|index| HostEvent::ActionInvoked { id, index }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_actions_to_host_events() {
        let id = NotificationId::from(3);
        assert_eq!(host_event_for_action(id, "__closed"), Some(HostEvent::Closed { id }));
        assert_eq!(host_event_for_action(id, "default"), Some(HostEvent::Closed { id }));
        assert_eq!(
            host_event_for_action(id, "0"),
            Some(HostEvent::ActionInvoked { id, index: 0 })
        );
        assert_eq!(host_event_for_action(id, "__timeout"), None);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn response_thread_does_not_block_the_caller() {
        let (host_tx, mut host_rx) = remind_core::host_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let id = NotificationId::from(9);

        spawn_response_thread(id, host_tx, move |host_events| {
            release_rx.recv()?;
            host_events.send(HostEvent::Closed { id });
            Ok(())
        })
        .unwrap();

        assert!(host_rx.try_recv().is_err());
        release_tx.send(()).unwrap();
        assert_eq!(host_rx.blocking_recv(), Some(HostEvent::Closed { id }));
    }
}

use std::collections::{hash_map::Entry, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{EngineError, Result},
    events::HostEvent,
    model::{BasicNotification, NotificationId, NotificationKind},
    notifications::{NativeNotification, NativeNotifier},
};

/// Lifecycle transition a host signal resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartCompletion,
    EndCompletion,
    Skip,
}

/// Response handling registered for one presented notification.
///
/// The snapshot is the notification as it was when presented; it stands in
/// for the pending entry if the host replaced the batch in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRoute {
    pub on_closed: Transition,
    pub on_action: Option<Transition>,
    pub snapshot: BasicNotification,
}

impl ResponseRoute {
    pub fn for_notification(notification: &BasicNotification) -> Self {
        let (on_closed, on_action) = match notification.kind {
            NotificationKind::Start => (Transition::StartCompletion, Some(Transition::Skip)),
            NotificationKind::End => (Transition::EndCompletion, None),
        };
        Self {
            on_closed,
            on_action,
            snapshot: notification.clone(),
        }
    }

    fn transition_for(&self, event: &HostEvent) -> Option<Transition> {
        match event {
            HostEvent::Closed { .. } => Some(self.on_closed),
            HostEvent::ActionInvoked { .. } => self.on_action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShownNotification {
    pub id: NotificationId,
    pub title: String,
    pub shown_at: DateTime<Utc>,
}

pub struct Dispatcher {
    notifier: Arc<dyn NativeNotifier>,
    routes: HashMap<NotificationId, ResponseRoute>,
    shown: Vec<ShownNotification>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn NativeNotifier>) -> Self {
        Self {
            notifier,
            routes: HashMap::new(),
            shown: Vec::new(),
        }
    }

    /// Present a due notification. `shown` flips before presentation and
    /// stays set even if the notifier fails. Returns `false` when the
    /// notification had already been shown and nothing was presented.
    pub fn dispatch(&mut self, notification: &mut BasicNotification, now: DateTime<Utc>) -> Result<bool> {
        let id = notification.id();
        if !notification.mark_shown() {
            warn!(%id, "notification already shown, not dispatching again");
            return Ok(false);
        }

        let payload = NativeNotification::from(&*notification);
        self.routes
            .insert(id, ResponseRoute::for_notification(notification));

        info!(%id, kind = %notification.kind, title = %notification.title, "presenting native notification");
        if let Err(source) = self.notifier.present(payload) {
            self.routes.remove(&id);
            return Err(EngineError::Present { id, source });
        }

        self.shown.push(ShownNotification {
            id,
            title: notification.title.clone(),
            shown_at: now,
        });
        Ok(true)
    }

    /// Consume the route for `event`. A signal the notification was not
    /// wired for leaves the route in place.
    pub fn resolve(&mut self, event: &HostEvent) -> Result<(Transition, BasicNotification)> {
        let id = event.id();
        if let Entry::Occupied(entry) = self.routes.entry(id) {
            if let Some(transition) = entry.get().transition_for(event) {
                debug!(%id, ?transition, "resolved host event");
                return Ok((transition, entry.remove().snapshot));
            }
        }
        Err(EngineError::Unrouted {
            id,
            signal: event.signal(),
        })
    }

    pub fn route(&self, id: NotificationId) -> Option<&ResponseRoute> {
        self.routes.get(&id)
    }

    pub fn shown(&self) -> &[ShownNotification] {
        &self.shown
    }

    /// Drop shown records for notifications that were compacted away.
    pub fn forget(&mut self, ids: &HashSet<NotificationId>) {
        self.shown.retain(|record| !ids.contains(&record.id));
    }

    pub fn clear(&mut self) {
        self.routes.clear();
        self.shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationAction;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        presented: Mutex<Vec<NativeNotification>>,
        fail: bool,
    }

    impl NativeNotifier for RecordingNotifier {
        fn present(&self, notification: NativeNotification) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("notification center unavailable"));
            }
            self.presented.lock().push(notification);
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 20, 9, 0, 0).unwrap()
    }

    fn start() -> BasicNotification {
        BasicNotification::new(NotificationKind::Start, "Run", "Start Run now", "Start Run", now())
            .with_duration(30)
            .with_actions(vec![NotificationAction::skip()])
    }

    #[test]
    fn dispatch_presents_once_and_registers_routes() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut dispatcher = Dispatcher::new(notifier.clone());
        let mut n = start();

        assert!(dispatcher.dispatch(&mut n, now()).unwrap());
        assert!(!dispatcher.dispatch(&mut n, now()).unwrap());

        assert!(n.is_shown());
        let presented = notifier.presented.lock();
        assert_eq!(presented.len(), 1);
        assert_eq!(presented[0].body, "Start Run now");
        assert_eq!(presented[0].close_button_text, "Start Run");
        assert_eq!(presented[0].actions, vec![NotificationAction::skip()]);

        let route = dispatcher.route(n.id()).unwrap();
        assert_eq!(route.on_closed, Transition::StartCompletion);
        assert_eq!(route.on_action, Some(Transition::Skip));
        assert_eq!(dispatcher.shown().len(), 1);
    }

    #[test]
    fn end_notifications_have_no_action_route() {
        let mut dispatcher = Dispatcher::new(Arc::new(RecordingNotifier::default()));
        let mut end = start().end_counterpart(now());
        dispatcher.dispatch(&mut end, now()).unwrap();

        let id = end.id();
        let err = dispatcher
            .resolve(&HostEvent::ActionInvoked { id, index: 0 })
            .unwrap_err();
        assert!(matches!(err, EngineError::Unrouted { signal: "action", .. }));

        let (transition, snapshot) = dispatcher.resolve(&HostEvent::Closed { id }).unwrap();
        assert_eq!(transition, Transition::EndCompletion);
        assert_eq!(snapshot.id(), id);
        assert!(dispatcher.resolve(&HostEvent::Closed { id }).is_err());
    }

    #[test]
    fn failed_presentation_keeps_shown_flag_and_drops_route() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let mut dispatcher = Dispatcher::new(notifier);
        let mut n = start();

        let err = dispatcher.dispatch(&mut n, now()).unwrap_err();
        assert!(matches!(err, EngineError::Present { id, .. } if id == n.id()));
        assert!(n.is_shown());
        assert!(dispatcher.route(n.id()).is_none());
        assert!(dispatcher.shown().is_empty());
    }
}

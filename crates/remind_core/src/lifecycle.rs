use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    dispatcher::Transition,
    error::{EngineError, Result},
    events::LifecycleEvent,
    model::{BasicNotification, LifecycleStage},
    notifications::DisplayTarget,
};

/// Result of applying a transition to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub event: LifecycleEvent,
    pub follow_up: Option<BasicNotification>,
}

/// Record the stage for `transition` on `notification` and derive what
/// follows from it.
pub fn apply_transition(
    transition: Transition,
    notification: &mut BasicNotification,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    match transition {
        Transition::StartCompletion => {
            notification.record(LifecycleStage::Started, now)?;
            let end = notification.end_counterpart(now);
            Ok(Outcome {
                event: LifecycleEvent::Started(notification.clone()),
                follow_up: Some(end),
            })
        }
        Transition::EndCompletion => {
            notification.record(LifecycleStage::Ended, now)?;
            Ok(Outcome {
                event: LifecycleEvent::Ended(notification.clone()),
                follow_up: None,
            })
        }
        // The paired end notification, if any, is left pending.
        Transition::Skip => {
            notification.record(LifecycleStage::Skipped, now)?;
            Ok(Outcome {
                event: LifecycleEvent::Skipped(notification.clone()),
                follow_up: None,
            })
        }
    }
}

#[derive(Default)]
pub struct LifecycleController {
    target: Option<Arc<dyn DisplayTarget>>,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target(&mut self, target: Arc<dyn DisplayTarget>) {
        self.target = Some(target);
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Apply `transition` to the pending entry matching `snapshot`, or to the
    /// snapshot itself when the batch was replaced after presentation.
    pub fn handle(
        &self,
        transition: Transition,
        snapshot: BasicNotification,
        pending: &mut Vec<BasicNotification>,
        now: DateTime<Utc>,
    ) -> Result<LifecycleEvent> {
        let target = self
            .target
            .as_ref()
            .ok_or(EngineError::DisplayTargetMissing)?;

        let id = snapshot.id();
        let outcome = match pending.iter_mut().find(|n| n.id() == id) {
            Some(notification) => apply_transition(transition, notification, now)?,
            None => {
                let mut detached = snapshot;
                apply_transition(transition, &mut detached, now)?
            }
        };

        if let Some(end) = outcome.follow_up {
            info!(
                %id,
                end_id = %end.id(),
                scheduled_at = %end.scheduled_at(),
                "scheduled end notification"
            );
            pending.push(end);
        }

        let event = outcome.event;
        info!(%id, event = event.name(), "delivering lifecycle event");
        target
            .deliver(&event)
            .map_err(|source| EngineError::Deliver {
                event: event.name(),
                source,
            })?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationAction, NotificationKind};
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTarget {
        events: Mutex<Vec<LifecycleEvent>>,
    }

    impl DisplayTarget for RecordingTarget {
        fn deliver(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
            self.events.lock().push(event.clone());
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
    fn start_completion_stamps_and_derives_end() {
        let mut n = start();
        let outcome = apply_transition(Transition::StartCompletion, &mut n, now()).unwrap();
        assert_eq!(n.started_at(), Some(now()));
        let end = outcome.follow_up.unwrap();
        assert_eq!(end.kind, NotificationKind::End);
        assert_eq!(end.scheduled_at(), now() + Duration::minutes(30));
        assert!(matches!(outcome.event, LifecycleEvent::Started(ref e) if e.started_at() == Some(now())));
    }

    #[test]
    fn skip_sets_only_skipped_at() {
        let mut n = start();
        let outcome = apply_transition(Transition::Skip, &mut n, now()).unwrap();
        assert_eq!(n.skipped_at(), Some(now()));
        assert!(n.started_at().is_none());
        assert!(outcome.follow_up.is_none());
        assert_eq!(outcome.event.name(), "notification-skipped");
    }

    #[test]
    fn handle_requires_display_target() {
        let controller = LifecycleController::new();
        let mut pending = vec![start()];
        let snapshot = pending[0].clone();
        let err = controller
            .handle(Transition::StartCompletion, snapshot, &mut pending, now())
            .unwrap_err();
        assert!(matches!(err, EngineError::DisplayTargetMissing));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn handle_falls_back_to_snapshot_for_replaced_batches() {
        let target = Arc::new(RecordingTarget::default());
        let mut controller = LifecycleController::new();
        controller.set_target(target.clone());

        let snapshot = start();
        let mut pending = Vec::new();
        controller
            .handle(Transition::StartCompletion, snapshot.clone(), &mut pending, now())
            .unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::End);
        let events = target.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].notification().id(), snapshot.id());
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use remind_core::{
    BasicNotification, DisplayTarget, EngineConfig, HostEvent, LifecycleEvent, NativeNotification,
    NativeNotifier, NotificationAction, NotificationEngine, NotificationKind,
};

#[derive(Default)]
struct Desk {
    presented: Mutex<Vec<NativeNotification>>,
    events: Mutex<Vec<LifecycleEvent>>,
}

impl NativeNotifier for Desk {
    fn present(&self, notification: NativeNotification) -> anyhow::Result<()> {
        self.presented.lock().push(notification);
        Ok(())
    }
}

impl DisplayTarget for Desk {
    fn deliver(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 7, 18, 0, 0).unwrap()
}

fn run_at(at: DateTime<Utc>) -> BasicNotification {
    BasicNotification::new(NotificationKind::Start, "Run", "Start Run now", "Start Run", at)
        .with_occurrence("run-2025-11-07")
        .with_duration(30)
        .with_actions(vec![NotificationAction::skip()])
}

fn engine(desk: &Arc<Desk>) -> NotificationEngine {
    let mut engine = NotificationEngine::new(EngineConfig::default(), desk.clone());
    engine.set_display_target(desk.clone());
    engine
}

#[test]
fn start_then_end_full_cycle() {
    let desk = Arc::new(Desk::default());
    let mut engine = engine(&desk);
    let start = run_at(now());
    let start_id = start.id();
    engine.set_pending(vec![start]).unwrap();

    assert_eq!(engine.tick(now()).dispatched, 1);
    assert!(engine.pending()[0].is_shown());

    let started = engine
        .handle_host_event(HostEvent::Closed { id: start_id }, now())
        .unwrap();
    assert_eq!(started.name(), "notification-started");
    assert_eq!(started.notification().started_at(), Some(now()));

    let pending = engine.pending();
    assert_eq!(pending.len(), 2);
    let end = &pending[1];
    assert_eq!(end.kind, NotificationKind::End);
    assert_eq!(end.scheduled_at(), now() + Duration::minutes(30));
    let end_id = end.id();

    // Nothing else fires in between.
    assert_eq!(engine.tick(now() + Duration::minutes(10)).dispatched, 0);

    let later = now() + Duration::minutes(30);
    assert_eq!(engine.tick(later).dispatched, 1);
    assert_eq!(desk.presented.lock()[1].body, "End Run now");

    let ended = engine
        .handle_host_event(HostEvent::Closed { id: end_id }, later)
        .unwrap();
    assert_eq!(ended.notification().ended_at(), Some(later));

    let events = desk.events.lock();
    let names: Vec<_> = events.iter().map(LifecycleEvent::name).collect();
    assert_eq!(names, vec!["notification-started", "notification-ended"]);
    assert_eq!(engine.pending().len(), 2);
}

#[test]
fn notification_ten_seconds_late_never_fires() {
    let desk = Arc::new(Desk::default());
    let mut engine = engine(&desk);
    engine
        .set_pending(vec![run_at(now() - Duration::seconds(10))])
        .unwrap();

    for second in 0..120 {
        assert_eq!(engine.tick(now() + Duration::seconds(second)).dispatched, 0);
    }
    assert!(desk.presented.lock().is_empty());
    assert!(!engine.pending()[0].is_shown());
}

#[test]
fn skip_action_stamps_skipped_and_leaves_started_unset() {
    let desk = Arc::new(Desk::default());
    let mut engine = engine(&desk);
    let start = run_at(now());
    let id = start.id();
    engine.set_pending(vec![start]).unwrap();
    engine.tick(now() + Duration::seconds(1));

    let skipped = engine
        .handle_host_event(HostEvent::ActionInvoked { id, index: 0 }, now())
        .unwrap();
    assert_eq!(skipped.name(), "notification-skipped");
    let n = &engine.pending()[0];
    assert_eq!(n.skipped_at(), Some(now()));
    assert!(n.started_at().is_none());
    assert_eq!(engine.pending().len(), 1);
    assert_eq!(desk.events.lock().len(), 1);
}

#[test]
fn fresh_batch_replaces_pending_but_open_notifications_still_respond() {
    let desk = Arc::new(Desk::default());
    let mut engine = engine(&desk);
    let start = run_at(now());
    let id = start.id();
    engine.set_pending(vec![start]).unwrap();
    engine.tick(now());

    let tomorrow = run_at(now() + Duration::days(1));
    engine.set_pending(vec![tomorrow]).unwrap();
    engine
        .handle_host_event(HostEvent::Closed { id }, now())
        .unwrap();

    let pending = engine.pending();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].scheduled_at(), now() + Duration::days(1));
    assert_eq!(pending[1].kind, NotificationKind::End);
    assert_eq!(desk.events.lock()[0].notification().id(), id);
}

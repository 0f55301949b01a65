use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::{CompactionPolicy, EngineConfig},
    dispatcher::{Dispatcher, ShownNotification},
    error::{EngineError, Result},
    events::{HostEvent, LifecycleEvent},
    lifecycle::LifecycleController,
    model::{BasicNotification, NotificationKind},
    notifications::{DisplayTarget, NativeNotifier},
    selector,
};

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: usize,
    pub failed: usize,
    pub compacted: usize,
}

/// Session-scoped owner of the pending collection, the shown list and the
/// response routes. Created on login, reset on logout.
///
/// Every method expects to be called from one thread of control; the
/// scheduler task is the usual owner.
pub struct NotificationEngine {
    config: EngineConfig,
    pending: Vec<BasicNotification>,
    dispatcher: Dispatcher,
    lifecycle: LifecycleController,
    /// Occurrences whose start was dispatched. Survives compaction and
    /// batch replacement so a re-read batch never offers them again.
    dispatched_occurrences: HashSet<String>,
    running: bool,
}

impl NotificationEngine {
    pub fn new(config: EngineConfig, notifier: Arc<dyn NativeNotifier>) -> Self {
        Self {
            config,
            pending: Vec::new(),
            dispatcher: Dispatcher::new(notifier),
            lifecycle: LifecycleController::new(),
            dispatched_occurrences: HashSet::new(),
            running: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_display_target(&mut self, target: Arc<dyn DisplayTarget>) {
        debug!("display target registered");
        self.lifecycle.set_target(target);
    }

    pub fn has_display_target(&self) -> bool {
        self.lifecycle.has_target()
    }

    /// Replace the pending collection wholesale. Starts ticking when the
    /// batch is non-empty. Only the first entry for each id is kept.
    #[instrument(skip_all, fields(count = notifications.len()))]
    pub fn set_pending(&mut self, notifications: Vec<BasicNotification>) -> Result<()> {
        if !self.has_display_target() {
            error!("notifications were set before a display target was registered");
            return Err(EngineError::DisplayTargetMissing);
        }
        info!("replacing pending notifications");
        let mut seen = HashSet::new();
        self.pending = notifications
            .into_iter()
            .filter(|n| {
                let first = seen.insert(n.id());
                if !first {
                    warn!(id = %n.id(), "dropping duplicate notification id");
                }
                first
            })
            .collect();
        if !self.pending.is_empty() {
            self.start();
        }
        Ok(())
    }

    /// Replace the pending collection with a re-read batch. Starts for
    /// occurrences that were already dispatched are dropped, and end
    /// notifications still waiting to fire are carried over.
    #[instrument(skip_all, fields(count = fresh.len()))]
    pub fn merge_pending(&mut self, fresh: Vec<BasicNotification>) -> Result<()> {
        let mut batch: Vec<BasicNotification> = fresh
            .into_iter()
            .filter(|n| !self.was_dispatched(n))
            .collect();
        batch.extend(
            self.pending
                .iter()
                .filter(|n| n.kind == NotificationKind::End && !n.is_shown())
                .cloned(),
        );
        debug!(count = batch.len(), "merged notification batch");
        self.set_pending(batch)
    }

    /// Forget which occurrences were dispatched; call when a new day's
    /// batch starts.
    pub fn clear_dispatched_occurrences(&mut self) {
        debug!(count = self.dispatched_occurrences.len(), "clearing dispatched occurrences");
        self.dispatched_occurrences.clear();
    }

    fn was_dispatched(&self, notification: &BasicNotification) -> bool {
        notification.kind == NotificationKind::Start
            && notification
                .occurrence_id
                .as_ref()
                .is_some_and(|id| self.dispatched_occurrences.contains(id))
    }

    /// Returns `true` if the engine was not already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        info!("notification ticks started");
        self.running = true;
        true
    }

    /// Stops future ticks. Pending state and routes of shown notifications
    /// are kept.
    pub fn stop(&mut self) {
        if self.running {
            info!("notification ticks stopped");
        }
        self.running = false;
    }

    /// Stop and forget everything except the display target.
    pub fn reset(&mut self) {
        self.stop();
        self.pending.clear();
        self.dispatcher.clear();
        self.dispatched_occurrences.clear();
        info!("notification engine reset");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pending(&self) -> &[BasicNotification] {
        &self.pending
    }

    pub fn shown(&self) -> &[ShownNotification] {
        self.dispatcher.shown()
    }

    pub fn next_scheduled(&self, now: DateTime<Utc>) -> Option<&BasicNotification> {
        selector::next_scheduled(&self.pending, now)
    }

    /// Dispatch every due notification. Failures are logged per
    /// notification and do not stop the rest of the tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        if !self.running {
            return report;
        }

        match self.next_scheduled(now) {
            Some(next) => debug!(id = %next.id(), scheduled_at = %next.scheduled_at(), "next notification scheduled"),
            None => debug!("no notification scheduled"),
        }

        let window = self.config.due_window();
        for id in selector::due_notifications(&self.pending, now, &window) {
            let Some(notification) = self.pending.iter_mut().find(|n| n.id() == id) else {
                continue;
            };
            if notification.kind == NotificationKind::Start {
                if let Some(occurrence) = &notification.occurrence_id {
                    self.dispatched_occurrences.insert(occurrence.clone());
                }
            }
            match self.dispatcher.dispatch(notification, now) {
                Ok(true) => report.dispatched += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(%id, error = %err, "failed to dispatch notification");
                    report.failed += 1;
                }
            }
        }

        report.compacted = self.compact(now);
        report
    }

    /// Route a closed/action signal from the host notification center.
    #[instrument(skip(self), fields(id = %event.id(), signal = event.signal()))]
    pub fn handle_host_event(&mut self, event: HostEvent, now: DateTime<Utc>) -> Result<LifecycleEvent> {
        let (transition, snapshot) = self.dispatcher.resolve(&event)?;
        if let HostEvent::ActionInvoked { index, .. } = event {
            let label = snapshot.actions.get(index).map(|a| a.text.as_str());
            info!(index, action = ?label, "action received from notification");
        }
        let result = self
            .lifecycle
            .handle(transition, snapshot, &mut self.pending, now);
        self.compact(now);
        result
    }

    /// Apply the compaction policy; returns how many notifications were dropped.
    pub fn compact(&mut self, now: DateTime<Utc>) -> usize {
        if self.config.compaction == CompactionPolicy::Keep {
            return 0;
        }
        let window = self.config.due_window();
        let mut dropped = HashSet::new();
        self.pending.retain(|n| {
            let settled = n.is_settled();
            let missed = window.is_missed(n, now);
            if settled || missed {
                if missed {
                    warn!(id = %n.id(), scheduled_at = %n.scheduled_at(), "dropping missed notification");
                }
                dropped.insert(n.id());
                return false;
            }
            true
        });
        if !dropped.is_empty() {
            self.dispatcher.forget(&dropped);
            debug!(count = dropped.len(), "compacted notifications");
        }
        dropped.len()
    }
}

//! Pure due-detection over the pending collection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{BasicNotification, NotificationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuePolicy {
    /// Due only while `now` is within the tolerance on either side of the
    /// scheduled time. A notification missed by more than that never fires.
    #[default]
    Window,
    /// Due once the scheduled time is within tolerance or already passed.
    CatchUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub tolerance: Duration,
    pub policy: DuePolicy,
}

impl DueWindow {
    pub fn contains(&self, scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let delta = now.signed_duration_since(scheduled_at);
        match self.policy {
            DuePolicy::Window => delta.abs() <= self.tolerance,
            DuePolicy::CatchUp => delta >= -self.tolerance,
        }
    }

    pub fn is_due(&self, notification: &BasicNotification, now: DateTime<Utc>) -> bool {
        !notification.is_shown() && self.contains(notification.scheduled_at(), now)
    }

    /// An unshown notification that can never become due again.
    pub fn is_missed(&self, notification: &BasicNotification, now: DateTime<Utc>) -> bool {
        match self.policy {
            DuePolicy::Window => {
                !notification.is_shown()
                    && now.signed_duration_since(notification.scheduled_at()) > self.tolerance
            }
            DuePolicy::CatchUp => false,
        }
    }
}

/// Ids of the due notifications, in pending order.
pub fn due_notifications(
    pending: &[BasicNotification],
    now: DateTime<Utc>,
    window: &DueWindow,
) -> Vec<NotificationId> {
    pending
        .iter()
        .filter(|notification| window.is_due(notification, now))
        .map(BasicNotification::id)
        .collect()
}

/// Soonest notification scheduled at or after `now`; ties go to the first one.
pub fn next_scheduled(pending: &[BasicNotification], now: DateTime<Utc>) -> Option<&BasicNotification> {
    pending
        .iter()
        .filter(|notification| notification.scheduled_at() >= now)
        .min_by_key(|notification| notification.scheduled_at())
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

static NEXT_NOTIFICATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`BasicNotification`]. Host events carry it
/// back to the engine so response handling never needs a captured closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(u64);

impl NotificationId {
    pub fn next() -> Self {
        Self(NEXT_NOTIFICATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for NotificationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Start,
    End,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Start => "start",
            NotificationKind::End => "end",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Button,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
}

impl NotificationAction {
    pub fn button(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ActionKind::Button,
        }
    }

    pub fn skip() -> Self {
        Self::button("Skip")
    }
}

/// Which phase of an occurrence a notification has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Started,
    Ended,
    Skipped,
}

/// One schedulable notification together with its lifecycle timestamps.
///
/// `scheduled_at`, `shown` and the stamps are private: the dispatcher flips
/// `shown` and the lifecycle controller records exactly one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicNotification {
    id: NotificationId,
    pub occurrence_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub close_button_text: String,
    scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub actions: Vec<NotificationAction>,
    shown: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    skipped_at: Option<DateTime<Utc>>,
}

impl BasicNotification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        close_button_text: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::next(),
            occurrence_id: None,
            kind,
            title: title.into(),
            message: message.into(),
            close_button_text: close_button_text.into(),
            scheduled_at,
            duration_minutes: None,
            actions: Vec::new(),
            shown: false,
            started_at: None,
            ended_at: None,
            skipped_at: None,
        }
    }

    pub fn with_occurrence(mut self, occurrence_id: impl Into<String>) -> Self {
        self.occurrence_id = Some(occurrence_id.into());
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_actions(mut self, actions: Vec<NotificationAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn skipped_at(&self) -> Option<DateTime<Utc>> {
        self.skipped_at
    }

    pub fn stage(&self) -> Option<LifecycleStage> {
        if self.started_at.is_some() {
            Some(LifecycleStage::Started)
        } else if self.ended_at.is_some() {
            Some(LifecycleStage::Ended)
        } else if self.skipped_at.is_some() {
            Some(LifecycleStage::Skipped)
        } else {
            None
        }
    }

    pub fn is_settled(&self) -> bool {
        self.stage().is_some()
    }

    /// The paired end reminder for a start notification fired at `started_at`.
    pub fn end_counterpart(&self, started_at: DateTime<Utc>) -> BasicNotification {
        let minutes = i64::from(self.duration_minutes.unwrap_or(0));
        let mut end = BasicNotification::new(
            NotificationKind::End,
            self.title.clone(),
            format!("End {} now", self.title),
            "End",
            started_at + Duration::minutes(minutes),
        );
        end.occurrence_id = self.occurrence_id.clone();
        end
    }

    /// Returns `false` when the notification had already been shown.
    pub(crate) fn mark_shown(&mut self) -> bool {
        if self.shown {
            return false;
        }
        self.shown = true;
        true
    }

    pub(crate) fn record(&mut self, stage: LifecycleStage, at: DateTime<Utc>) -> Result<()> {
        if self.is_settled() {
            return Err(EngineError::AlreadySettled(self.id));
        }
        match stage {
            LifecycleStage::Started => self.started_at = Some(at),
            LifecycleStage::Ended => self.ended_at = Some(at),
            LifecycleStage::Skipped => self.skipped_at = Some(at),
        }
        Ok(())
    }
}

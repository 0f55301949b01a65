use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{BasicNotification, NotificationAction, NotificationKind};

/// A scheduled instance of a habit, as handed over by whatever fetched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub skippable: bool,
}

impl Occurrence {
    pub fn to_notification(&self) -> BasicNotification {
        let actions = if self.skippable {
            vec![NotificationAction::skip()]
        } else {
            Vec::new()
        };
        let mut notification = BasicNotification::new(
            NotificationKind::Start,
            self.title.clone(),
            format!("Start {} now", self.title),
            format!("Start {}", self.title),
            self.scheduled_at,
        )
        .with_occurrence(self.id.clone())
        .with_actions(actions);
        notification.duration_minutes = self.duration_minutes;
        notification
    }
}

pub fn notifications_from_occurrences(occurrences: &[Occurrence]) -> Vec<BasicNotification> {
    occurrences.iter().map(Occurrence::to_notification).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn skippable_occurrence_gets_skip_action() {
        let occurrence: Occurrence = serde_json::from_str(
            r#"{"id": "occ-7", "title": "Meditate", "scheduledAt": "2025-10-20T07:30:00Z",
                "durationMinutes": 10, "skippable": true}"#,
        )
        .unwrap();
        let n = occurrence.to_notification();
        assert_eq!(n.kind, NotificationKind::Start);
        assert_eq!(n.message, "Start Meditate now");
        assert_eq!(n.close_button_text, "Start Meditate");
        assert_eq!(n.scheduled_at(), Utc.with_ymd_and_hms(2025, 10, 20, 7, 30, 0).unwrap());
        assert_eq!(n.duration_minutes, Some(10));
        assert_eq!(n.occurrence_id.as_deref(), Some("occ-7"));
        assert_eq!(n.actions, vec![NotificationAction::skip()]);
    }

    #[test]
    fn batch_preserves_order_and_omits_skip_when_not_skippable() {
        let at = Utc.with_ymd_and_hms(2025, 10, 20, 8, 0, 0).unwrap();
        let occurrences = vec![
            Occurrence {
                id: "a".into(),
                title: "Walk".into(),
                scheduled_at: at,
                duration_minutes: None,
                skippable: false,
            },
            Occurrence {
                id: "b".into(),
                title: "Read".into(),
                scheduled_at: at,
                duration_minutes: Some(20),
                skippable: true,
            },
        ];
        let batch = notifications_from_occurrences(&occurrences);
        assert_eq!(batch.len(), 2);
        assert!(batch[0].actions.is_empty());
        assert_eq!(batch[1].title, "Read");
        assert_ne!(batch[0].id(), batch[1].id());
    }
}

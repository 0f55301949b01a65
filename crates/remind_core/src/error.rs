//! Engine error types.

use thiserror::Error;

use crate::model::NotificationId;

/// Errors raised by the notification engine. None of them are fatal: the
/// scheduler logs them and keeps ticking.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Notifications were pushed before a display target was registered.
    #[error("notifications were set before a display target was registered")]
    DisplayTargetMissing,

    /// A host event arrived for a notification with no matching response route.
    #[error("no {signal} route for notification {id}")]
    Unrouted {
        id: NotificationId,
        signal: &'static str,
    },

    /// A second lifecycle stage was recorded for the same notification.
    #[error("notification {0} already has a lifecycle stage recorded")]
    AlreadySettled(NotificationId),

    /// The native notifier refused the notification.
    #[error("failed to present notification {id}")]
    Present {
        id: NotificationId,
        #[source]
        source: anyhow::Error,
    },

    /// The display target rejected a lifecycle event.
    #[error("failed to deliver {event} to the display target")]
    Deliver {
        event: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The scheduler task has shut down.
    #[error("scheduler is no longer running")]
    Closed,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

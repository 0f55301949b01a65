//! Notification scheduling and lifecycle engine for habit reminders.

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod notifications;
pub mod occurrence;
pub mod scheduler;
pub mod selector;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{CompactionPolicy, EngineConfig};
pub use crate::engine::{NotificationEngine, TickReport};
pub use crate::error::EngineError;
pub use crate::events::{host_channel, HostEvent, HostEventSender, LifecycleEvent};
pub use crate::model::{BasicNotification, NotificationAction, NotificationId, NotificationKind};
pub use crate::notifications::{DisplayTarget, NativeNotification, NativeNotifier};
pub use crate::scheduler::{EngineSnapshot, Scheduler, SchedulerHandle};
pub use crate::selector::DuePolicy;

use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::selector::{DuePolicy, DueWindow};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_DUE_TOLERANCE_SECS: u32 = 2;

/// What happens to notifications that can no longer change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompactionPolicy {
    /// Keep every notification for the whole session.
    #[default]
    Keep,
    /// Drop settled notifications and ones whose due window has passed.
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_interval_ms: u64,
    pub due_tolerance_secs: u32,
    pub due_policy: DuePolicy,
    pub compaction: CompactionPolicy,
}

impl EngineConfig {
    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn due_window(&self) -> DueWindow {
        DueWindow {
            tolerance: Duration::seconds(i64::from(self.due_tolerance_secs)),
            policy: self.due_policy,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            due_tolerance_secs: DEFAULT_DUE_TOLERANCE_SECS,
            due_policy: DuePolicy::Window,
            compaction: CompactionPolicy::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"due_policy": "catch-up", "compaction": "settled"}"#).unwrap();
        assert_eq!(config.tick_interval(), StdDuration::from_secs(1));
        assert_eq!(config.due_window().tolerance, Duration::seconds(2));
        assert_eq!(config.due_policy, DuePolicy::CatchUp);
        assert_eq!(config.compaction, CompactionPolicy::Settled);
    }
}

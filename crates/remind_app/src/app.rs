use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use remind_core::{
    host_channel, occurrence::notifications_from_occurrences, CompactionPolicy, DuePolicy,
    EngineConfig, NotificationEngine, Scheduler, SchedulerHandle, SystemClock,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    bridge::JsonLinesBridge,
    desktop::DesktopNotifier,
    source::HabitSource,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) habit_roots: Vec<PathBuf>,
    pub(crate) engine: EngineConfig,
    pub(crate) default_time: NaiveTime,
    pub(crate) app_name: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Build the config from any variable lookup. Unparseable values are
    /// ignored and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup("REMIND_HABIT_ROOT") {
            config.push_root(PathBuf::from(root));
        }
        if let Some(list) = lookup("REMIND_HABIT_ROOTS") {
            for path in std::env::split_paths(&list) {
                config.push_root(path);
            }
        }
        if let Some(tick) = lookup("REMIND_TICK_MS") {
            if let Ok(value) = tick.trim().parse::<u64>() {
                if value > 0 {
                    config.engine.tick_interval_ms = value;
                }
            }
        }
        if let Some(tolerance) = lookup("REMIND_DUE_TOLERANCE_SECS") {
            if let Ok(value) = tolerance.trim().parse::<u32>() {
                config.engine.due_tolerance_secs = value;
            }
        }
        if let Some(policy) = lookup("REMIND_DUE_POLICY") {
            match policy.trim().to_ascii_lowercase().as_str() {
                "window" => config.engine.due_policy = DuePolicy::Window,
                "catch-up" | "catchup" => config.engine.due_policy = DuePolicy::CatchUp,
                other => warn!(value = other, "unknown REMIND_DUE_POLICY"),
            }
        }
        if let Some(compaction) = lookup("REMIND_COMPACTION") {
            match compaction.trim().to_ascii_lowercase().as_str() {
                "keep" => config.engine.compaction = CompactionPolicy::Keep,
                "settled" => config.engine.compaction = CompactionPolicy::Settled,
                other => warn!(value = other, "unknown REMIND_COMPACTION"),
            }
        }
        if let Some(time) = lookup("REMIND_DEFAULT_TIME") {
            if let Ok(value) = NaiveTime::parse_from_str(time.trim(), "%H:%M") {
                config.default_time = value;
            }
        }
        if let Some(name) = lookup("REMIND_APP_NAME") {
            if !name.trim().is_empty() {
                config.app_name = name.trim().to_string();
            }
        }
        config
    }

    pub(crate) fn push_root(&mut self, path: PathBuf) {
        if !self.habit_roots.contains(&path) {
            info!(path = %path.display(), "registering habit root");
            self.habit_roots.push(path);
        }
    }

    pub fn habit_roots(&self) -> &[PathBuf] {
        &self.habit_roots
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn default_time(&self) -> NaiveTime {
        self.default_time
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            habit_roots: Vec::new(),
            engine: EngineConfig::default(),
            default_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            app_name: "Remind".to_string(),
        }
    }
}

/// Run the desktop host until Ctrl-C: load habits, push today's batch, and
/// re-push whenever a habit file changes or the day rolls over.
pub async fn run(config: AppConfig) -> Result<()> {
    anyhow::ensure!(
        !config.habit_roots.is_empty(),
        "no habit roots configured; set REMIND_HABIT_ROOT or REMIND_HABIT_ROOTS"
    );

    let mut builder = HabitSource::builder();
    for root in &config.habit_roots {
        builder = builder.add_root(root);
    }
    let mut source = builder.build().context("failed to load habit files")?;

    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    source
        .watch(move || {
            let _ = reload_tx.send(());
        })
        .context("failed to watch habit roots")?;

    let (host_tx, host_rx) = host_channel();
    let notifier = Arc::new(DesktopNotifier::new(config.app_name.clone(), host_tx));
    let engine = NotificationEngine::new(config.engine.clone(), notifier);
    let scheduler = Scheduler::new(engine, Arc::new(SystemClock), host_rx).spawn();
    scheduler
        .set_display_target(Arc::new(JsonLinesBridge::stdout()))
        .await?;

    push_today(&source, &scheduler, &config, false).await;

    loop {
        let rollover = until_next_day(Local::now());
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(%err, "unable to listen for shutdown signal");
                }
                info!("shutting down");
                break;
            }
            Some(()) = reload_rx.recv() => {
                // Editors emit bursts of events per save.
                tokio::time::sleep(Duration::from_millis(200)).await;
                while reload_rx.try_recv().is_ok() {}
                if let Err(err) = source.reload_all() {
                    warn!(error = ?err, "failed to reload habit files");
                    continue;
                }
                push_today(&source, &scheduler, &config, false).await;
            }
            _ = tokio::time::sleep(rollover) => {
                info!("day rolled over");
                push_today(&source, &scheduler, &config, true).await;
            }
        }
    }

    scheduler.reset().await?;
    scheduler.shutdown().await?;
    Ok(())
}

/// Push today's occurrences. The merge with what is already pending runs
/// inside the scheduler task.
async fn push_today(source: &HabitSource, scheduler: &SchedulerHandle, config: &AppConfig, new_day: bool) {
    let today = Local::now().date_naive();
    let occurrences = source.occurrences_on(today, config.default_time);
    info!(%today, count = occurrences.len(), new_day, "pushing occurrences");

    let batch = notifications_from_occurrences(&occurrences);
    let result = if new_day {
        scheduler.start_new_day(batch).await
    } else {
        scheduler.merge_pending(batch).await
    };
    if let Err(err) = result {
        warn!(%err, "notifications were not scheduled");
    }
}

fn until_next_day(now: DateTime<Local>) -> Duration {
    let fallback = Duration::from_secs(60 * 60);
    let Some(tomorrow) = now.date_naive().checked_add_days(Days::new(1)) else {
        return fallback;
    };
    let Some(midnight) = Local
        .from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .earliest()
    else {
        return fallback;
    };
    (midnight - now).to_std().unwrap_or(fallback) + Duration::from_secs(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_config_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("REMIND_HABIT_ROOT", "/tmp/habits"),
            ("REMIND_TICK_MS", "250"),
            ("REMIND_DUE_TOLERANCE_SECS", "5"),
            ("REMIND_DUE_POLICY", "catch-up"),
            ("REMIND_COMPACTION", "settled"),
            ("REMIND_DEFAULT_TIME", "07:45"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.habit_roots(), &[PathBuf::from("/tmp/habits")]);
        assert_eq!(config.engine().tick_interval_ms, 250);
        assert_eq!(config.engine().due_tolerance_secs, 5);
        assert_eq!(config.engine().due_policy, DuePolicy::CatchUp);
        assert_eq!(config.engine().compaction, CompactionPolicy::Settled);
        assert_eq!(config.default_time(), NaiveTime::from_hms_opt(7, 45, 0).unwrap());
        assert_eq!(config.app_name(), "Remind");
    }

    #[test]
    fn bad_values_keep_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("REMIND_TICK_MS", "0"),
            ("REMIND_DUE_TOLERANCE_SECS", "-1"),
            ("REMIND_DUE_POLICY", "sometimes"),
            ("REMIND_DEFAULT_TIME", "late"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.engine(), &EngineConfig::default());
        assert!(config.habit_roots().is_empty());
        assert_eq!(config.default_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn rollover_is_within_a_day() {
        let wait = until_next_day(Local::now());
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(25 * 60 * 60));
    }
}

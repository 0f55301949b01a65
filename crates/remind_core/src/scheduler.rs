//! Tokio task that owns a [`NotificationEngine`] and drives it with a fixed
//! cadence tick, host events and commands from a [`SchedulerHandle`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    dispatcher::ShownNotification,
    engine::NotificationEngine,
    error::{EngineError, Result},
    events::HostEventReceiver,
    model::BasicNotification,
    notifications::DisplayTarget,
};

/// Copy of the engine state, for hosts and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub running: bool,
    pub pending: Vec<BasicNotification>,
    pub shown: Vec<ShownNotification>,
}

enum SchedulerCommand {
    SetDisplayTarget(Arc<dyn DisplayTarget>),
    SetPending(Vec<BasicNotification>, oneshot::Sender<Result<()>>),
    MergePending {
        notifications: Vec<BasicNotification>,
        new_day: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop,
    Reset,
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown,
}

/// Handle for interacting with a spawned scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub async fn set_display_target(&self, target: Arc<dyn DisplayTarget>) -> Result<()> {
        self.send(SchedulerCommand::SetDisplayTarget(target)).await
    }

    /// Replace the pending notifications; the error is also logged by the
    /// scheduler.
    pub async fn set_pending(&self, notifications: Vec<BasicNotification>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::SetPending(notifications, reply_tx))
            .await?;
        reply_rx.await.map_err(|_| EngineError::Closed)?
    }

    /// Merge a re-read batch against the live pending collection in one
    /// step; see [`NotificationEngine::merge_pending`].
    pub async fn merge_pending(&self, notifications: Vec<BasicNotification>) -> Result<()> {
        self.merge(notifications, false).await
    }

    /// Like [`merge_pending`](Self::merge_pending), but first forgets the
    /// previous day's dispatched occurrences.
    pub async fn start_new_day(&self, notifications: Vec<BasicNotification>) -> Result<()> {
        self.merge(notifications, true).await
    }

    async fn merge(&self, notifications: Vec<BasicNotification>, new_day: bool) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::MergePending {
            notifications,
            new_day,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::Closed)?
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(SchedulerCommand::Stop).await
    }

    /// Logout: stop ticking and drop all session state.
    pub async fn reset(&self) -> Result<()> {
        self.send(SchedulerCommand::Reset).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| EngineError::Closed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SchedulerCommand::Shutdown).await
    }

    async fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| EngineError::Closed)
    }
}

pub struct Scheduler {
    engine: NotificationEngine,
    clock: Arc<dyn Clock>,
    host_events: HostEventReceiver,
}

impl Scheduler {
    pub fn new(engine: NotificationEngine, clock: Arc<dyn Clock>, host_events: HostEventReceiver) -> Self {
        Self {
            engine,
            clock,
            host_events,
        }
    }

    /// Spawn the scheduler loop on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        tokio::spawn(self.run(command_rx));
        SchedulerHandle { command_tx }
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<SchedulerCommand>) {
        info!(
            tick_ms = self.engine.config().tick_interval_ms,
            "notification scheduler started"
        );
        let mut ticker = tokio::time::interval(self.engine.config().tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // Host events first so a command sent after an event sees its effect.
            tokio::select! {
                biased;
                Some(event) = self.host_events.recv() => {
                    let now = self.clock.now();
                    if let Err(err) = self.engine.handle_host_event(event, now) {
                        warn!(error = %err, "host event not handled");
                    }
                }
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                _ = ticker.tick(), if self.engine.is_running() => {
                    let now = self.clock.now();
                    let report = self.engine.tick(now);
                    if report.dispatched > 0 || report.failed > 0 {
                        debug!(?report, "tick finished");
                    }
                }
            }
        }

        info!("notification scheduler stopped");
    }

    /// Returns `false` when the loop should exit.
    fn handle_command(&mut self, command: SchedulerCommand) -> bool {
        match command {
            SchedulerCommand::SetDisplayTarget(target) => self.engine.set_display_target(target),
            SchedulerCommand::SetPending(notifications, reply) => {
                let result = self.engine.set_pending(notifications);
                let _ = reply.send(result);
            }
            SchedulerCommand::MergePending {
                notifications,
                new_day,
                reply,
            } => {
                if new_day {
                    self.engine.clear_dispatched_occurrences();
                }
                let result = self.engine.merge_pending(notifications);
                let _ = reply.send(result);
            }
            SchedulerCommand::Stop => self.engine.stop(),
            SchedulerCommand::Reset => self.engine.reset(),
            SchedulerCommand::Snapshot(reply) => {
                let _ = reply.send(EngineSnapshot {
                    running: self.engine.is_running(),
                    pending: self.engine.pending().to_vec(),
                    shown: self.engine.shown().to_vec(),
                });
            }
            SchedulerCommand::Shutdown => {
                self.engine.stop();
                return false;
            }
        }
        true
    }
}

//! Background timer that fills idle courts from the queue.

use log::{debug, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::engine::handle::SessionHandle;

pub use crate::models::{AutoAssignSettings, DEFAULT_INTERVAL_SECS};

fn period(settings: &AutoAssignSettings) -> Duration {
    Duration::from_secs(settings.interval_secs.max(1))
}

/// Owns the timer task for one session.
///
/// Each tick calls [`SessionHandle::auto_assign_tick`], which reads the session as it
/// is at that moment. A tick runs to completion before the next one is considered, and
/// ticks missed while one was running are skipped. Changing the settings re-arms the
/// timer from scratch. Dropping the assigner stops the task.
pub struct AutoAssigner {
    settings: watch::Sender<AutoAssignSettings>,
    task: JoinHandle<()>,
}

impl AutoAssigner {
    pub fn spawn(handle: SessionHandle, settings: AutoAssignSettings) -> Self {
        let (tx, rx) = watch::channel(settings);
        let task = tokio::spawn(run(handle, rx));
        Self { settings: tx, task }
    }

    pub fn settings(&self) -> AutoAssignSettings {
        *self.settings.borrow()
    }

    pub fn update(&self, settings: AutoAssignSettings) {
        info!(
            "Auto-assign {} (every {}s)",
            if settings.enabled { "enabled" } else { "disabled" },
            settings.interval_secs.max(1)
        );
        self.settings.send_replace(settings);
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for AutoAssigner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(handle: SessionHandle, mut rx: watch::Receiver<AutoAssignSettings>) {
    loop {
        let settings = *rx.borrow_and_update();
        if !settings.enabled {
            if rx.changed().await.is_err() {
                return;
            }
            continue;
        }

        let every = period(&settings);
        let mut ticks = interval_at(Instant::now() + every, every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    let report = handle.auto_assign_tick().await;
                    debug!(
                        "Session {}: tick filled {}/{}",
                        handle.id(),
                        report.filled,
                        report.eligible
                    );
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

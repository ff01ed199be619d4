//! Periodic background reconciliation.
//!
//! The [`Reconciler`] runs [`Engine::verify_integrity`] on a fixed interval.
//! It only reports drift unless `auto_correct` is set, in which case it
//! follows a failed check with [`Engine::resync`].

use tokio::{sync::watch, task::JoinHandle};

use crate::{Engine, IntegrityReport, ReconcilerSettings, ResultEngine};

#[derive(Debug)]
pub struct Reconciler;

/// Handle to a running reconciler. Dropping it also stops the loop.
#[derive(Debug)]
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stops the loop and waits for the current cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::error!("reconciler task failed: {err}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Reconciler {
    /// Starts the loop on the current tokio runtime. The first check runs
    /// immediately.
    pub fn spawn(engine: Engine, settings: ReconcilerSettings) -> ReconcilerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = settings.interval().as_secs(),
                auto_correct = settings.auto_correct,
                "reconciler started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = Self::run_once(&engine, &settings).await {
                            tracing::error!("reconciliation failed: {err}");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("reconciler stopped");
        });
        ReconcilerHandle { shutdown, task }
    }

    /// One verification cycle. Returns the report taken before any
    /// correction.
    pub async fn run_once(
        engine: &Engine,
        settings: &ReconcilerSettings,
    ) -> ResultEngine<IntegrityReport> {
        let report = engine.verify_integrity().await?;
        if report.consistent {
            tracing::debug!(accounts = report.accounts_checked, "ledger consistent");
            return Ok(report);
        }

        tracing::warn!(
            accounts = report.discrepancies.len(),
            subledgers = report.subledger_discrepancies.len(),
            unbalanced = report.unbalanced_entries.len(),
            "ledger drift detected"
        );
        if settings.auto_correct {
            let summary = engine.resync().await?;
            tracing::info!(
                accounts = summary.accounts.corrections.len(),
                subledgers = summary.subledgers.iter().filter(|s| s.changed()).count(),
                "drift corrected"
            );
        }
        Ok(report)
    }
}

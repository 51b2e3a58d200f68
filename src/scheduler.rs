//! Periodic host loop around [`FeedChecker`].
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::MissedTickBehavior;

use crate::checker::{FeedChecker, RunSummary};

/// Triggers runs on a fixed interval, at most one at a time.
#[derive(Clone)]
pub struct Scheduler {
    checker: Arc<FeedChecker>,
    interval: Duration,
    /// Held for the whole duration of a run.
    gate: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(checker: Arc<FeedChecker>, interval: Duration) -> Self {
        Self {
            checker,
            interval,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Start a run unless one is already in flight.
    ///
    /// Returns `None` when the trigger was skipped or the run panicked. The
    /// run executes in its own task, so a panic is contained and reported.
    pub async fn trigger(&self) -> Option<RunSummary> {
        let permit = self.try_claim()?;
        self.run_claimed(permit).await
    }

    fn try_claim(&self) -> Option<OwnedMutexGuard<()>> {
        match Arc::clone(&self.gate).try_lock_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("Previous run still in progress, skipping");
                None
            }
        }
    }

    /// Run the checker while holding `permit`, released when the run ends.
    async fn run_claimed(&self, permit: OwnedMutexGuard<()>) -> Option<RunSummary> {
        let checker = Arc::clone(&self.checker);
        let run = tokio::spawn(async move {
            let _permit = permit;
            checker.run().await
        });

        match run.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                let error = anyhow::Error::new(e).context("News push run aborted");
                tracing::error!(error = %format!("{error:#}"), "Run did not complete");
                self.checker.reporter().report(&error);
                None
            }
        }
    }

    /// Trigger a run immediately and then every interval until `shutdown`
    /// resolves. Ticks missed while a run is slow are skipped. On shutdown
    /// the run in flight, if any, is awaited.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    // The gate is taken before spawning so the shutdown wait
                    // below always sees a run that has been started.
                    if let Some(permit) = self.try_claim() {
                        let scheduler = self.clone();
                        tokio::spawn(async move {
                            scheduler.run_claimed(permit).await;
                        });
                    }
                }
            }
        }

        tracing::info!("Shutting down, waiting for the current run to finish");
        let _idle = self.gate.lock().await;
    }
}

use crate::core::Synchronizer;
use crate::domain::model::SyncResult;
use crate::utils::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled => write!(f, "scheduled"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { result: SyncResult },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Runs the synchronizer at most once at a time, whoever asks.
pub struct SyncRunner {
    synchronizer: Synchronizer,
    in_flight: Arc<Mutex<()>>,
    last_run: RwLock<Option<RunReport>>,
}

impl SyncRunner {
    pub fn new(synchronizer: Synchronizer) -> Self {
        Self {
            synchronizer,
            in_flight: Arc::new(Mutex::new(())),
            last_run: RwLock::new(None),
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub async fn last_run(&self) -> Option<RunReport> {
        self.last_run.read().await.clone()
    }

    /// Returns `SyncInProgress` without waiting when another run holds the lock.
    ///
    /// The run itself is spawned: dropping the returned future (say, an HTTP
    /// client hanging up) does not stop it, and its report is still recorded.
    pub async fn trigger(self: &Arc<Self>, trigger: Trigger) -> Result<SyncResult> {
        let Ok(guard) = Arc::clone(&self.in_flight).try_lock_owned() else {
            return Err(SyncError::SyncInProgress);
        };

        let runner = Arc::clone(self);
        let run = tokio::spawn(async move {
            let outcome = runner.run_locked(trigger).await;
            drop(guard);
            outcome
        });
        run.await?
    }

    async fn run_locked(&self, trigger: Trigger) -> Result<SyncResult> {
        let started_at = Utc::now();
        tracing::info!("Starting {} sync", trigger);
        let outcome = self.synchronizer.run_sync().await;
        let finished_at = Utc::now();

        let report_outcome = match &outcome {
            Ok(result) => RunOutcome::Completed {
                result: result.clone(),
            },
            Err(e) => {
                tracing::error!(
                    "❌ {} sync failed: {} (Category: {:?})",
                    trigger,
                    e,
                    e.category()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                RunOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        *self.last_run.write().await = Some(RunReport {
            trigger,
            started_at,
            finished_at,
            outcome: report_outcome,
        });

        outcome
    }

    /// Fires a scheduled sync every `period` until `shutdown` flips or its
    /// sender goes away. A run in progress is never interrupted; shutdown is
    /// only observed between runs.
    pub async fn run_every(
        self: Arc<Self>,
        period: Duration,
        run_immediately: bool,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let start = if run_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Scheduler started, syncing every {:?}", period);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("Scheduler stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.trigger(Trigger::Scheduled).await {
                Ok(_) => {}
                Err(SyncError::SyncInProgress) => {
                    tracing::info!("Skipping scheduled sync, another run is in progress");
                }
                // Already logged by `trigger`; keep the schedule alive.
                Err(_) => {}
            }
        }
    }
}

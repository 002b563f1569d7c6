//! Per-object job controller.
//!
//! One [`ObjectJobController`] exists per SeedObject. It runs at most one
//! job task at a time; the task drives the object through stat → pin →
//! download → finished and persists a checkpoint after each transition.
//! `stop()` trips the job's abort token and joins the task, so when it
//! returns the row reflects the last completed checkpoint.

mod activity;
mod download;
mod pin;
mod run;
mod status;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::JobPolicy;
use crate::control::AbortToken;
use crate::drivers::Drivers;
use crate::error::{JobError, JobOutcome};
use crate::events::{EventBus, JobPhase};
use crate::store::{SeedId, SeedStore};

pub use activity::ActivityCounter;
pub(crate) use status::Reporter;

/// Services shared by every job of a seed.
pub struct JobContext {
    pub store: SeedStore,
    pub drivers: Drivers,
    pub policy: JobPolicy,
    pub events: EventBus,
    pub activity: ActivityCounter,
}

/// What a job works on: one manifest entry of one seed.
#[derive(Debug, Clone)]
pub struct ObjectTarget {
    pub seed_id: SeedId,
    pub obj_index: i64,
    /// Content path handed to the drivers.
    pub path: String,
    /// Human-readable name from the manifest.
    pub name: String,
    /// Directory downloads land in.
    pub dest_dir: PathBuf,
}

/// Awaitable result of one started job.
pub struct JobHandle {
    outcome: watch::Receiver<Option<JobOutcome>>,
}

impl JobHandle {
    /// Wait for the job to end. A job whose task vanished counts as cancelled.
    pub async fn wait(mut self) -> JobOutcome {
        wait_outcome(&mut self.outcome).await
    }
}

async fn wait_outcome(rx: &mut watch::Receiver<Option<JobOutcome>>) -> JobOutcome {
    // Err means the sender is gone; whatever it last stored is final.
    let _ = rx.wait_for(|o| o.is_some()).await;
    let outcome = rx.borrow().clone();
    outcome.unwrap_or(JobOutcome::Cancelled)
}

struct RunningJob {
    abort: AbortToken,
    task: JoinHandle<JobOutcome>,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

impl RunningJob {
    /// A published outcome means the loop is over even if the task has not
    /// returned yet.
    fn is_live(&self) -> bool {
        self.outcome.borrow().is_none() && !self.task.is_finished()
    }
}

pub struct ObjectJobController {
    ctx: Arc<JobContext>,
    target: Arc<ObjectTarget>,
    reporter: Reporter,
    slot: Mutex<Option<RunningJob>>,
}

impl ObjectJobController {
    pub fn new(ctx: Arc<JobContext>, target: ObjectTarget) -> Self {
        let reporter = Reporter::new(target.seed_id, target.obj_index, ctx.events.clone());
        Self {
            ctx,
            target: Arc::new(target),
            reporter,
            slot: Mutex::new(None),
        }
    }

    /// Current observable phase.
    pub fn phase(&self) -> JobPhase {
        self.reporter.current_phase()
    }

    /// Spawn the watch-loop. Fails with `AlreadyRunning` while a job is active.
    pub async fn start(&self) -> Result<JobHandle, JobError> {
        let mut slot = self.slot.lock().await;
        self.start_locked(&mut slot)
    }

    /// Request cancellation and wait until the task has exited.
    /// Returns the outcome of the run that was stopped, if there was one.
    pub async fn stop(&self) -> Option<JobOutcome> {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// `stop()` followed by `start()`, with no other start/stop in between.
    pub async fn reconfigure(&self) -> Result<JobHandle, JobError> {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;
        self.start_locked(&mut slot)
    }

    pub async fn is_running(&self) -> bool {
        let slot = self.slot.lock().await;
        slot.as_ref().is_some_and(RunningJob::is_live)
    }

    /// Wait for the current run (if any) to end without cancelling it.
    pub async fn wait(&self) -> Option<JobOutcome> {
        let mut rx = {
            let slot = self.slot.lock().await;
            slot.as_ref()?.outcome.clone()
        };
        Some(wait_outcome(&mut rx).await)
    }

    fn start_locked(&self, slot: &mut Option<RunningJob>) -> Result<JobHandle, JobError> {
        if slot.as_ref().is_some_and(RunningJob::is_live) {
            tracing::debug!(
                seed_id = self.target.seed_id,
                obj_index = self.target.obj_index,
                "start refused: job already running"
            );
            return Err(JobError::AlreadyRunning);
        }

        let abort = AbortToken::new();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let ctx = Arc::clone(&self.ctx);
        let target = Arc::clone(&self.target);
        let reporter = self.reporter.clone();
        let token = abort.clone();

        let task = tokio::spawn(async move {
            let outcome = run::run_object_job(&ctx, &target, &reporter, &token).await;
            outcome_tx.send_replace(Some(outcome.clone()));
            outcome
        });

        *slot = Some(RunningJob {
            abort,
            task,
            outcome: outcome_rx.clone(),
        });
        Ok(JobHandle {
            outcome: outcome_rx,
        })
    }

    async fn stop_locked(&self, slot: &mut Option<RunningJob>) -> Option<JobOutcome> {
        let job = slot.take()?;
        job.abort.request_abort();
        match job.task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(
                    seed_id = self.target.seed_id,
                    obj_index = self.target.obj_index,
                    "job task join: {}",
                    e
                );
                None
            }
        }
    }
}

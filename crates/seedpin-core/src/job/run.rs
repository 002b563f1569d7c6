//! The watch-loop of one object job: stat, then pin and download whatever
//! the persisted config still asks for, then mark the row finished.

use std::future::Future;

use crate::control::AbortToken;
use crate::drivers::ObjectStat;
use crate::error::{JobError, JobOutcome};
use crate::events::JobPhase;
use crate::probe;
use crate::store::{ObjectId, ObjectStatus, SeedObject};

use super::status::Reporter;
use super::{JobContext, ObjectTarget};

/// Why a job stopped early.
pub(super) enum Halt {
    Cancelled,
    Failed(JobError),
}

impl From<JobError> for Halt {
    fn from(e: JobError) -> Self {
        Halt::Failed(e)
    }
}

/// Aborts the provider probe when the job ends.
struct ProbeTask(tokio::task::JoinHandle<()>);

impl Drop for ProbeTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// State of one job run.
pub(super) struct ObjectJob<'a> {
    pub(super) ctx: &'a JobContext,
    pub(super) target: &'a ObjectTarget,
    pub(super) report: &'a Reporter,
    pub(super) abort: &'a AbortToken,
}

impl ObjectJob<'_> {
    /// Await `fut` unless abort is requested first.
    pub(super) async fn or_abort<F: Future>(&self, fut: F) -> Result<F::Output, Halt> {
        tokio::select! {
            biased;
            _ = self.abort.aborted() => Err(Halt::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Abort check after a write that completed.
    pub(super) fn checkpoint(&self) -> Result<(), Halt> {
        if self.abort.is_aborted() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    pub(super) async fn load(&self) -> Result<SeedObject, Halt> {
        let row = self
            .or_abort(
                self.ctx
                    .store
                    .get_or_create_object(self.target.seed_id, self.target.obj_index),
            )
            .await?
            .map_err(JobError::persistence)?;
        Ok(row)
    }

    async fn stat(&self) -> Result<ObjectStat, Halt> {
        let timeout = self.ctx.policy.stat_timeout;
        let stat = self.ctx.drivers.stat.stat(&self.target.path);
        match self.or_abort(tokio::time::timeout(timeout, stat)).await? {
            Ok(Ok(stat)) => Ok(stat),
            Ok(Err(e)) => Err(JobError::Stat(format!("{:#}", e)).into()),
            Err(_) => Err(JobError::Stat(format!("timed out after {:?}", timeout)).into()),
        }
    }

    fn spawn_probe(&self) -> ProbeTask {
        let lookup = self.ctx.drivers.providers.clone();
        let path = self.target.path.clone();
        let num = self.ctx.policy.probe_num_providers;
        let timeout = self.ctx.policy.probe_timeout;
        let report = self.report.clone();
        ProbeTask(tokio::spawn(async move {
            let count = probe::probe(lookup.as_ref(), &path, num, timeout).await;
            report.providers(count);
        }))
    }

    async fn drive(&self, object_id: &mut Option<ObjectId>) -> Result<(), Halt> {
        let row = self.load().await?;
        *object_id = Some(row.id);
        if row.status == ObjectStatus::Finished && row.is_satisfied() {
            return Ok(());
        }

        self.report.phase(JobPhase::Stat);
        let stat = self.stat().await?;
        tracing::debug!(
            seed_id = self.target.seed_id,
            obj_index = self.target.obj_index,
            size = stat.cumulative_size,
            blocks = stat.blocks,
            "object reachable"
        );
        let _probe = self.spawn_probe();

        let row = self.load().await?;
        if !row.is_satisfied() && row.status != ObjectStatus::Queued {
            self.or_abort(self.ctx.store.set_object_status(row.id, ObjectStatus::Queued))
                .await?
                .map_err(JobError::persistence)?;
        }
        self.report.phase(JobPhase::Queued);

        // Each pass either returns or achieves a pending aspect, so the loop
        // only repeats when config asks for more work while the job runs.
        loop {
            let row = self.load().await?;
            if row.is_satisfied() {
                let finished = self
                    .or_abort(self.ctx.store.finish_object(row.id))
                    .await?
                    .map_err(JobError::persistence)?;
                if !finished {
                    return Err(JobError::Persistence(
                        "object row changed before it could be finished".to_string(),
                    )
                    .into());
                }
                return Ok(());
            }

            if row.pin_pending() {
                self.pin_phase(&row).await?;
            }

            // Download may have been enabled while pinning.
            let row = self.load().await?;
            if row.download_pending() {
                self.download_phase(&row).await?;
            }
        }
    }
}

/// Run one job to completion, converting every failure into a status update.
pub(super) async fn run_object_job(
    ctx: &JobContext,
    target: &ObjectTarget,
    report: &Reporter,
    abort: &AbortToken,
) -> JobOutcome {
    let job = ObjectJob {
        ctx,
        target,
        report,
        abort,
    };
    let mut object_id = None;
    let result = job.drive(&mut object_id).await;

    match result {
        Ok(()) => {
            tracing::info!(
                seed_id = target.seed_id,
                obj_index = target.obj_index,
                "object finished"
            );
            report.phase(JobPhase::Finished);
            report.status("finished");
            JobOutcome::Finished
        }
        Err(Halt::Cancelled) => {
            if let Some(id) = object_id {
                if let Err(e) = ctx.store.record_cancelled(id).await {
                    tracing::warn!(object_id = id, "could not record cancellation: {:#}", e);
                }
            }
            tracing::info!(
                seed_id = target.seed_id,
                obj_index = target.obj_index,
                "object job cancelled"
            );
            report.phase(JobPhase::Cancelled);
            report.status("cancelled");
            JobOutcome::Cancelled
        }
        Err(Halt::Failed(err)) => {
            tracing::warn!(
                seed_id = target.seed_id,
                obj_index = target.obj_index,
                "object job failed: {}",
                err
            );
            report.phase(JobPhase::Error);
            report.status(err.to_string());
            JobOutcome::Failed(err)
        }
    }
}

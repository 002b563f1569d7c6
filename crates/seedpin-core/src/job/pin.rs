//! Pin phase: drive the pin driver's progress stream to completion.

use std::time::Instant;

use crate::drivers::PinEvent;
use crate::error::JobError;
use crate::events::{JobPhase, Progress};
use crate::store::{AspectStatus, SeedObject};

use super::run::{Halt, ObjectJob};
use super::status::{pinning_text, stalled_text};

impl ObjectJob<'_> {
    pub(super) async fn pin_phase(&self, row: &SeedObject) -> Result<(), Halt> {
        let store = &self.ctx.store;
        let _active = self.ctx.activity.enter();
        self.report.phase(JobPhase::Pinning);
        self.report.status("pinning");

        self.or_abort(store.set_pin_status(row.id, AspectStatus::InProgress))
            .await?
            .map_err(JobError::persistence)?;
        self.checkpoint()?;

        let mut stream = match self.or_abort(self.ctx.drivers.pin.pin(&self.target.path)).await? {
            Ok(stream) => stream,
            Err(e) => return Err(self.pin_failed(row.id, format!("{:#}", e)).await),
        };

        let stall_window = self.ctx.policy.stall_window;
        let checkpoint_every = self.ctx.policy.progress_checkpoint;
        let mut nodes: u64 = 0;
        let mut persisted: u64 = 0;
        let mut last_update = Instant::now();
        let mut last_write: Option<Instant> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.abort.aborted() => {
                    if nodes > persisted {
                        if let Err(e) = store.update_pin_progress(row.id, nodes as i64).await {
                            tracing::warn!(object_id = row.id, "pin progress on cancel: {:#}", e);
                        }
                    }
                    return Err(Halt::Cancelled);
                }
                next = tokio::time::timeout(stall_window, stream.next()) => next,
            };

            match next {
                Err(_) => {
                    self.report.status(stalled_text(last_update.elapsed()));
                }
                Ok(Some(PinEvent::Progress { nodes: n })) => {
                    nodes = nodes.max(n);
                    let since_last = last_update.elapsed();
                    last_update = Instant::now();
                    self.report.progress(Progress::Nodes(nodes));
                    self.report.status(pinning_text(nodes, since_last));

                    let due = last_write.map_or(true, |t| t.elapsed() >= checkpoint_every);
                    if due && nodes > persisted {
                        self.or_abort(store.update_pin_progress(row.id, nodes as i64))
                            .await?
                            .map_err(JobError::persistence)?;
                        persisted = nodes;
                        last_write = Some(Instant::now());
                    }
                }
                Ok(Some(PinEvent::Done)) => break,
                Ok(Some(PinEvent::Failed(msg))) => return Err(self.pin_failed(row.id, msg).await),
                Ok(None) => {
                    let msg = "pin stream ended without completion".to_string();
                    return Err(self.pin_failed(row.id, msg).await);
                }
            }
        }

        if let Err(e) = store.mark_pinned(row.id, nodes as i64).await {
            if let Err(reset) = store.set_pin_status(row.id, AspectStatus::Idle).await {
                tracing::warn!(object_id = row.id, "could not reset pin status: {:#}", reset);
            }
            return Err(JobError::persistence(e).into());
        }
        tracing::info!(
            seed_id = self.target.seed_id,
            obj_index = self.target.obj_index,
            nodes,
            "object pinned"
        );
        self.report.status(format!("pinned ({} nodes)", nodes));
        self.checkpoint()
    }

    async fn pin_failed(&self, object_id: i64, msg: String) -> Halt {
        if let Err(e) = self.ctx.store.record_pin_error(object_id).await {
            tracing::warn!(object_id, "could not record pin error: {:#}", e);
        }
        Halt::Failed(JobError::Pin(msg))
    }
}

//! Download phase: fetch into the seed's directory, place under the
//! object's name, record where it went.

use crate::drivers::DownloadEvent;
use crate::error::JobError;
use crate::events::{JobPhase, Progress};
use crate::naming;
use crate::store::{AspectStatus, SeedObject};

use super::run::{Halt, ObjectJob};
use super::status::{downloading_text, percent};

impl ObjectJob<'_> {
    pub(super) async fn download_phase(&self, row: &SeedObject) -> Result<(), Halt> {
        let store = &self.ctx.store;
        let dest_dir = &self.target.dest_dir;
        let _active = self.ctx.activity.enter();
        self.report.phase(JobPhase::Downloading);
        self.report.status("downloading");

        self.or_abort(store.set_download_status(row.id, AspectStatus::InProgress))
            .await?
            .map_err(JobError::persistence)?;
        self.checkpoint()?;

        if let Err(e) = self.or_abort(tokio::fs::create_dir_all(dest_dir)).await? {
            let msg = format!("create {}: {}", dest_dir.display(), e);
            return Err(self.download_failed(row.id, msg).await);
        }

        let chunk_size = if row.download_chunk_size > 0 {
            row.download_chunk_size
        } else {
            self.ctx.policy.default_chunk_size
        } as u64;

        let get = self
            .ctx
            .drivers
            .download
            .get(&self.target.path, dest_dir, chunk_size);
        let mut stream = match self.or_abort(get).await? {
            Ok(stream) => stream,
            Err(e) => return Err(self.download_failed(row.id, format!("{:#}", e)).await),
        };

        let mut bytes_seen: u64 = 0;
        let mut shown: Option<u8> = None;
        let landed = loop {
            let next = self.or_abort(stream.next()).await?;
            match next {
                Some(DownloadEvent::Progress {
                    bytes_read,
                    content_length,
                }) => {
                    bytes_seen = bytes_seen.max(bytes_read);
                    let pct = percent(bytes_seen, content_length);
                    if shown.map_or(true, |p| pct > p) {
                        shown = Some(pct);
                        self.report.progress(Progress::Percent(pct));
                        self.report
                            .status(downloading_text(pct, bytes_seen, content_length));
                    }
                }
                Some(DownloadEvent::Done {
                    bytes_read, path, ..
                }) => {
                    bytes_seen = bytes_seen.max(bytes_read);
                    if shown != Some(100) {
                        self.report.progress(Progress::Percent(100));
                    }
                    break path;
                }
                Some(DownloadEvent::Failed(msg)) => {
                    return Err(self.download_failed(row.id, msg).await)
                }
                None => {
                    let msg = "transfer ended without completion".to_string();
                    return Err(self.download_failed(row.id, msg).await);
                }
            }
        };

        let placed = match naming::place_download(&landed, dest_dir, &self.target.name).await {
            Ok(p) => p,
            Err(e) => return Err(self.download_failed(row.id, format!("{:#}", e)).await),
        };
        let placed_str = placed.to_string_lossy().to_string();

        // Not abortable: the content is already in place.
        if let Err(e) = store.mark_downloaded(row.id, &placed_str).await {
            if let Err(reset) = store.set_download_status(row.id, AspectStatus::Idle).await {
                tracing::warn!(object_id = row.id, "could not reset download status: {:#}", reset);
            }
            return Err(JobError::persistence(e).into());
        }
        tracing::info!(
            seed_id = self.target.seed_id,
            obj_index = self.target.obj_index,
            bytes = bytes_seen,
            path = %placed.display(),
            "object downloaded"
        );
        self.report.status(format!("downloaded to {}", placed.display()));
        self.checkpoint()
    }

    async fn download_failed(&self, object_id: i64, msg: String) -> Halt {
        if let Err(e) = self.ctx.store.record_download_error(object_id).await {
            tracing::warn!(object_id, "could not record download error: {:#}", e);
        }
        Halt::Failed(JobError::Download(msg))
    }
}

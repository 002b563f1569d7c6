//! SeedObject rows: get-or-create, configuration upserts, and the job
//! checkpoints written by the object's controller.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, SeedStore};
use super::types::{AspectStatus, ObjectId, ObjectStatus, SeedId, SeedObject, DEFAULT_CHUNK_SIZE};

const OBJECT_COLUMNS: &str = r#"
    id, seed_id, obj_index, pin, pinned, pinned_date, pinned_nodes_cur,
    pinned_nodes_final, pin_status, download, downloaded, downloaded_date,
    downloaded_to, download_status, download_chunk_size, status, ignored,
    pubsub_notify
"#;

fn object_from_row(row: &SqliteRow) -> SeedObject {
    SeedObject {
        id: row.get("id"),
        seed_id: row.get("seed_id"),
        obj_index: row.get("obj_index"),
        pin: row.get::<i64, _>("pin") != 0,
        pinned: row.get::<i64, _>("pinned") != 0,
        pinned_date: row.get("pinned_date"),
        pinned_nodes_cur: row.get("pinned_nodes_cur"),
        pinned_nodes_final: row.get("pinned_nodes_final"),
        pin_status: AspectStatus::from_i64(row.get("pin_status")),
        download: row.get::<i64, _>("download") != 0,
        downloaded: row.get::<i64, _>("downloaded") != 0,
        downloaded_date: row.get("downloaded_date"),
        downloaded_to: row.get("downloaded_to"),
        download_status: AspectStatus::from_i64(row.get("download_status")),
        download_chunk_size: row.get("download_chunk_size"),
        status: ObjectStatus::from_i64(row.get("status")),
        ignore: row.get::<i64, _>("ignored") != 0,
        pubsub_notify: row.get::<i64, _>("pubsub_notify") != 0,
    }
}

impl SeedStore {
    pub async fn get_object(&self, seed_id: SeedId, obj_index: i64) -> Result<Option<SeedObject>> {
        let sql = format!(
            "SELECT {} FROM seed_objects WHERE seed_id = ?1 AND obj_index = ?2",
            OBJECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(seed_id)
            .bind(obj_index)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(object_from_row))
    }

    /// Get-or-create the object row with defaults
    /// (`pin=true, download=false, download_chunk_size=524288`).
    pub async fn get_or_create_object(&self, seed_id: SeedId, obj_index: i64) -> Result<SeedObject> {
        sqlx::query(
            r#"
            INSERT INTO seed_objects (seed_id, obj_index, pin, download, download_chunk_size, status)
            VALUES (?1, ?2, 1, 0, ?3, ?4)
            ON CONFLICT(seed_id, obj_index) DO NOTHING
            "#,
        )
        .bind(seed_id)
        .bind(obj_index)
        .bind(DEFAULT_CHUNK_SIZE)
        .bind(ObjectStatus::Queued.as_i64())
        .execute(&self.pool)
        .await?;

        self.get_object(seed_id, obj_index)
            .await?
            .ok_or_else(|| anyhow::anyhow!("object {}/{} missing after insert", seed_id, obj_index))
    }

    /// All object rows of a seed, in manifest order.
    pub async fn list_objects(&self, seed_id: SeedId) -> Result<Vec<SeedObject>> {
        let sql = format!(
            "SELECT {} FROM seed_objects WHERE seed_id = ?1 ORDER BY obj_index ASC",
            OBJECT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(seed_id).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(object_from_row).collect())
    }

    /// Upsert the two request flags. Achieved state (`pinned`, `downloaded`)
    /// is left alone so toggling a flag off and on never repeats finished work.
    /// A FINISHED row whose new request is no longer satisfied goes back to QUEUED.
    pub async fn configure_object(
        &self,
        seed_id: SeedId,
        obj_index: i64,
        pin: bool,
        download: bool,
    ) -> Result<SeedObject> {
        sqlx::query(
            r#"
            INSERT INTO seed_objects (seed_id, obj_index, pin, download, download_chunk_size, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(seed_id, obj_index) DO UPDATE SET
                pin = excluded.pin,
                download = excluded.download,
                status = CASE
                    WHEN seed_objects.status = ?7
                         AND ((excluded.pin = 1 AND seed_objects.pinned = 0)
                              OR (excluded.download = 1 AND seed_objects.downloaded = 0))
                    THEN ?6
                    ELSE seed_objects.status
                END
            "#,
        )
        .bind(seed_id)
        .bind(obj_index)
        .bind(pin)
        .bind(download)
        .bind(DEFAULT_CHUNK_SIZE)
        .bind(ObjectStatus::Queued.as_i64())
        .bind(ObjectStatus::Finished.as_i64())
        .execute(&self.pool)
        .await?;

        self.get_object(seed_id, obj_index)
            .await?
            .ok_or_else(|| anyhow::anyhow!("object {}/{} missing after upsert", seed_id, obj_index))
    }

    pub async fn set_object_ignore(&self, id: ObjectId, ignore: bool) -> Result<()> {
        sqlx::query("UPDATE seed_objects SET ignored = ?1 WHERE id = ?2")
            .bind(ignore)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_object_status(&self, id: ObjectId, status: ObjectStatus) -> Result<()> {
        sqlx::query("UPDATE seed_objects SET status = ?1 WHERE id = ?2")
            .bind(status.as_i64())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_pin_status(&self, id: ObjectId, status: AspectStatus) -> Result<()> {
        sqlx::query("UPDATE seed_objects SET pin_status = ?1 WHERE id = ?2")
            .bind(status.as_i64())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_download_status(&self, id: ObjectId, status: AspectStatus) -> Result<()> {
        sqlx::query("UPDATE seed_objects SET download_status = ?1 WHERE id = ?2")
            .bind(status.as_i64())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed aspect: aspect status ERROR and object status ERROR, in one write.
    pub async fn record_pin_error(&self, id: ObjectId) -> Result<()> {
        sqlx::query("UPDATE seed_objects SET pin_status = ?1, status = ?2 WHERE id = ?3")
            .bind(AspectStatus::Error.as_i64())
            .bind(ObjectStatus::Error.as_i64())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_download_error(&self, id: ObjectId) -> Result<()> {
        sqlx::query("UPDATE seed_objects SET download_status = ?1, status = ?2 WHERE id = ?3")
            .bind(AspectStatus::Error.as_i64())
            .bind(ObjectStatus::Error.as_i64())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Durable pin progress. Never lowers the stored node count.
    pub async fn update_pin_progress(&self, id: ObjectId, nodes_cur: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE seed_objects
            SET pinned_nodes_cur = MAX(pinned_nodes_cur, ?1)
            WHERE id = ?2
            "#,
        )
        .bind(nodes_cur)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Pin completed: `pinned`, `pinned_date`, final node count, aspect DONE.
    pub async fn mark_pinned(&self, id: ObjectId, nodes: i64) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE seed_objects
            SET pinned = 1,
                pinned_date = ?1,
                pinned_nodes_cur = MAX(pinned_nodes_cur, ?2),
                pinned_nodes_final = MAX(pinned_nodes_cur, ?2),
                pin_status = ?3
            WHERE id = ?4
            "#,
        )
        .bind(now)
        .bind(nodes)
        .bind(AspectStatus::Done.as_i64())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Download completed. Fails if another object already claims `downloaded_to`.
    pub async fn mark_downloaded(&self, id: ObjectId, downloaded_to: &str) -> Result<()> {
        if downloaded_to.is_empty() {
            anyhow::bail!("refusing to record an empty download path");
        }
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE seed_objects
            SET downloaded = 1,
                downloaded_to = ?1,
                downloaded_date = ?2,
                download_status = ?3
            WHERE id = ?4
            "#,
        )
        .bind(downloaded_to)
        .bind(now)
        .bind(AspectStatus::Done.as_i64())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set FINISHED only if every requested aspect is achieved. Returns whether the row changed.
    pub async fn finish_object(&self, id: ObjectId) -> Result<bool> {
        let r = sqlx::query(
            r#"
            UPDATE seed_objects
            SET status = ?1
            WHERE id = ?2
              AND (pin = 0 OR pinned = 1)
              AND (download = 0 OR downloaded = 1)
            "#,
        )
        .bind(ObjectStatus::Finished.as_i64())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Cooperative cancel: status CANCELLED and any in-progress aspect back to IDLE.
    pub async fn record_cancelled(&self, id: ObjectId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE seed_objects
            SET status = ?1,
                pin_status = CASE WHEN pin_status = ?2 THEN ?3 ELSE pin_status END,
                download_status = CASE WHEN download_status = ?2 THEN ?3 ELSE download_status END
            WHERE id = ?4
            "#,
        )
        .bind(ObjectStatus::Cancelled.as_i64())
        .bind(AspectStatus::InProgress.as_i64())
        .bind(AspectStatus::Idle.as_i64())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reset aspects left IN_PROGRESS by a process that died mid-job.
    /// Returns the number of rows touched.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let r = sqlx::query(
            r#"
            UPDATE seed_objects
            SET pin_status = CASE WHEN pin_status = ?1 THEN ?2 ELSE pin_status END,
                download_status = CASE WHEN download_status = ?1 THEN ?2 ELSE download_status END
            WHERE pin_status = ?1 OR download_status = ?1
            "#,
        )
        .bind(AspectStatus::InProgress.as_i64())
        .bind(AspectStatus::Idle.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}

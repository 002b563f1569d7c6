//! Seed rows: get-or-create, lookup, listing, hide, cascading delete.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, SeedStore};
use super::types::{Seed, SeedId};

fn seed_from_row(row: &SqliteRow) -> Seed {
    Seed {
        id: row.get("id"),
        dag_cid: row.get("dag_cid"),
        date_added: row.get("date_added"),
        hidden: row.get::<i64, _>("hidden") != 0,
        status: row.get("status"),
    }
}

impl SeedStore {
    /// Get-or-create the seed row for `dag_cid`. `date_added` is only set on creation.
    pub async fn seed_add(&self, dag_cid: &str) -> Result<Seed> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO seeds (dag_cid, date_added, hidden, status)
            VALUES (?1, ?2, 0, 0)
            ON CONFLICT(dag_cid) DO NOTHING
            "#,
        )
        .bind(dag_cid)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.seed_by_cid(dag_cid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("seed {} missing after insert", dag_cid))
    }

    pub async fn seed_by_cid(&self, dag_cid: &str) -> Result<Option<Seed>> {
        let row = sqlx::query(
            r#"
            SELECT id, dag_cid, date_added, hidden, status
            FROM seeds
            WHERE dag_cid = ?1
            "#,
        )
        .bind(dag_cid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(seed_from_row))
    }

    pub async fn seed_by_id(&self, id: SeedId) -> Result<Option<Seed>> {
        let row = sqlx::query(
            r#"
            SELECT id, dag_cid, date_added, hidden, status
            FROM seeds
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(seed_from_row))
    }

    /// List seeds, oldest first. Hidden seeds are skipped unless `include_hidden`.
    pub async fn list_seeds(&self, include_hidden: bool) -> Result<Vec<Seed>> {
        let rows = sqlx::query(
            r#"
            SELECT id, dag_cid, date_added, hidden, status
            FROM seeds
            WHERE hidden = 0 OR ?1
            ORDER BY date_added ASC, id ASC
            "#,
        )
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(seed_from_row).collect())
    }

    pub async fn set_seed_hidden(&self, id: SeedId, hidden: bool) -> Result<()> {
        sqlx::query("UPDATE seeds SET hidden = ?1 WHERE id = ?2")
            .bind(hidden)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a seed and everything it owns. Returns false if no such seed exists.
    ///
    /// Children are removed explicitly in the same transaction so the cascade
    /// does not depend on the connection's foreign key setting.
    pub async fn seed_delete(&self, dag_cid: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT id FROM seeds WHERE dag_cid = ?1")
            .bind(dag_cid)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(false);
        };
        let id: i64 = row.get("id");
        sqlx::query("DELETE FROM seed_objects WHERE seed_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM seed_entries WHERE seed_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM seeds WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }
}

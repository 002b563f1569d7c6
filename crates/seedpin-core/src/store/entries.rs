//! Manifest entries: what each object of a seed is called and where it lives.

use anyhow::Result;
use sqlx::Row;

use super::db::SeedStore;
use super::types::{SearchHit, SeedEntry, SeedId};

impl SeedStore {
    /// Replace the recorded manifest of a seed with `entries`.
    pub async fn record_entries(&self, seed_id: SeedId, entries: &[SeedEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM seed_entries WHERE seed_id = ?1")
            .bind(seed_id)
            .execute(&mut *tx)
            .await?;
        for e in entries {
            sqlx::query(
                r#"
                INSERT INTO seed_entries (seed_id, obj_index, name, path, size, date_created)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(seed_id)
            .bind(e.obj_index)
            .bind(&e.name)
            .bind(&e.path)
            .bind(e.size)
            .bind(e.date_created)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_entries(&self, seed_id: SeedId) -> Result<Vec<SeedEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT seed_id, obj_index, name, path, size, date_created
            FROM seed_entries
            WHERE seed_id = ?1
            ORDER BY obj_index ASC
            "#,
        )
        .bind(seed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SeedEntry {
                seed_id: row.get("seed_id"),
                obj_index: row.get("obj_index"),
                name: row.get("name"),
                path: row.get("path"),
                size: row.get("size"),
                date_created: row.get("date_created"),
            })
            .collect())
    }

    /// Entries of non-hidden seeds created within `[date_from, date_to]`, newest first.
    /// Name matching is left to the caller.
    pub async fn entries_in_window(&self, date_from: i64, date_to: i64) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT e.seed_id, s.dag_cid, e.obj_index, e.name, e.date_created
            FROM seed_entries e
            JOIN seeds s ON s.id = e.seed_id
            WHERE s.hidden = 0
              AND e.date_created >= ?1
              AND e.date_created <= ?2
            ORDER BY e.date_created DESC, e.seed_id ASC, e.obj_index ASC
            "#,
        )
        .bind(date_from)
        .bind(date_to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SearchHit {
                seed_id: row.get("seed_id"),
                dag_cid: row.get("dag_cid"),
                obj_index: row.get("obj_index"),
                name: row.get("name"),
                date_created: row.get("date_created"),
            })
            .collect())
    }
}

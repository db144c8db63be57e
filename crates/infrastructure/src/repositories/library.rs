//! Per-user library entries

use crate::database::DatabasePool;
use crate::repositories::user::db_err;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use streamgate_core::Result;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    #[serde(rename = "imdb_id", skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub added_at: DateTime<Utc>,
}

pub struct LibraryRepository {
    pool: DatabasePool,
}

impl LibraryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<LibraryEntry> {
        Ok(LibraryEntry {
            id: row.try_get("id").map_err(db_err)?,
            imdb_id: row.try_get("imdb_id").map_err(db_err)?,
            content_type: row.try_get("type").map_err(db_err)?,
            name: row.try_get("name").map_err(db_err)?,
            poster: row.try_get("poster").map_err(db_err)?,
            year: row.try_get("year").map_err(db_err)?,
            added_at: row.try_get("added_at").map_err(db_err)?,
        })
    }

    /// Everything the user saved, channels included, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<LibraryEntry>> {
        let rows = sqlx::query(
            "SELECT id, imdb_id, type, name, poster, year, added_at
             FROM library WHERE user_id = $1 ORDER BY added_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(Self::parse_row).collect()
    }

    pub async fn add(&self, user_id: Uuid, entry: &LibraryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO library (user_id, id, imdb_id, type, name, poster, year, added_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, type, id)
             DO UPDATE SET name = EXCLUDED.name,
                           poster = EXCLUDED.poster,
                           year = EXCLUDED.year",
        )
        .bind(user_id)
        .bind(&entry.id)
        .bind(&entry.imdb_id)
        .bind(&entry.content_type)
        .bind(&entry.name)
        .bind(&entry.poster)
        .bind(entry.year)
        .bind(entry.added_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn remove(&self, user_id: Uuid, content_type: &str, id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM library WHERE user_id = $1 AND type = $2 AND id = $3")
                .bind(user_id)
                .bind(content_type)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

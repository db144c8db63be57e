//! Installed add-ons, one row per (user, manifest id)

use crate::database::DatabasePool;
use crate::manifest::AddonManifest;
use crate::repositories::user::db_err;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use streamgate_core::{GatewayError, Result, SourceDescriptor, SourceEndpoint};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AddonRecord {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "manifestUrl")]
    pub manifest_url: String,
    pub manifest: AddonManifest,
    #[serde(rename = "installedAt")]
    pub installed_at: DateTime<Utc>,
}

impl AddonRecord {
    /// Aggregator view of this add-on, present only when it serves streams.
    pub fn stream_descriptor(&self, protected: bool) -> Option<SourceDescriptor> {
        if !self.manifest.has_resource("stream") {
            return None;
        }
        Some(SourceDescriptor {
            id: self.manifest.id.clone(),
            display_name: self.manifest.name.clone(),
            supports_movies: self.manifest.supports_type("movie"),
            supports_series: self.manifest.supports_type("series"),
            endpoint: SourceEndpoint::Manifest {
                base_url: self.manifest_url.clone(),
            },
            requires_protection_bypass: protected,
        })
    }
}

pub struct AddonRepository {
    pool: DatabasePool,
}

impl AddonRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<AddonRecord> {
        let manifest_value: serde_json::Value = row.try_get("manifest").map_err(db_err)?;
        let manifest =
            AddonManifest::parse(manifest_value).ok_or_else(|| GatewayError::DatabaseError {
                message: "stored manifest is malformed".to_string(),
            })?;
        Ok(AddonRecord {
            id: row.try_get("id").map_err(db_err)?,
            user_id: row.try_get("user_id").map_err(db_err)?,
            manifest_url: row.try_get("manifest_url").map_err(db_err)?,
            manifest,
            installed_at: row.try_get("installed_at").map_err(db_err)?,
        })
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AddonRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, manifest_url, manifest, installed_at
             FROM addons WHERE user_id = $1 ORDER BY installed_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(Self::parse_row).collect()
    }

    /// Install or refresh: uniqueness is per (user, manifest id), so a
    /// reinstall updates the URL and manifest in place.
    pub async fn install(
        &self,
        user_id: Uuid,
        manifest_url: &str,
        manifest: &AddonManifest,
    ) -> Result<AddonRecord> {
        let manifest_value =
            serde_json::to_value(manifest).map_err(|e| GatewayError::Internal {
                message: format!("manifest serialization failed: {}", e),
            })?;
        let row = sqlx::query(
            "INSERT INTO addons (id, user_id, manifest_url, manifest, installed_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, ((manifest->>'id')))
             DO UPDATE SET manifest_url = EXCLUDED.manifest_url,
                           manifest = EXCLUDED.manifest,
                           installed_at = EXCLUDED.installed_at
             RETURNING id, user_id, manifest_url, manifest, installed_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(manifest_url)
        .bind(manifest_value)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Self::parse_row(&row)
    }

    /// Look up one of the user's add-ons by row id or manifest id.
    pub async fn find(&self, user_id: Uuid, addon_id: &str) -> Result<Option<AddonRecord>> {
        let row = match Uuid::parse_str(addon_id) {
            Ok(row_id) => sqlx::query(
                "SELECT id, user_id, manifest_url, manifest, installed_at
                 FROM addons WHERE user_id = $1 AND id = $2",
            )
            .bind(user_id)
            .bind(row_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
            Err(_) => sqlx::query(
                "SELECT id, user_id, manifest_url, manifest, installed_at
                 FROM addons WHERE user_id = $1 AND manifest->>'id' = $2",
            )
            .bind(user_id)
            .bind(addon_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
        };
        row.as_ref().map(Self::parse_row).transpose()
    }

    pub async fn uninstall(&self, user_id: Uuid, addon_id: &str) -> Result<bool> {
        let result = match Uuid::parse_str(addon_id) {
            Ok(row_id) => sqlx::query("DELETE FROM addons WHERE user_id = $1 AND id = $2")
                .bind(user_id)
                .bind(row_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?,
            Err(_) => {
                sqlx::query("DELETE FROM addons WHERE user_id = $1 AND manifest->>'id' = $2")
                    .bind(user_id)
                    .bind(addon_id)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?
            }
        };
        Ok(result.rows_affected() > 0)
    }
}

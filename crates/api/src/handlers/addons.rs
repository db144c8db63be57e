//! Add-on management and single-addon stream passthrough

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{InstallOutcome, InstallRequest, StreamsResponse};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::time::Duration;
use streamgate_connectors::{AddonStreamConnector, SourceConnector};
use streamgate_core::{ContentType, Fingerprint, TitleHint};
use streamgate_infrastructure::{fallback_manifest, AddonManifest, AddonRecord};
use tracing::{info, warn};

pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<AddonRecord>>> {
    let addons = state
        .addons
        .list_for_user(caller.id)
        .await
        .map_err(ApiError::Core)?;
    Ok(Json(addons))
}

/// Fetch, validate and store a manifest. Challenge-protected hosts that
/// defeat even the bypass fall back to the static manifest table; the two
/// failure modes surface as distinct 400s so clients can react.
async fn resolve_manifest(state: &AppState, manifest_url: &str) -> ApiResult<AddonManifest> {
    let fetched = state
        .fetch
        .get_json(manifest_url, Duration::from_secs(20))
        .await;

    match fetched {
        Ok(value) => AddonManifest::parse(value).ok_or_else(|| ApiError::BadRequest {
            message: "invalid manifest: missing id or name".to_string(),
        }),
        Err(e) => {
            warn!(url = %manifest_url, error = %e, "manifest fetch failed, trying fallback table");
            match fallback_manifest(manifest_url) {
                Some(manifest) => Ok(manifest),
                None if state.fetch.is_protected(manifest_url) => Err(ApiError::BadRequest {
                    message: "addon host is protected - fallback unavailable".to_string(),
                }),
                None => Err(ApiError::BadRequest {
                    message: format!("invalid manifest: {}", e),
                }),
            }
        }
    }
}

pub async fn install(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(request): Json<InstallRequest>,
) -> ApiResult<(StatusCode, Json<AddonRecord>)> {
    let manifest = resolve_manifest(&state, &request.manifest_url).await?;
    let record = state
        .addons
        .install(caller.id, &request.manifest_url, &manifest)
        .await
        .map_err(ApiError::Core)?;
    info!(addon = %record.manifest.id, user = %caller.username, "addon installed");
    Ok((StatusCode::CREATED, Json(record)))
}

/// Sequential install with partial success: each URL reports its own
/// outcome, the batch itself always succeeds.
pub async fn install_multiple(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(urls): Json<Vec<String>>,
) -> ApiResult<Json<Vec<InstallOutcome>>> {
    let mut outcomes = Vec::with_capacity(urls.len());
    for url in urls {
        let outcome = match resolve_manifest(&state, &url).await {
            Ok(manifest) => match state.addons.install(caller.id, &url, &manifest).await {
                Ok(_) => InstallOutcome {
                    url,
                    ok: true,
                    error: None,
                },
                Err(e) => InstallOutcome {
                    url,
                    ok: false,
                    error: Some(e.to_string()),
                },
            },
            Err(e) => InstallOutcome {
                url,
                ok: false,
                error: Some(e.to_string()),
            },
        };
        outcomes.push(outcome);
    }
    Ok(Json(outcomes))
}

pub async fn uninstall(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(addon_id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = state
        .addons
        .uninstall(caller.id, &addon_id)
        .await
        .map_err(ApiError::Core)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound {
            resource: format!("addon {}", addon_id),
        })
    }
}

/// Single-addon stream passthrough, bypassing aggregation.
pub async fn addon_streams(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((addon_id, content_type, content_id)): Path<(String, String, String)>,
) -> ApiResult<Json<StreamsResponse>> {
    let record = state
        .addons
        .find(caller.id, &addon_id)
        .await
        .map_err(ApiError::Core)?
        .ok_or_else(|| ApiError::NotFound {
            resource: format!("addon {}", addon_id),
        })?;

    let content_type = ContentType::parse(&content_type).ok_or_else(|| ApiError::BadRequest {
        message: format!("unknown content type '{}'", content_type),
    })?;
    let fingerprint = Fingerprint::new(content_type, content_id);

    let connector = AddonStreamConnector::new(
        record.manifest.name.clone(),
        &record.manifest_url,
        record.manifest.supports_type("movie"),
        record.manifest.supports_type("series"),
        state.fetch.clone(),
    );

    let mut streams = connector
        .fetch(&fingerprint, &TitleHint::default())
        .await
        .map_err(ApiError::Core)?;
    for stream in &mut streams {
        stream.source_tag = record.manifest.name.clone();
    }
    Ok(Json(StreamsResponse { streams }))
}

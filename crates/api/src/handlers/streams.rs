//! Aggregated stream list and subtitles

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::StreamsResponse;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use streamgate_connectors::{DirectUrlConnector, SourceConnector, TvChannelConnector};
use streamgate_core::{ContentType, Fingerprint, SourceDescriptor, TitleHint};
use streamgate_infrastructure::SubtitleTrack;
use tracing::debug;

/// The aggregated stream list. Routing by id shape: URL ids resolve
/// directly, `ustv*` ids go to the TV connector, everything else fans out
/// across the caller's add-ons plus the built-in indexers.
pub async fn aggregated(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((content_type, content_id)): Path<(String, String)>,
) -> ApiResult<Json<StreamsResponse>> {
    let content_type = ContentType::parse(&content_type).ok_or_else(|| ApiError::BadRequest {
        message: format!("unknown content type '{}'", content_type),
    })?;
    let fingerprint = Fingerprint::new(content_type, content_id);

    if fingerprint.is_url_id() {
        let streams = DirectUrlConnector
            .fetch(&fingerprint, &TitleHint::default())
            .await
            .map_err(ApiError::Core)?;
        return Ok(Json(StreamsResponse { streams }));
    }

    if fingerprint.is_tv_channel() {
        let connector = TvChannelConnector::new(state.tv_addon_base.clone(), state.fetch.clone());
        let streams = connector
            .fetch(&fingerprint, &TitleHint::default())
            .await
            .unwrap_or_default();
        return Ok(Json(StreamsResponse { streams }));
    }

    // best-effort title hint; an empty hint just skips the free-text
    // built-ins while add-on connectors still run
    let hint = state.metadata.title_hint(&fingerprint).await;
    debug!(content_id = %fingerprint.content_id, title = ?hint.title, "aggregating streams");

    let descriptors = stream_descriptors(&state, caller.id).await?;
    let streams = state
        .aggregator
        .aggregate(&fingerprint, &descriptors, &hint)
        .await;
    Ok(Json(StreamsResponse { streams }))
}

pub(crate) async fn stream_descriptors(
    state: &AppState,
    user_id: uuid::Uuid,
) -> ApiResult<Vec<SourceDescriptor>> {
    let addons = state
        .addons
        .list_for_user(user_id)
        .await
        .map_err(ApiError::Core)?;
    Ok(addons
        .iter()
        .filter_map(|record| {
            record.stream_descriptor(state.fetch.is_protected(&record.manifest_url))
        })
        .collect())
}

/// Available subtitle tracks, one per language, English first.
pub async fn subtitles(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path((content_type, content_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<SubtitleTrack>>> {
    let content_type = ContentType::parse(&content_type).ok_or_else(|| ApiError::BadRequest {
        message: format!("unknown content type '{}'", content_type),
    })?;
    let fingerprint = Fingerprint::new(content_type, content_id);
    let tracks = state
        .subtitles
        .list(&fingerprint)
        .await
        .unwrap_or_default();
    Ok(Json(tracks))
}

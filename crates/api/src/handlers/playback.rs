//! Swarm playback: start, status, and the video byte pipe

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, SwarmBackend};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde_json::json;
use streamgate_core::{InfoHash, SessionStatus};
use streamgate_media::helper::is_hop_by_hop;
use streamgate_media::{open_media_stream, CHUNK_SIZE};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

fn parse_hash(raw: &str) -> Option<InfoHash> {
    InfoHash::parse(raw).ok()
}

/// Range header of the form `bytes={start}-...`; only the start offset is
/// honored on a locally synthesized stream.
fn range_start(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?
        .split('-')
        .next()?
        .parse()
        .ok()
}

/// Idempotently ensure a swarm session and prime downloads. Returns
/// immediately; readiness is the status endpoint's story.
pub async fn start(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(raw_hash): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let hash = parse_hash(&raw_hash).ok_or_else(|| ApiError::BadRequest {
        message: format!("invalid info hash '{}'", raw_hash),
    })?;

    match &state.backend {
        SwarmBackend::Embedded(sessions) => {
            sessions.ensure_session(&hash).await.map_err(ApiError::Core)?;
        }
        SwarmBackend::Helper(helper) => {
            helper.start(hash.as_str());
        }
    }

    info!(info_hash = %hash, "stream start requested");
    Ok(Json(json!({ "status": "started", "info_hash": hash.as_str() })))
}

/// Status snapshot; malformed hashes report `invalid` rather than erroring
/// so pollers keep a single code path.
pub async fn status(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(raw_hash): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(hash) = parse_hash(&raw_hash) else {
        return Ok(Json(
            serde_json::to_value(SessionStatus::bare("invalid")).unwrap_or_default(),
        ));
    };

    let value = match &state.backend {
        SwarmBackend::Embedded(sessions) => {
            serde_json::to_value(sessions.status(&hash).await).unwrap_or_default()
        }
        SwarmBackend::Helper(helper) => helper
            .status(hash.as_str())
            .await
            .map_err(ApiError::Core)?,
    };
    Ok(Json(value))
}

/// The long-lived video byte pipe. Honors Range; terminates the media
/// tool when the client goes away; never tears the session down.
pub async fn video(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(raw_hash): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let hash = parse_hash(&raw_hash).ok_or_else(|| ApiError::BadRequest {
        message: format!("invalid info hash '{}'", raw_hash),
    })?;

    match &state.backend {
        SwarmBackend::Embedded(sessions) => {
            let video = sessions.video_source(&hash).await.map_err(ApiError::Core)?;
            let start = range_start(&headers);
            debug!(info_hash = %hash, file = %video.path.display(), ?start, "opening media pipe");

            let media = open_media_stream(&video.path, start)
                .await
                .map_err(ApiError::Core)?;

            let status = if media.partial {
                StatusCode::PARTIAL_CONTENT
            } else {
                StatusCode::OK
            };
            let first = media.first_chunk.clone();
            let body = Body::from_stream(
                futures::stream::once(async move { Ok::<_, std::io::Error>(first) })
                    .chain(ReaderStream::with_capacity(media.pipe, CHUNK_SIZE)),
            );

            let response = Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "video/mp4")
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
                .map_err(|e| ApiError::Core(streamgate_core::GatewayError::Internal {
                    message: format!("response build failed: {}", e),
                }))?;
            Ok(response)
        }
        SwarmBackend::Helper(helper) => {
            let range = headers
                .get(header::RANGE)
                .and_then(|value| value.to_str().ok());
            let upstream = helper
                .stream(hash.as_str(), range)
                .await
                .map_err(ApiError::Core)?;

            // relay status and headers, minus the hop-by-hop set
            let status = StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response_headers = HeaderMap::new();
            for (name, value) in upstream.headers() {
                if is_hop_by_hop(name.as_str()) {
                    continue;
                }
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_str().as_bytes()),
                    HeaderValue::from_bytes(value.as_bytes()),
                ) {
                    response_headers.insert(name, value);
                }
            }

            let body = Body::from_stream(upstream.bytes_stream());
            let mut response = (status, body).into_response();
            response.headers_mut().extend(response_headers);
            Ok(response)
        }
    }
}

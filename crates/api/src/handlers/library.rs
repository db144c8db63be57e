//! Per-user library CRUD

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::LibraryAddRequest;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use streamgate_infrastructure::LibraryEntry;

pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<LibraryEntry>>> {
    let entries = state
        .library
        .list_for_user(caller.id)
        .await
        .map_err(ApiError::Core)?;
    Ok(Json(entries))
}

pub async fn add(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(request): Json<LibraryAddRequest>,
) -> ApiResult<(StatusCode, Json<LibraryEntry>)> {
    let entry = LibraryEntry {
        id: request.id,
        imdb_id: request.imdb_id,
        content_type: request.content_type,
        name: request.name,
        poster: request.poster,
        year: request.year,
        added_at: chrono::Utc::now(),
    };
    state
        .library
        .add(caller.id, &entry)
        .await
        .map_err(ApiError::Core)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn remove(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((content_type, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let removed = state
        .library
        .remove(caller.id, &content_type, &id)
        .await
        .map_err(ApiError::Core)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound {
            resource: format!("library entry {}/{}", content_type, id),
        })
    }
}

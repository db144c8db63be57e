//! Login and identity

use crate::auth::{verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::models::{LoginRequest, LoginResponse, PublicUser};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use tracing::info;

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .users
        .find_by_username(&request.username)
        .await
        .map_err(ApiError::Core)?;

    // same response for unknown user and wrong password
    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => return Err(ApiError::Unauthorized),
    };

    let token = state
        .auth
        .issue(user.id, &user.username, user.is_admin)
        .map_err(ApiError::Core)?;

    info!(username = %user.username, "login succeeded");
    Ok(Json(LoginResponse {
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
        },
        token,
    }))
}

pub async fn me(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<PublicUser>> {
    let user = state
        .users
        .find_by_id(caller.id)
        .await
        .map_err(ApiError::Core)?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
        is_admin: user.is_admin,
    }))
}

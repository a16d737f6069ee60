// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{ApiKeyRequest, ProfileResponse},
    session::StepEvent,
    state::AppState,
    utils::jwt::Claims,
};

/// Get the current user's profile.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .store
        .find_user(claims.user_id()?)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfileResponse::from(user)))
}

/// Store the question generator API key.
pub async fn set_api_key(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let api_key = payload.api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(AppError::BadRequest("API key cannot be empty.".to_string()));
    }
    ApiKeyRequest {
        api_key: api_key.clone(),
    }
    .validate()?;

    state.store.set_api_key(user_id, Some(api_key)).await?;

    // Only moves the session when it is waiting on the key.
    let step = state
        .sessions
        .apply(user_id, StepEvent::ApiKeySaved)
        .await
        .ok();

    Ok(Json(json!({
        "message": "API key saved",
        "step": step
    })))
}

pub async fn clear_api_key(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    state.store.set_api_key(user_id, None).await?;
    let step = state
        .sessions
        .apply(user_id, StepEvent::ApiKeyCleared)
        .await?;

    Ok(Json(json!({
        "message": "API key removed",
        "step": step
    })))
}

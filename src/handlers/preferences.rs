// src/handlers/preferences.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::{
    error::AppError,
    models::preferences::QuizPreferences,
    services::preferences::{SubmitIntent, submit_preferences},
    session::StepEvent,
    state::AppState,
    utils::jwt::Claims,
};

/// Stored preferences, or the defaults when nothing was saved yet.
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let prefs = state
        .store
        .load_preferences(claims.user_id()?)
        .await?
        .unwrap_or_default();

    Ok(Json(prefs))
}

pub async fn save_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuizPreferences>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    submit_preferences(
        state.store.as_ref(),
        &state.config,
        user_id,
        payload.clone(),
        SubmitIntent::Save,
    )
    .await?;

    // Saving is allowed from anywhere; only the editor steps record it.
    let step = state
        .sessions
        .apply(user_id, StepEvent::PreferencesSaved)
        .await
        .ok();

    Ok(Json(json!({
        "preferences": payload,
        "step": step
    })))
}

// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::navigator::determine_step,
    session::{Mode, StepEvent},
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct StepQuery {
    /// Lobby deep link.
    pub lobby: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: Mode,
}

/// Raw session state, without re-resolving anything.
pub async fn view(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.sessions.view(claims.user_id()?).await;
    Ok(Json(view))
}

/// Resolves which step to show on load, reconnect, or a lobby link.
pub async fn resolve_step(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StepQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let step = determine_step(&state, user_id, query.lobby).await?;
    let competition_id = state.sessions.held_competition(user_id).await;

    Ok(Json(json!({
        "step": step,
        "competition_id": competition_id
    })))
}

pub async fn choose_mode(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ModeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let step = state
        .sessions
        .apply(claims.user_id()?, StepEvent::ModeChosen(payload.mode))
        .await?;
    Ok(Json(json!({ "step": step })))
}

pub async fn back(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let step = state
        .sessions
        .apply(claims.user_id()?, StepEvent::Back)
        .await?;
    Ok(Json(json!({ "step": step })))
}

pub async fn manage(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let step = state
        .sessions
        .apply(claims.user_id()?, StepEvent::ManageCompetitions)
        .await?;
    Ok(Json(json!({ "step": step })))
}

/// Picks one of the user's competitions and routes by its status.
pub async fn select_competition(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let (status, member) = tokio::join!(
        state.store.competition_status(id),
        state.store.is_participant(id, user_id)
    );
    let status = status?.ok_or(AppError::NotFound("Competition not found".to_string()))?;
    if !member? {
        return Err(AppError::Forbidden(
            "You are not part of this competition".to_string(),
        ));
    }

    let step = state
        .sessions
        .enter_competition(user_id, id, StepEvent::CompetitionSelected(status))
        .await?;
    Ok(Json(json!({
        "step": step,
        "competition_id": id
    })))
}

pub async fn clear_competition(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let step = state
        .sessions
        .clear_competition(claims.user_id()?)
        .await?;
    Ok(Json(json!({ "step": step })))
}

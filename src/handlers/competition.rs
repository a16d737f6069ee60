// src/handlers/competition.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::competition::{
        CompetitionDetail, CompetitionStatusResponse, CreateCompetitionRequest,
        JoinCompetitionRequest, RandomMatchRequest, SubmitCompetitionRequest,
    },
    services::{
        competition as service,
        preferences::{SubmitIntent, submit_preferences},
    },
    session::{SessionRegistry, Step, StepEvent},
    state::AppState,
    utils::jwt::Claims,
};

/// Moves the session into the competition when the event fits its current
/// step. API clients that skip the mode selector simply get no step back.
async fn follow(
    sessions: &SessionRegistry,
    user_id: i64,
    competition_id: Uuid,
    event: StepEvent,
) -> Option<Step> {
    match sessions
        .enter_competition(user_id, competition_id, event)
        .await
    {
        Ok(step) => Some(step),
        Err(e) => {
            tracing::debug!("Session of user {} not moved: {}", user_id, e);
            None
        }
    }
}

/// Saves the submitted preferences, then creates a competition from them.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCompetitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let competition = submit_preferences(
        state.store.as_ref(),
        &state.config,
        user_id,
        payload.preferences,
        SubmitIntent::StartCompetition(payload.competition),
    )
    .await?
    .ok_or(AppError::InternalServerError(
        "Competition was not created".to_string(),
    ))?;

    let step = follow(
        &state.sessions,
        user_id,
        competition.id,
        StepEvent::CompetitionCreated,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "competition": competition,
            "step": step
        })),
    ))
}

pub async fn join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinCompetitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let competition = service::join_by_code(state.store.as_ref(), user_id, &payload.code).await?;
    let step = follow(
        &state.sessions,
        user_id,
        competition.id,
        StepEvent::CompetitionJoined,
    )
    .await;

    Ok(Json(json!({
        "competition": competition,
        "step": step
    })))
}

pub async fn random_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RandomMatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let outcome =
        service::random_match(state.store.as_ref(), &state.config, user_id, payload.course)
            .await?;

    let event = if outcome.created {
        StepEvent::CompetitionCreated
    } else {
        StepEvent::CompetitionJoined
    };
    let step = follow(&state.sessions, user_id, outcome.competition.id, event).await;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "competition": outcome.competition,
            "created": outcome.created,
            "step": step
        })),
    ))
}

/// Competitions the user hosts or joined.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let competitions = state
        .store
        .competitions_for_user(claims.user_id()?)
        .await?;
    Ok(Json(competitions))
}

/// Waiting and active competitions the user is part of.
pub async fn list_active(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let competitions = state
        .store
        .active_competitions_for_user(claims.user_id()?)
        .await?;
    Ok(Json(competitions))
}

pub async fn get_competition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let competition = service::load(state.store.as_ref(), id).await?;
    let participants = state.store.participants(id).await?;
    Ok(Json(CompetitionDetail {
        competition,
        participants,
    }))
}

/// Cheap status poll used by lobbies and the step router.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = state
        .store
        .competition_status(id)
        .await?
        .ok_or(AppError::NotFound("Competition not found".to_string()))?;
    let remaining_secs = state.sessions.competition_remaining(id).await;

    Ok(Json(CompetitionStatusResponse {
        id,
        status,
        remaining_secs,
    }))
}

pub async fn participants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service::load(state.store.as_ref(), id).await?;
    let participants = state.store.participants(id).await?;
    Ok(Json(participants))
}

pub async fn start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let competition = service::start(&state, claims.user_id()?, id).await?;
    Ok(Json(competition))
}

pub async fn questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let questions = service::questions(state.store.as_ref(), claims.user_id()?, id).await?;
    Ok(Json(questions))
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitCompetitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = service::submit(&state, claims.user_id()?, id, payload.answers).await?;
    Ok(Json(result))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let competition = service::complete(&state, claims.user_id()?, id).await?;
    Ok(Json(competition))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let board = service::standings(state.store.as_ref(), claims.user_id()?, id).await?;
    Ok(Json(board))
}

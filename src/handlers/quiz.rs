// src/handlers/quiz.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::question::QuestionFilter,
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub index: usize,
}

/// Generates a solo quiz from the stored preferences.
///
/// Requires a stored API key and saved preferences. Questions are drawn at
/// random from the bank, filtered by course, topic, difficulty, language and
/// question types.
pub async fn generate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let (user, prefs) = tokio::join!(
        state.store.find_user(user_id),
        state.store.load_preferences(user_id)
    );
    let user = user?.ok_or(AppError::NotFound("User not found".to_string()))?;
    if !user.has_api_key() {
        return Err(AppError::BadRequest(
            "Add an API key before generating questions".to_string(),
        ));
    }
    let prefs = prefs?.ok_or(AppError::BadRequest(
        "Save your quiz preferences first".to_string(),
    ))?;

    let questions = state
        .store
        .draw_questions(&QuestionFilter::from_preferences(&prefs))
        .await
        .map_err(|e| {
            tracing::error!("Failed to draw questions for user {}: {}", user_id, e);
            e
        })?;

    let quiz = state.sessions.start_quiz(user_id, prefs, questions).await?;
    tracing::info!("User {} started a {}-question quiz", user_id, quiz.total);

    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn current(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.sessions.current(claims.user_id()?).await?;
    Ok(Json(quiz))
}

pub async fn answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .sessions
        .answer(claims.user_id()?, payload.question_id, payload.answer)
        .await?;
    Ok(Json(outcome))
}

pub async fn navigate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state
        .sessions
        .navigate(claims.user_id()?, payload.index)
        .await?;
    Ok(Json(quiz))
}

/// Submits the quiz. Calling it again returns the same result.
pub async fn finish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let result = state.sessions.finish(user_id).await?;
    tracing::info!(
        "User {} finished quiz: {}/{} correct, score {}",
        user_id,
        result.correct_count,
        result.total_questions,
        result.score
    );
    Ok(Json(result))
}

pub async fn result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.sessions.result(claims.user_id()?).await?;
    Ok(Json(result))
}

pub async fn retake(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let step = state.sessions.retake(claims.user_id()?).await?;
    Ok(Json(json!({ "step": step })))
}

pub async fn reset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let step = state.sessions.reset(claims.user_id()?).await;
    Ok(Json(json!({ "step": step })))
}

// src/handlers/questions.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, QuestionType},
    store::Store,
    utils::html::clean_html,
};

/// Admin: add a question to the bank.
pub async fn create_question(
    State(store): State<Arc<dyn Store>>,
    Json(mut payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    match payload.question_type {
        QuestionType::Single | QuestionType::Multiple if payload.options.len() < 2 => {
            return Err(AppError::BadRequest(
                "Choice questions need at least two options".to_string(),
            ));
        }
        QuestionType::TrueFalse | QuestionType::FillBlank if !payload.options.is_empty() => {
            payload.options.clear();
        }
        _ => {}
    }

    payload.content = clean_html(&payload.content);
    payload.analysis = payload.analysis.as_deref().map(clean_html);

    let question = store.insert_question(payload).await?;
    tracing::info!(
        "Added {} question {} to {}",
        question.question_type,
        question.id,
        question.course
    );

    Ok((StatusCode::CREATED, Json(question)))
}

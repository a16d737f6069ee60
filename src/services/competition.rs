// src/services/competition.rs

use std::{collections::HashMap, time::Duration};

use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        competition::{
            Competition, CompetitionStatus, CompetitionType, LeaderboardEntry, NewCompetition,
            leaderboard,
        },
        preferences::QuizPreferences,
        question::{PublicQuestion, QuestionFilter, same_label},
        quiz_result::{FinishReason, QuizResult},
    },
    services::preferences::{default_description, default_title},
    session::StepEvent,
    state::AppState,
    store::{JoinOutcome, Store},
    utils::code::{generate_code, is_complete_code, normalize_code},
};

/// Creates a competition under a fresh code, retrying on code collisions.
/// The store enrolls the host as first participant.
#[allow(clippy::too_many_arguments)]
pub async fn create_competition(
    store: &dyn Store,
    config: &Config,
    host_id: i64,
    title: String,
    description: String,
    competition_type: CompetitionType,
    preferences: QuizPreferences,
    invited_emails: Vec<String>,
) -> Result<Competition, AppError> {
    for attempt in 1..=config.code_generation_attempts {
        let code = generate_code(&mut rand::thread_rng());
        let new = NewCompetition {
            title: title.clone(),
            description: description.clone(),
            competition_type,
            competition_code: code.clone(),
            host_id,
            preferences: preferences.clone(),
            invited_emails: invited_emails.clone(),
        };

        match store.insert_competition(new).await {
            Ok(competition) => {
                tracing::info!(
                    "User {} created competition {} ({})",
                    host_id,
                    competition.id,
                    competition.competition_code
                );
                return Ok(competition);
            }
            Err(AppError::Conflict(_)) => {
                tracing::warn!("Competition code {} taken (attempt {})", code, attempt);
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::InternalServerError(
        "Could not allocate a unique competition code".to_string(),
    ))
}

/// Joins a waiting competition by its code. Joining twice is a no-op.
pub async fn join_by_code(
    store: &dyn Store,
    user_id: i64,
    raw_code: &str,
) -> Result<Competition, AppError> {
    let code = normalize_code(raw_code);
    if !is_complete_code(&code) {
        return Err(AppError::BadRequest(
            "Competition code must be 6 letters or digits".to_string(),
        ));
    }

    let competition = store
        .find_competition_by_code(&code)
        .await?
        .ok_or(AppError::NotFound("No competition with that code".to_string()))?;

    match store.add_participant(competition.id, user_id).await? {
        JoinOutcome::Joined => {
            tracing::info!("User {} joined competition {}", user_id, competition.id);
            Ok(competition)
        }
        JoinOutcome::AlreadyJoined => Ok(competition),
        JoinOutcome::Closed => Err(AppError::Conflict(
            "Competition is no longer accepting participants".to_string(),
        )),
    }
}

/// Outcome of a random match.
#[derive(Debug)]
pub struct MatchOutcome {
    pub competition: Competition,
    /// `true` when no open competition existed and a new one was hosted.
    pub created: bool,
}

/// Joins the oldest open public competition, preferring one on the user's
/// course. Hosts a new public competition from the stored preferences when
/// nothing is open.
pub async fn random_match(
    store: &dyn Store,
    config: &Config,
    user_id: i64,
    course: Option<String>,
) -> Result<MatchOutcome, AppError> {
    let stored = store.load_preferences(user_id).await?;
    let course = course
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| stored.as_ref().map(|p| p.course.trim().to_string()))
        .unwrap_or_default();

    // Course matches first, then everything else; both oldest first.
    let (mut candidates, rest): (Vec<Competition>, Vec<Competition>) = store
        .open_public_competitions(user_id)
        .await?
        .into_iter()
        .partition(|c| !course.is_empty() && same_label(c.preferences.course.trim(), &course));
    candidates.extend(rest);

    for competition in candidates {
        match store.add_participant(competition.id, user_id).await? {
            JoinOutcome::Joined | JoinOutcome::AlreadyJoined => {
                tracing::info!("Random match put user {} in {}", user_id, competition.id);
                return Ok(MatchOutcome {
                    competition,
                    created: false,
                });
            }
            JoinOutcome::Closed => {
                tracing::debug!(
                    "Competition {} started before user {} got in",
                    competition.id,
                    user_id
                );
            }
        }
    }

    let mut preferences = stored.unwrap_or_default();
    if !course.is_empty() {
        preferences.course = course;
    }
    preferences
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Save your quiz preferences first: {e}")))?;

    let competition = create_competition(
        store,
        config,
        user_id,
        default_title(&preferences),
        default_description(&preferences),
        CompetitionType::Public,
        preferences,
        Vec::new(),
    )
    .await?;

    Ok(MatchOutcome {
        competition,
        created: true,
    })
}

pub async fn load(store: &dyn Store, id: Uuid) -> Result<Competition, AppError> {
    store
        .find_competition(id)
        .await?
        .ok_or(AppError::NotFound("Competition not found".to_string()))
}

async fn load_as_participant(
    store: &dyn Store,
    id: Uuid,
    user_id: i64,
) -> Result<Competition, AppError> {
    let competition = load(store, id).await?;
    if !store.is_participant(id, user_id).await? {
        return Err(AppError::Forbidden(
            "You are not part of this competition".to_string(),
        ));
    }
    Ok(competition)
}

async fn load_as_host(store: &dyn Store, id: Uuid, user_id: i64) -> Result<Competition, AppError> {
    let competition = load(store, id).await?;
    if competition.host_id != user_id {
        return Err(AppError::Forbidden(
            "Only the host can do that".to_string(),
        ));
    }
    Ok(competition)
}

/// Host starts a waiting competition: draws its questions, flips it to
/// active, and arms the competition countdown when a total limit is set.
pub async fn start(state: &AppState, user_id: i64, id: Uuid) -> Result<Competition, AppError> {
    let store = state.store.as_ref();
    let competition = load_as_host(store, id, user_id).await?;
    if competition.status != CompetitionStatus::Waiting {
        return Err(AppError::Conflict("Competition already started".to_string()));
    }

    let questions = store
        .draw_questions(&QuestionFilter::from_preferences(&competition.preferences))
        .await?;
    if questions.is_empty() {
        return Err(AppError::BadRequest(
            "No questions match this competition's preferences".to_string(),
        ));
    }
    if !store.activate_competition(id, &questions).await? {
        return Err(AppError::Conflict("Competition already started".to_string()));
    }
    tracing::info!(
        "Competition {} started with {} questions",
        id,
        questions.len()
    );

    if let Some(secs) = competition.preferences.total_countdown() {
        let hook_state = state.clone();
        state
            .sessions
            .arm_competition(id, Duration::from_secs(u64::from(secs)), move || async move {
                hook_state.sessions.release_competition(id).await;
                match finish(&hook_state, id).await {
                    Ok(true) => tracing::info!("Competition {} time expired", id),
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Failed to close expired competition {}: {}", id, e),
                }
            })
            .await;
    }

    notify_participants(state, id, CompetitionStatus::Active).await?;
    load(store, id).await
}

/// Questions for an active competition, without answers.
pub async fn questions(
    store: &dyn Store,
    user_id: i64,
    id: Uuid,
) -> Result<Vec<PublicQuestion>, AppError> {
    let competition = load_as_participant(store, id, user_id).await?;
    if competition.status != CompetitionStatus::Active {
        return Err(AppError::Conflict("Competition is not active".to_string()));
    }
    let questions = store.competition_questions(id).await?;
    Ok(questions.iter().map(|q| q.to_public()).collect())
}

/// Grades and records one participant's answers. The competition completes
/// once everybody has submitted.
pub async fn submit(
    state: &AppState,
    user_id: i64,
    id: Uuid,
    answers: HashMap<i64, String>,
) -> Result<QuizResult, AppError> {
    let store = state.store.as_ref();
    let competition = load_as_participant(store, id, user_id).await?;
    if competition.status != CompetitionStatus::Active {
        return Err(AppError::Conflict("Competition is not active".to_string()));
    }

    let questions = store.competition_questions(id).await?;
    let result = QuizResult::grade(
        &questions,
        &answers,
        &competition.preferences,
        FinishReason::Submitted,
    );

    if !store
        .record_submission(id, user_id, result.score, result.correct_count as i32)
        .await?
    {
        return Err(AppError::Conflict("Answers already submitted".to_string()));
    }
    tracing::info!(
        "User {} submitted to competition {}: score {}",
        user_id,
        id,
        result.score
    );

    if state.sessions.held_competition(user_id).await == Some(id) {
        if let Err(e) = state
            .sessions
            .apply(user_id, StepEvent::CompetitionSubmitted)
            .await
        {
            tracing::debug!("Session of user {} not on the competition quiz: {}", user_id, e);
        }
    }

    let participants = store.participants(id).await?;
    if participants.iter().all(|p| p.has_submitted()) {
        state.sessions.disarm_competition(id).await;
        finish(state, id).await?;
    }

    Ok(result)
}

/// Host ends an active competition early.
pub async fn complete(state: &AppState, user_id: i64, id: Uuid) -> Result<Competition, AppError> {
    let store = state.store.as_ref();
    load_as_host(store, id, user_id).await?;
    state.sessions.disarm_competition(id).await;
    if !finish(state, id).await? {
        return Err(AppError::Conflict("Competition is not active".to_string()));
    }
    load(store, id).await
}

/// Moves an active competition to completed. Returns `false` when it was not active.
async fn finish(state: &AppState, id: Uuid) -> Result<bool, AppError> {
    let closed = state
        .store
        .transition_competition(id, CompetitionStatus::Active, CompetitionStatus::Completed)
        .await?;
    if closed {
        tracing::info!("Competition {} completed", id);
        notify_participants(state, id, CompetitionStatus::Completed).await?;
    }
    Ok(closed)
}

async fn notify_participants(
    state: &AppState,
    id: Uuid,
    status: CompetitionStatus,
) -> Result<(), AppError> {
    for participant in state.store.participants(id).await? {
        state
            .sessions
            .competition_status_changed(participant.user_id, id, status)
            .await;
    }
    Ok(())
}

pub async fn standings(
    store: &dyn Store,
    user_id: i64,
    id: Uuid,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    load_as_participant(store, id, user_id).await?;
    let participants = store.participants(id).await?;
    Ok(leaderboard(&participants))
}

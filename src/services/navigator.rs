// src/services/navigator.rs

use uuid::Uuid;

use crate::{
    error::AppError,
    session::{
        Step,
        registry::SessionBasis,
        step::{CompetitionRef, LoadedCompetition, RevalidationFailed, Snapshot, resolve},
    },
    state::AppState,
};

/// Resolution retries before giving up on a session that keeps changing.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Derives the step for a page load or reconnect and commits it.
///
/// Backend reads run concurrently against a snapshot stamped with the session
/// epoch. If an event lands while they are in flight the resolution is
/// thrown away and computed again from fresh data.
pub async fn determine_step(
    state: &AppState,
    user_id: i64,
    lobby: Option<Uuid>,
) -> Result<Step, AppError> {
    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        let basis = state.sessions.basis(user_id).await;
        let snapshot = gather(state, user_id, basis, lobby).await?;

        let resolution = resolve(&snapshot).map_err(|RevalidationFailed(id)| {
            tracing::error!(
                "Could not re-validate competition {} for user {}",
                id,
                user_id
            );
            AppError::AuthError("Session could not be verified".to_string())
        })?;

        if let Some(step) = state
            .sessions
            .commit(user_id, basis.epoch, resolution)
            .await
        {
            tracing::debug!("User {} resolved to {:?}", user_id, step);
            return Ok(step);
        }
        tracing::debug!(
            "Discarded stale step resolution for user {} (attempt {})",
            user_id,
            attempt
        );
    }

    Err(AppError::Conflict(
        "Session changed while resolving its step".to_string(),
    ))
}

async fn gather(
    state: &AppState,
    user_id: i64,
    basis: SessionBasis,
    lobby: Option<Uuid>,
) -> Result<Snapshot, AppError> {
    let store = state.store.as_ref();

    let directive = async {
        let id = lobby?;
        match store.competition_status(id).await {
            Ok(Some(status)) => Some(CompetitionRef { id, status }),
            Ok(None) => {
                tracing::debug!("Ignoring lobby link to unknown competition {}", id);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring lobby link to {}: {}", id, e);
                None
            }
        }
    };

    let held = async {
        let Some(id) = basis.competition else {
            return LoadedCompetition::None;
        };
        match store.competition_status(id).await {
            Ok(Some(status)) => LoadedCompetition::Present(CompetitionRef { id, status }),
            Ok(None) => LoadedCompetition::Missing(id),
            Err(e) => {
                tracing::warn!("Status read for competition {} failed: {}", id, e);
                LoadedCompetition::Unavailable(id)
            }
        }
    };

    let (user, active, directive, loaded) = tokio::join!(
        store.find_user(user_id),
        store.active_competitions_for_user(user_id),
        directive,
        held,
    );

    let user = user?.ok_or(AppError::AuthError("User not found".to_string()))?;
    let active = active?
        .into_iter()
        .map(|c| CompetitionRef {
            id: c.id,
            status: c.status,
        })
        .collect();

    Ok(Snapshot {
        directive,
        active,
        loaded,
        has_api_key: user.has_api_key(),
        has_result: basis.has_result,
        has_questions: basis.has_questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        config::Config,
        models::{
            competition::{CompetitionStatus, CompetitionType, NewCompetition},
            preferences::QuizPreferences,
            user::NewUser,
        },
        session::StepEvent,
        store::{CompetitionStore, MemoryStore, UserStore},
    };

    async fn app_with_user(api_key: Option<&str>) -> (AppState, i64) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                email: "nav@quiz.io".to_string(),
                name: "Nav".to_string(),
                phone: None,
                password_hash: "hash".to_string(),
                role: "user".to_string(),
            })
            .await
            .unwrap();
        store
            .set_api_key(user.id, api_key.map(str::to_string))
            .await
            .unwrap();
        (
            AppState::new(Arc::new(store), Config::for_memory("test")),
            user.id,
        )
    }

    async fn host(state: &AppState, host_id: i64, code: &str) -> Uuid {
        state
            .store
            .insert_competition(NewCompetition {
                title: "Quiz night".to_string(),
                description: String::new(),
                competition_type: CompetitionType::Private,
                competition_code: code.to_string(),
                host_id,
                preferences: QuizPreferences::default(),
                invited_emails: Vec::new(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_without_key_or_competitions_lands_on_api_key() {
        let (state, user) = app_with_user(None).await;
        assert_eq!(
            determine_step(&state, user, None).await.unwrap(),
            Step::ApiKey
        );
    }

    #[tokio::test]
    async fn test_with_key_lands_on_mode_selector() {
        let (state, user) = app_with_user(Some("sk-test")).await;
        assert_eq!(
            determine_step(&state, user, None).await.unwrap(),
            Step::ModeSelector
        );
    }

    #[tokio::test]
    async fn test_single_active_competition_is_selected() {
        let (state, user) = app_with_user(None).await;
        let id = host(&state, user, "AAAAAA").await;

        let step = determine_step(&state, user, None).await.unwrap();
        assert_eq!(step, Step::CompetitionLobby);
        assert_eq!(state.sessions.held_competition(user).await, Some(id));
    }

    #[tokio::test]
    async fn test_several_active_competitions_open_selector() {
        let (state, user) = app_with_user(Some("sk")).await;
        host(&state, user, "AAAAAA").await;
        host(&state, user, "BBBBBB").await;
        assert_eq!(
            determine_step(&state, user, None).await.unwrap(),
            Step::ActiveCompetitionsSelector
        );
    }

    #[tokio::test]
    async fn test_lobby_link_wins() {
        let (state, user) = app_with_user(Some("sk")).await;
        host(&state, user, "AAAAAA").await;
        let linked = host(&state, user, "BBBBBB").await;

        let step = determine_step(&state, user, Some(linked)).await.unwrap();
        assert_eq!(step, Step::CompetitionLobby);
        assert_eq!(state.sessions.held_competition(user).await, Some(linked));
    }

    #[tokio::test]
    async fn test_unknown_lobby_link_is_ignored() {
        let (state, user) = app_with_user(Some("sk")).await;
        let step = determine_step(&state, user, Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(step, Step::ModeSelector);
    }

    #[tokio::test]
    async fn test_vanished_held_competition_is_cleared() {
        let (state, user) = app_with_user(Some("sk")).await;
        state
            .sessions
            .enter_competition(
                user,
                Uuid::new_v4(),
                StepEvent::CompetitionSelected(CompetitionStatus::Waiting),
            )
            .await
            .unwrap();

        let step = determine_step(&state, user, None).await.unwrap();
        assert_eq!(step, Step::ModeSelector);
        assert_eq!(state.sessions.held_competition(user).await, None);
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthorized() {
        let (state, _) = app_with_user(None).await;
        assert!(matches!(
            determine_step(&state, 999, None).await,
            Err(AppError::AuthError(_))
        ));
    }
}

// src/services/preferences.rs

use std::collections::HashSet;

use validator::Validate;

use crate::{
    config::{Config, DEFAULT_COMPETITION_TITLE_SUFFIX},
    error::AppError,
    models::{
        competition::{Competition, CompetitionDraft},
        preferences::QuizPreferences,
    },
    services::competition::create_competition,
    store::Store,
    utils::html::clean_html,
};

/// What happens after the preferences are stored.
#[derive(Debug, Clone)]
pub enum SubmitIntent {
    Save,
    StartCompetition(CompetitionDraft),
}

/// Preference editor submission.
///
/// Nothing reaches the store unless the preferences validate. In competition
/// mode the competition is created only after the preferences are saved.
pub async fn submit_preferences(
    store: &dyn Store,
    config: &Config,
    user_id: i64,
    prefs: QuizPreferences,
    intent: SubmitIntent,
) -> Result<Option<Competition>, AppError> {
    prefs.validate()?;
    if let SubmitIntent::StartCompetition(draft) = &intent {
        draft.validate()?;
    }

    store.save_preferences(user_id, &prefs).await?;
    tracing::debug!("Saved preferences for user {}", user_id);

    let SubmitIntent::StartCompetition(draft) = intent else {
        return Ok(None);
    };

    let title = draft
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(clean_html)
        .unwrap_or_else(|| default_title(&prefs));
    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(clean_html)
        .unwrap_or_else(|| default_description(&prefs));
    let invited_emails = dedupe_emails(&draft.invited_emails);

    let competition = create_competition(
        store,
        config,
        user_id,
        title,
        description,
        draft.competition_type,
        prefs,
        invited_emails,
    )
    .await?;

    Ok(Some(competition))
}

pub fn default_title(prefs: &QuizPreferences) -> String {
    format!(
        "{} {}",
        clean_html(prefs.course.trim()),
        DEFAULT_COMPETITION_TITLE_SUFFIX
    )
}

pub fn default_description(prefs: &QuizPreferences) -> String {
    format!(
        "A {} quiz competition on {}",
        prefs.difficulty,
        clean_html(prefs.course.trim())
    )
}

/// Trims entries, drops blanks, and removes case-insensitive duplicates,
/// keeping the first spelling. No format validation.
pub fn dedupe_emails(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .filter(|e| seen.insert(e.to_lowercase()))
        .map(str::to_string)
        .collect()
}

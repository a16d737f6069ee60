// src/session/step.rs

//! Which screen a client should show.
//!
//! Two entry points decide the step:
//! * [`resolve`] derives it from a snapshot of backend state (page load,
//!   reconnect, lobby deep link), following a fixed priority order.
//! * [`Step::apply`] moves between steps on explicit user events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::competition::CompetitionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    ApiKey,
    ModeSelector,
    SoloPreferences,
    CreateCompetition,
    JoinCompetition,
    RandomMatch,
    Quiz,
    Results,
    CompetitionLobby,
    CompetitionQuiz,
    CompetitionResults,
    CompetitionManagement,
    ActiveCompetitionsSelector,
}

/// Entry points offered by the mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Solo,
    CreateCompetition,
    JoinCompetition,
    RandomMatch,
}

/// User-driven events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    ApiKeySaved,
    ApiKeyCleared,
    ModeChosen(Mode),
    PreferencesSaved,
    QuestionsGenerated,
    QuizFinished,
    Retake,
    CompetitionCreated,
    CompetitionJoined,
    CompetitionSelected(CompetitionStatus),
    CompetitionStatusChanged(CompetitionStatus),
    CompetitionSubmitted,
    CompetitionCleared,
    ManageCompetitions,
    Back,
}

impl Step {
    /// Routing for a competition the session is already holding.
    pub fn for_competition(status: CompetitionStatus) -> Step {
        match status {
            CompetitionStatus::Waiting => Step::CompetitionLobby,
            CompetitionStatus::Active => Step::CompetitionQuiz,
            CompetitionStatus::Completed => Step::CompetitionResults,
        }
    }

    /// Routing for a competition auto-selected from the active list.
    /// Anything other than an active competition lands in the lobby.
    pub fn for_auto_selected(status: CompetitionStatus) -> Step {
        match status {
            CompetitionStatus::Active => Step::CompetitionQuiz,
            _ => Step::CompetitionLobby,
        }
    }

    pub fn is_competition_step(self) -> bool {
        matches!(
            self,
            Step::CompetitionLobby
                | Step::CompetitionQuiz
                | Step::CompetitionResults
                | Step::CompetitionManagement
                | Step::ActiveCompetitionsSelector
        )
    }

    /// Transition table. `None` means the event is not valid from this step.
    pub fn apply(self, event: StepEvent) -> Option<Step> {
        use Step::*;
        use StepEvent::*;

        match (self, event) {
            (_, ApiKeyCleared) => Some(ApiKey),
            (ApiKey, ApiKeySaved) => Some(ModeSelector),

            (ModeSelector, ModeChosen(mode)) => Some(match mode {
                Mode::Solo => SoloPreferences,
                Mode::CreateCompetition => CreateCompetition,
                Mode::JoinCompetition => JoinCompetition,
                Mode::RandomMatch => RandomMatch,
            }),
            (ModeSelector, ManageCompetitions) => Some(CompetitionManagement),

            (SoloPreferences, PreferencesSaved) => Some(SoloPreferences),
            (CreateCompetition, PreferencesSaved) => Some(CreateCompetition),
            (SoloPreferences | ModeSelector, QuestionsGenerated) => Some(Quiz),
            (Quiz, QuizFinished) => Some(Results),
            (Results, Retake) => Some(SoloPreferences),
            (Results, QuestionsGenerated) => Some(Quiz),

            (CreateCompetition | RandomMatch, CompetitionCreated) => Some(CompetitionLobby),
            (JoinCompetition | RandomMatch, CompetitionJoined) => Some(CompetitionLobby),

            (
                ModeSelector | ActiveCompetitionsSelector | CompetitionManagement,
                CompetitionSelected(status),
            ) => Some(Step::for_competition(status)),

            (
                CompetitionLobby | CompetitionQuiz | CompetitionResults,
                CompetitionStatusChanged(status),
            ) => Some(Step::for_competition(status)),
            (CompetitionQuiz, CompetitionSubmitted) => Some(CompetitionResults),

            (step, CompetitionCleared) if step.is_competition_step() => Some(ModeSelector),

            (ApiKey, Back) => None,
            (_, Back) => Some(ModeSelector),

            _ => None,
        }
    }
}

/// A competition id with the status it had when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompetitionRef {
    pub id: Uuid,
    pub status: CompetitionStatus,
}

/// Outcome of re-reading the competition the session is holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedCompetition {
    /// Nothing held in memory.
    None,
    Present(CompetitionRef),
    /// Held in memory but gone from the store.
    Missing(Uuid),
    /// The status read failed.
    Unavailable(Uuid),
}

/// Everything [`resolve`] looks at, gathered in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Lobby deep link, already looked up. `None` if absent or unknown.
    pub directive: Option<CompetitionRef>,
    pub active: Vec<CompetitionRef>,
    pub loaded: LoadedCompetition,
    pub has_api_key: bool,
    pub has_result: bool,
    pub has_questions: bool,
}

/// What to do with the session's competition slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Keep,
    Select(Uuid),
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub step: Step,
    pub selection: Selection,
}

impl Resolution {
    fn keep(step: Step) -> Self {
        Self {
            step,
            selection: Selection::Keep,
        }
    }
}

/// The held competition could not be re-validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationFailed(pub Uuid);

/// Priority-ordered step derivation. The first matching rule wins:
///
/// 1. lobby deep link
/// 2. active competitions, when none is held yet
/// 3. re-validated held competition
/// 4. local quiz lifecycle
pub fn resolve(snapshot: &Snapshot) -> Result<Resolution, RevalidationFailed> {
    if let Some(target) = snapshot.directive {
        return Ok(Resolution {
            step: Step::CompetitionLobby,
            selection: Selection::Select(target.id),
        });
    }

    if snapshot.loaded == LoadedCompetition::None {
        match snapshot.active.as_slice() {
            [] => {}
            [only] => {
                return Ok(Resolution {
                    step: Step::for_auto_selected(only.status),
                    selection: Selection::Select(only.id),
                });
            }
            _ => return Ok(Resolution::keep(Step::ActiveCompetitionsSelector)),
        }
    }

    match snapshot.loaded {
        LoadedCompetition::Present(held) => {
            return Ok(Resolution::keep(Step::for_competition(held.status)));
        }
        LoadedCompetition::Missing(_) => {
            return Ok(Resolution {
                step: Step::ModeSelector,
                selection: Selection::Clear,
            });
        }
        LoadedCompetition::Unavailable(id) => return Err(RevalidationFailed(id)),
        LoadedCompetition::None => {}
    }

    let step = if !snapshot.has_api_key {
        Step::ApiKey
    } else if snapshot.has_result {
        Step::Results
    } else if snapshot.has_questions {
        Step::Quiz
    } else {
        Step::ModeSelector
    };
    Ok(Resolution::keep(step))
}

// src/store/mod.rs

//! Persistence seams.
//!
//! Handlers and services only see these traits. `PgStore` backs them with
//! PostgreSQL; `MemoryStore` keeps everything in process for tests and local
//! runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        competition::{Competition, CompetitionStatus, NewCompetition, Participant},
        preferences::QuizPreferences,
        question::{CreateQuestionRequest, Question, QuestionFilter},
        user::{NewUser, User},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// What happened to a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    /// The competition is no longer waiting, so nobody new gets in.
    Closed,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn set_api_key(&self, user_id: i64, api_key: Option<String>) -> Result<(), AppError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_preferences(&self, user_id: i64) -> Result<Option<QuizPreferences>, AppError>;

    async fn save_preferences(&self, user_id: i64, prefs: &QuizPreferences)
    -> Result<(), AppError>;
}

#[async_trait]
pub trait CompetitionStore: Send + Sync {
    /// Inserts the competition and enrolls the host as first participant.
    /// Fails with `Conflict` when the code is already taken.
    async fn insert_competition(&self, new: NewCompetition) -> Result<Competition, AppError>;

    async fn find_competition(&self, id: Uuid) -> Result<Option<Competition>, AppError>;

    async fn find_competition_by_code(&self, code: &str) -> Result<Option<Competition>, AppError>;

    /// Point read used to re-validate a competition the session holds on to.
    async fn competition_status(&self, id: Uuid) -> Result<Option<CompetitionStatus>, AppError>;

    /// Enrolls the user while the competition is waiting. The status check
    /// and the insert happen atomically, so a join racing `start` either
    /// lands before activation or comes back `Closed`.
    async fn add_participant(
        &self,
        competition_id: Uuid,
        user_id: i64,
    ) -> Result<JoinOutcome, AppError>;

    async fn is_participant(&self, competition_id: Uuid, user_id: i64) -> Result<bool, AppError>;

    /// Ordered by join time.
    async fn participants(&self, competition_id: Uuid) -> Result<Vec<Participant>, AppError>;

    /// Competitions the user hosts or joined, newest first.
    async fn competitions_for_user(&self, user_id: i64) -> Result<Vec<Competition>, AppError>;

    /// The subset of `competitions_for_user` that is waiting or active.
    async fn active_competitions_for_user(&self, user_id: i64)
    -> Result<Vec<Competition>, AppError>;

    /// Waiting public competitions the user is not part of, oldest first.
    async fn open_public_competitions(&self, exclude_user: i64)
    -> Result<Vec<Competition>, AppError>;

    /// Compare-and-set on status. Returns `false` if the current status is not `from`.
    async fn transition_competition(
        &self,
        id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<bool, AppError>;

    /// Stores the drawn questions and flips waiting to active in one step.
    /// Returns `false`, leaving the questions untouched, when the competition
    /// is not waiting.
    async fn activate_competition(&self, id: Uuid, questions: &[Question])
    -> Result<bool, AppError>;

    async fn competition_questions(&self, id: Uuid) -> Result<Vec<Question>, AppError>;

    /// Returns `false` when the participant already submitted.
    async fn record_submission(
        &self,
        competition_id: Uuid,
        user_id: i64,
        score: f64,
        correct_count: i32,
    ) -> Result<bool, AppError>;
}

#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn insert_question(&self, req: CreateQuestionRequest) -> Result<Question, AppError>;

    /// Random draw of at most `filter.limit` matching questions.
    async fn draw_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, AppError>;
}

/// Everything the service needs from persistence.
pub trait Store: UserStore + PreferenceStore + CompetitionStore + QuestionBank {}

impl<T> Store for T where T: UserStore + PreferenceStore + CompetitionStore + QuestionBank {}

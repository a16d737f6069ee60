// src/session/registry.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        competition::CompetitionStatus,
        preferences::{QuizMode, QuizPreferences},
        question::{PublicQuestion, Question},
        quiz_result::{FinishReason, QuizResult},
    },
    session::{
        countdown::Countdown,
        step::{Resolution, Selection, Step, StepEvent},
    },
};

/// A generated solo quiz in progress.
struct ActiveQuiz {
    id: u64,
    preferences: QuizPreferences,
    questions: Vec<Question>,
    current: usize,
    answers: HashMap<i64, String>,
    question_started: Instant,
    started_at: DateTime<Utc>,
}

impl ActiveQuiz {
    fn question_remaining(&self) -> Option<u64> {
        self.preferences.question_window().map(|window| {
            u64::from(window).saturating_sub(self.question_started.elapsed().as_secs())
        })
    }

    fn window_expired(&self) -> bool {
        self.preferences
            .question_window()
            .is_some_and(|w| self.question_started.elapsed() > Duration::from_secs(u64::from(w)))
    }

    fn move_to(&mut self, index: usize) {
        if index != self.current {
            self.current = index;
            self.question_started = Instant::now();
        }
    }
}

/// Per-user state behind the step router.
struct QuizSession {
    step: Step,
    /// Bumped on every mutation; snapshots taken under an older epoch are stale.
    epoch: u64,
    competition: Option<Uuid>,
    quiz: Option<ActiveQuiz>,
    result: Option<QuizResult>,
    countdown: Option<Countdown>,
    last_seen: Instant,
}

impl QuizSession {
    fn new(epoch: u64) -> Self {
        Self {
            step: Step::ModeSelector,
            epoch,
            competition: None,
            quiz: None,
            result: None,
            countdown: None,
            last_seen: Instant::now(),
        }
    }

    /// Nothing worth keeping: no quiz, result or competition, and untouched
    /// for at least `max_idle`.
    fn is_idle(&self, max_idle: Duration) -> bool {
        self.quiz.is_none()
            && self.result.is_none()
            && self.competition.is_none()
            && self.countdown.is_none()
            && self.last_seen.elapsed() >= max_idle
    }

    /// Leaving the quiz for anything but its results abandons it.
    fn set_step(&mut self, step: Step) {
        if self.step == Step::Quiz && step != Step::Quiz && step != Step::Results {
            self.quiz = None;
        }
        if step != Step::Quiz {
            self.countdown = None;
        }
        self.step = step;
        self.epoch += 1;
    }

    fn apply(&mut self, event: StepEvent) -> Result<Step, AppError> {
        let next = self.step.apply(event).ok_or_else(|| {
            AppError::Conflict(format!(
                "Cannot apply {:?} while on step {:?}",
                event, self.step
            ))
        })?;
        self.set_step(next);
        Ok(next)
    }

    fn active_quiz(&self) -> Result<&ActiveQuiz, AppError> {
        match (&self.quiz, self.step) {
            (Some(quiz), Step::Quiz) => Ok(quiz),
            _ => Err(AppError::Conflict("No quiz in progress".to_string())),
        }
    }

    fn active_quiz_mut(&mut self) -> Result<&mut ActiveQuiz, AppError> {
        match (&mut self.quiz, self.step) {
            (Some(quiz), Step::Quiz) => Ok(quiz),
            _ => Err(AppError::Conflict("No quiz in progress".to_string())),
        }
    }

    fn quiz_state(&self) -> Result<QuizState, AppError> {
        let quiz = self.active_quiz()?;
        let question = quiz
            .questions
            .get(quiz.current)
            .ok_or_else(|| AppError::InternalServerError("Quiz index out of range".to_string()))?;
        Ok(QuizState {
            index: quiz.current,
            total: quiz.questions.len(),
            question: question.to_public(),
            given: quiz.answers.get(&question.id).cloned(),
            answered: quiz.answers.len(),
            mode: quiz.preferences.mode,
            started_at: quiz.started_at,
            remaining_secs: self.countdown.as_ref().map(Countdown::remaining_secs),
            question_remaining_secs: quiz.question_remaining(),
        })
    }

    fn finish(&mut self, reason: FinishReason) -> Result<QuizResult, AppError> {
        if self.step == Step::Results {
            if let Some(result) = &self.result {
                return Ok(result.clone());
            }
        }
        let quiz = self.active_quiz()?;
        let result = QuizResult::grade(&quiz.questions, &quiz.answers, &quiz.preferences, reason);
        self.result = Some(result.clone());
        self.apply(StepEvent::QuizFinished)?;
        Ok(result)
    }
}

/// What `GET /api/session` reports.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub step: Step,
    pub epoch: u64,
    pub competition_id: Option<Uuid>,
    pub has_questions: bool,
    pub has_result: bool,
}

/// Session facts a step resolution is based on.
#[derive(Debug, Clone, Copy)]
pub struct SessionBasis {
    pub epoch: u64,
    pub competition: Option<Uuid>,
    pub has_questions: bool,
    pub has_result: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizState {
    pub index: usize,
    pub total: usize,
    pub question: PublicQuestion,
    pub given: Option<String>,
    pub answered: usize,
    pub mode: QuizMode,
    pub started_at: DateTime<Utc>,
    /// Seconds left on the total countdown, if one is armed.
    pub remaining_secs: Option<u64>,
    /// Seconds left for the current question, if a per-question limit is set.
    pub question_remaining_secs: Option<u64>,
}

/// Practice-mode reveal for a single answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub answer: String,
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub question_id: i64,
    /// `false` when the per-question window had already closed.
    pub accepted: bool,
    pub feedback: Option<AnswerFeedback>,
    pub current_index: usize,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<i64, QuizSession>,
    competition_timers: HashMap<Uuid, Countdown>,
    next_quiz_id: u64,
    /// Epoch new sessions start from. Raised past every evicted session's
    /// epoch so snapshots of an evicted session never commit to its successor.
    epoch_floor: u64,
}

impl Inner {
    fn session(&mut self, user_id: i64) -> &mut QuizSession {
        let floor = self.epoch_floor;
        let session = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| QuizSession::new(floor));
        session.last_seen = Instant::now();
        session
    }
}

/// In-memory quiz store: one session per user plus competition countdowns.
///
/// Sessions live in process only. Idle ones are dropped by `evict_idle`, and
/// a dropped session resolves afresh on the next request.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops sessions that hold nothing and were not touched for `max_idle`.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let before = inner.sessions.len();
        let mut floor = inner.epoch_floor;
        inner.sessions.retain(|_, session| {
            if session.is_idle(max_idle) {
                floor = floor.max(session.epoch + 1);
                false
            } else {
                true
            }
        });
        inner.epoch_floor = floor;
        before - inner.sessions.len()
    }

    /// Runs `evict_idle` periodically for the lifetime of the process.
    pub fn spawn_sweeper(&self, max_idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let every = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    tracing::debug!("Evicted {} idle sessions", evicted);
                }
            }
        })
    }

    pub async fn view(&self, user_id: i64) -> SessionView {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        SessionView {
            step: session.step,
            epoch: session.epoch,
            competition_id: session.competition,
            has_questions: session.quiz.is_some(),
            has_result: session.result.is_some(),
        }
    }

    pub async fn basis(&self, user_id: i64) -> SessionBasis {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        SessionBasis {
            epoch: session.epoch,
            competition: session.competition,
            has_questions: session.quiz.is_some(),
            has_result: session.result.is_some(),
        }
    }

    /// Applies a resolution computed from a snapshot taken at `epoch`.
    ///
    /// Returns `None` without touching the session if anything changed since.
    pub async fn commit(&self, user_id: i64, epoch: u64, resolution: Resolution) -> Option<Step> {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        if session.epoch != epoch {
            return None;
        }
        match resolution.selection {
            Selection::Keep => {}
            Selection::Select(id) => session.competition = Some(id),
            Selection::Clear => session.competition = None,
        }
        session.set_step(resolution.step);
        Some(resolution.step)
    }

    pub async fn apply(&self, user_id: i64, event: StepEvent) -> Result<Step, AppError> {
        let mut inner = self.inner.lock().await;
        inner.session(user_id).apply(event)
    }

    /// Applies a competition event and records which competition the session holds.
    pub async fn enter_competition(
        &self,
        user_id: i64,
        competition_id: Uuid,
        event: StepEvent,
    ) -> Result<Step, AppError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        let step = session.apply(event)?;
        session.competition = Some(competition_id);
        Ok(step)
    }

    /// Moves the session along when the held competition changed status.
    /// Sessions holding another competition, or sitting elsewhere, are left alone.
    pub async fn competition_status_changed(
        &self,
        user_id: i64,
        competition_id: Uuid,
        status: CompetitionStatus,
    ) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(&user_id) else {
            return;
        };
        if session.competition != Some(competition_id) {
            return;
        }
        if let Some(step) = session
            .step
            .apply(StepEvent::CompetitionStatusChanged(status))
        {
            session.set_step(step);
        }
    }

    pub async fn clear_competition(&self, user_id: i64) -> Result<Step, AppError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        let step = session.apply(StepEvent::CompetitionCleared)?;
        session.competition = None;
        Ok(step)
    }

    pub async fn held_competition(&self, user_id: i64) -> Option<Uuid> {
        let inner = self.inner.lock().await;
        inner.sessions.get(&user_id).and_then(|s| s.competition)
    }

    /// Installs freshly generated questions and arms the total countdown.
    pub async fn start_quiz(
        &self,
        user_id: i64,
        preferences: QuizPreferences,
        questions: Vec<Question>,
    ) -> Result<QuizState, AppError> {
        if questions.is_empty() {
            return Err(AppError::BadRequest(
                "No questions match these preferences".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        inner.next_quiz_id += 1;
        let quiz_id = inner.next_quiz_id;
        let session = inner.session(user_id);

        session.apply(StepEvent::QuestionsGenerated)?;
        session.result = None;

        let total = preferences.total_countdown();
        session.quiz = Some(ActiveQuiz {
            id: quiz_id,
            preferences,
            questions,
            current: 0,
            answers: HashMap::new(),
            question_started: Instant::now(),
            started_at: Utc::now(),
        });

        if let Some(secs) = total {
            let registry = self.clone();
            session.countdown = Some(Countdown::start(
                Duration::from_secs(u64::from(secs)),
                move || async move { registry.expire_quiz(user_id, quiz_id).await },
            ));
            tracing::debug!("Armed {}s countdown for user {}", secs, user_id);
        }

        session.quiz_state()
    }

    /// Countdown hook: finishes the quiz it was armed for, if still running.
    async fn expire_quiz(&self, user_id: i64, quiz_id: u64) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(&user_id) else {
            return;
        };
        let current = session.quiz.as_ref().map(|q| q.id);
        if current != Some(quiz_id) || session.step != Step::Quiz {
            return;
        }
        if let Some(countdown) = session.countdown.take() {
            countdown.detach();
        }
        match session.finish(FinishReason::TimeExpired) {
            Ok(result) => tracing::info!(
                "Quiz time expired for user {}: score {}",
                user_id,
                result.score
            ),
            Err(e) => tracing::warn!("Failed to finish expired quiz for user {}: {}", user_id, e),
        }
    }

    pub async fn current(&self, user_id: i64) -> Result<QuizState, AppError> {
        let mut inner = self.inner.lock().await;
        inner.session(user_id).quiz_state()
    }

    pub async fn answer(
        &self,
        user_id: i64,
        question_id: i64,
        answer: String,
    ) -> Result<AnswerOutcome, AppError> {
        let mut inner = self.inner.lock().await;
        let quiz = inner.session(user_id).active_quiz_mut()?;

        let index = quiz
            .questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| AppError::NotFound("Question is not part of this quiz".to_string()))?;

        let timed = quiz.preferences.question_window().is_some();
        if timed && index != quiz.current {
            return Err(AppError::Conflict(
                "Timed quizzes must be answered in order".to_string(),
            ));
        }

        if timed && quiz.window_expired() {
            let next = (quiz.current + 1).min(quiz.questions.len() - 1);
            quiz.move_to(next);
            return Ok(AnswerOutcome {
                question_id,
                accepted: false,
                feedback: None,
                current_index: quiz.current,
            });
        }

        let question = &quiz.questions[index];
        let feedback = (quiz.preferences.mode == QuizMode::Practice).then(|| AnswerFeedback {
            correct: question.is_correct(&answer),
            answer: question.answer.clone(),
            analysis: question.analysis.clone(),
        });
        quiz.answers.insert(question_id, answer);

        if timed {
            let next = (quiz.current + 1).min(quiz.questions.len() - 1);
            quiz.move_to(next);
        }

        Ok(AnswerOutcome {
            question_id,
            accepted: true,
            feedback,
            current_index: quiz.current,
        })
    }

    pub async fn navigate(&self, user_id: i64, index: usize) -> Result<QuizState, AppError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        let quiz = session.active_quiz_mut()?;
        if quiz.preferences.question_window().is_some() {
            return Err(AppError::Conflict(
                "Timed quizzes cannot be navigated freely".to_string(),
            ));
        }
        if index >= quiz.questions.len() {
            return Err(AppError::BadRequest(format!(
                "Question index {index} is out of range"
            )));
        }
        quiz.move_to(index);
        session.quiz_state()
    }

    pub async fn finish(&self, user_id: i64) -> Result<QuizResult, AppError> {
        let mut inner = self.inner.lock().await;
        inner.session(user_id).finish(FinishReason::Submitted)
    }

    pub async fn result(&self, user_id: i64) -> Result<QuizResult, AppError> {
        let inner = self.inner.lock().await;
        inner
            .sessions
            .get(&user_id)
            .and_then(|s| s.result.clone())
            .ok_or(AppError::NotFound("No quiz result yet".to_string()))
    }

    /// Goes back to the preference editor for another attempt.
    pub async fn retake(&self, user_id: i64) -> Result<Step, AppError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        let step = session.apply(StepEvent::Retake)?;
        session.quiz = None;
        session.result = None;
        Ok(step)
    }

    /// Drops quiz and result and returns to the mode selector.
    pub async fn reset(&self, user_id: i64) -> Step {
        let mut inner = self.inner.lock().await;
        let session = inner.session(user_id);
        session.quiz = None;
        session.result = None;
        let step = if session.step == Step::ApiKey {
            Step::ApiKey
        } else {
            Step::ModeSelector
        };
        session.set_step(step);
        step
    }

    /// Arms the countdown that completes a competition when its time runs out.
    pub async fn arm_competition<F, Fut>(&self, competition_id: Uuid, total: Duration, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let countdown = Countdown::start(total, on_expire);
        self.inner
            .lock()
            .await
            .competition_timers
            .insert(competition_id, countdown);
    }

    /// Cancels a competition countdown.
    pub async fn disarm_competition(&self, competition_id: Uuid) {
        self.inner
            .lock()
            .await
            .competition_timers
            .remove(&competition_id);
    }

    /// Forgets a competition countdown from within its own expiry hook.
    pub async fn release_competition(&self, competition_id: Uuid) {
        let released = self
            .inner
            .lock()
            .await
            .competition_timers
            .remove(&competition_id);
        if let Some(countdown) = released {
            countdown.detach();
        }
    }

    pub async fn competition_remaining(&self, competition_id: Uuid) -> Option<u64> {
        self.inner
            .lock()
            .await
            .competition_timers
            .get(&competition_id)
            .map(Countdown::remaining_secs)
    }
}

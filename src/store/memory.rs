// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        competition::{
            Competition, CompetitionStatus, CompetitionType, NewCompetition, Participant,
        },
        preferences::QuizPreferences,
        question::{CreateQuestionRequest, Question, QuestionFilter},
        user::{NewUser, User},
    },
    store::{CompetitionStore, JoinOutcome, PreferenceStore, QuestionBank, UserStore},
};

#[derive(Debug, Clone)]
struct Membership {
    user_id: i64,
    joined_at: DateTime<Utc>,
    score: Option<f64>,
    correct_count: Option<i32>,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_question_id: i64,
    users: HashMap<i64, User>,
    preferences: HashMap<i64, QuizPreferences>,
    competitions: HashMap<Uuid, Competition>,
    memberships: HashMap<Uuid, Vec<Membership>>,
    competition_questions: HashMap<Uuid, Vec<Question>>,
    questions: Vec<Question>,
}

impl Inner {
    fn competitions_where<F>(&self, user_id: i64, keep: F) -> Vec<Competition>
    where
        F: Fn(&Competition) -> bool,
    {
        let mut list: Vec<Competition> = self
            .competitions
            .values()
            .filter(|c| {
                c.host_id == user_id
                    || self
                        .memberships
                        .get(&c.id)
                        .is_some_and(|m| m.iter().any(|m| m.user_id == user_id))
            })
            .filter(|c| keep(c))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }
}

/// In-process store with the same semantics as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            email: user.email,
            name: user.name,
            phone: user.phone,
            password: user.password_hash,
            role: user.role,
            api_key: None,
            created_at: Utc::now(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_api_key(&self, user_id: i64, api_key: Option<String>) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        user.api_key = api_key;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn load_preferences(&self, user_id: i64) -> Result<Option<QuizPreferences>, AppError> {
        Ok(self.inner.read().await.preferences.get(&user_id).cloned())
    }

    async fn save_preferences(
        &self,
        user_id: i64,
        prefs: &QuizPreferences,
    ) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .preferences
            .insert(user_id, prefs.clone());
        Ok(())
    }
}

#[async_trait]
impl CompetitionStore for MemoryStore {
    async fn insert_competition(&self, new: NewCompetition) -> Result<Competition, AppError> {
        let mut inner = self.inner.write().await;
        if inner
            .competitions
            .values()
            .any(|c| c.competition_code == new.competition_code)
        {
            return Err(AppError::Conflict(format!(
                "Competition code '{}' already exists",
                new.competition_code
            )));
        }
        let now = Utc::now();
        let competition = Competition {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            competition_type: new.competition_type,
            status: CompetitionStatus::Waiting,
            competition_code: new.competition_code,
            host_id: new.host_id,
            preferences: new.preferences,
            invited_emails: new.invited_emails,
            created_at: now,
            started_at: None,
            ended_at: None,
        };
        inner.memberships.insert(
            competition.id,
            vec![Membership {
                user_id: competition.host_id,
                joined_at: now,
                score: None,
                correct_count: None,
                finished_at: None,
            }],
        );
        inner
            .competitions
            .insert(competition.id, competition.clone());
        Ok(competition)
    }

    async fn find_competition(&self, id: Uuid) -> Result<Option<Competition>, AppError> {
        Ok(self.inner.read().await.competitions.get(&id).cloned())
    }

    async fn find_competition_by_code(&self, code: &str) -> Result<Option<Competition>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .competitions
            .values()
            .find(|c| c.competition_code == code)
            .cloned())
    }

    async fn competition_status(&self, id: Uuid) -> Result<Option<CompetitionStatus>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .competitions
            .get(&id)
            .map(|c| c.status))
    }

    async fn add_participant(
        &self,
        competition_id: Uuid,
        user_id: i64,
    ) -> Result<JoinOutcome, AppError> {
        let mut inner = self.inner.write().await;
        let Some(status) = inner.competitions.get(&competition_id).map(|c| c.status) else {
            return Err(AppError::NotFound("Competition not found".to_string()));
        };
        let members = inner.memberships.entry(competition_id).or_default();
        if members.iter().any(|m| m.user_id == user_id) {
            return Ok(JoinOutcome::AlreadyJoined);
        }
        if status != CompetitionStatus::Waiting {
            return Ok(JoinOutcome::Closed);
        }
        members.push(Membership {
            user_id,
            joined_at: Utc::now(),
            score: None,
            correct_count: None,
            finished_at: None,
        });
        Ok(JoinOutcome::Joined)
    }

    async fn is_participant(&self, competition_id: Uuid, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .memberships
            .get(&competition_id)
            .is_some_and(|m| m.iter().any(|m| m.user_id == user_id)))
    }

    async fn participants(&self, competition_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let inner = self.inner.read().await;
        let members = inner
            .memberships
            .get(&competition_id)
            .cloned()
            .unwrap_or_default();
        Ok(members
            .into_iter()
            .map(|m| Participant {
                user_id: m.user_id,
                name: inner
                    .users
                    .get(&m.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default(),
                joined_at: m.joined_at,
                score: m.score,
                correct_count: m.correct_count,
                finished_at: m.finished_at,
            })
            .collect())
    }

    async fn competitions_for_user(&self, user_id: i64) -> Result<Vec<Competition>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .competitions_where(user_id, |_| true))
    }

    async fn active_competitions_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Competition>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .competitions_where(user_id, |c| c.status.is_open()))
    }

    async fn open_public_competitions(
        &self,
        exclude_user: i64,
    ) -> Result<Vec<Competition>, AppError> {
        let inner = self.inner.read().await;
        let mut open: Vec<Competition> = inner
            .competitions
            .values()
            .filter(|c| {
                c.status == CompetitionStatus::Waiting
                    && c.competition_type == CompetitionType::Public
                    && !inner
                        .memberships
                        .get(&c.id)
                        .is_some_and(|m| m.iter().any(|m| m.user_id == exclude_user))
            })
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }

    async fn transition_competition(
        &self,
        id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(competition) = inner.competitions.get_mut(&id) else {
            return Ok(false);
        };
        if competition.status != from {
            return Ok(false);
        }
        competition.status = to;
        match to {
            CompetitionStatus::Active => competition.started_at = Some(Utc::now()),
            CompetitionStatus::Completed => competition.ended_at = Some(Utc::now()),
            CompetitionStatus::Waiting => {}
        }
        Ok(true)
    }

    async fn activate_competition(
        &self,
        id: Uuid,
        questions: &[Question],
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(competition) = inner.competitions.get_mut(&id) else {
            return Ok(false);
        };
        if competition.status != CompetitionStatus::Waiting {
            return Ok(false);
        }
        competition.status = CompetitionStatus::Active;
        competition.started_at = Some(Utc::now());
        inner.competition_questions.insert(id, questions.to_vec());
        Ok(true)
    }

    async fn competition_questions(&self, id: Uuid) -> Result<Vec<Question>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .competition_questions
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_submission(
        &self,
        competition_id: Uuid,
        user_id: i64,
        score: f64,
        correct_count: i32,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let member = inner
            .memberships
            .get_mut(&competition_id)
            .and_then(|m| m.iter_mut().find(|m| m.user_id == user_id))
            .ok_or(AppError::NotFound("Participant not found".to_string()))?;
        if member.finished_at.is_some() {
            return Ok(false);
        }
        member.score = Some(score);
        member.correct_count = Some(correct_count);
        member.finished_at = Some(Utc::now());
        Ok(true)
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn insert_question(&self, req: CreateQuestionRequest) -> Result<Question, AppError> {
        let mut inner = self.inner.write().await;
        inner.next_question_id += 1;
        let question = Question {
            id: inner.next_question_id,
            question_type: req.question_type,
            content: req.content,
            options: req.options,
            answer: req.answer,
            analysis: req.analysis,
            course: req.course,
            topic: req.topic,
            difficulty: req.difficulty,
            language: req.language,
        };
        inner.questions.push(question.clone());
        Ok(question)
    }

    async fn draw_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Question> = inner
            .questions
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        matching.shuffle(&mut rand::thread_rng());
        matching.truncate(filter.limit as usize);
        Ok(matching)
    }
}

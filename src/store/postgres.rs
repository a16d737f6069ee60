// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        competition::{Competition, CompetitionStatus, NewCompetition, Participant},
        preferences::QuizPreferences,
        question::{CreateQuestionRequest, Question, QuestionFilter},
        user::{NewUser, User},
    },
    store::{CompetitionStore, JoinOutcome, PreferenceStore, QuestionBank, UserStore},
};

const USER_COLUMNS: &str = "id, email, name, phone, password, role, api_key, created_at";

const COMPETITION_COLUMNS: &str = r#"
    id, title, description, type, status, competition_code, host_id,
    preferences, invited_emails, created_at, started_at, ended_at
"#;

const QUESTION_COLUMNS: &str =
    "id, type, content, options, answer, analysis, course, topic, difficulty, language";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn corrupt(column: &str, err: String) -> AppError {
    AppError::InternalServerError(format!("Corrupt {column} column: {err}"))
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    phone: Option<String>,
    password: String,
    role: String,
    api_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            password: row.password,
            role: row.role,
            api_key: row.api_key,
            created_at: row.created_at,
        }
    }
}

/// Row of the 'competitions' table; enum columns are stored as TEXT.
#[derive(FromRow)]
struct CompetitionRow {
    id: Uuid,
    title: String,
    description: String,
    #[sqlx(rename = "type")]
    competition_type: String,
    status: String,
    competition_code: String,
    host_id: i64,
    preferences: Json<QuizPreferences>,
    invited_emails: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<CompetitionRow> for Competition {
    type Error = AppError;

    fn try_from(row: CompetitionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            competition_type: row
                .competition_type
                .parse()
                .map_err(|e| corrupt("type", e))?,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            competition_code: row.competition_code,
            host_id: row.host_id,
            preferences: row.preferences.0,
            invited_emails: row.invited_emails.0,
            created_at: row.created_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

fn competitions_from_rows(rows: Vec<CompetitionRow>) -> Result<Vec<Competition>, AppError> {
    rows.into_iter().map(Competition::try_from).collect()
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    #[sqlx(rename = "type")]
    question_type: String,
    content: String,
    options: Json<Vec<String>>,
    answer: String,
    analysis: Option<String>,
    course: String,
    topic: String,
    difficulty: String,
    language: String,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            question_type: row
                .question_type
                .parse()
                .map_err(|e| corrupt("type", e))?,
            content: row.content,
            options: row.options.0,
            answer: row.answer,
            analysis: row.analysis,
            course: row.course,
            topic: row.topic,
            difficulty: row.difficulty.parse().map_err(|e| corrupt("difficulty", e))?,
            language: row.language.parse().map_err(|e| corrupt("language", e))?,
        })
    }
}

#[derive(FromRow)]
struct ParticipantRow {
    user_id: i64,
    name: String,
    joined_at: DateTime<Utc>,
    score: Option<f64>,
    correct_count: Option<i32>,
    finished_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (email, name, phone, password, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .bind(&user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("Email '{}' is already registered", user.email))
                } else {
                    tracing::error!("Failed to register user: {:?}", e);
                    AppError::from(e)
                }
            })?;
        Ok(row.into())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn set_api_key(&self, user_id: i64, api_key: Option<String>) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET api_key = $1 WHERE id = $2")
            .bind(api_key)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for PgStore {
    async fn load_preferences(&self, user_id: i64) -> Result<Option<QuizPreferences>, AppError> {
        let row: Option<(Json<QuizPreferences>,)> =
            sqlx::query_as("SELECT data FROM quiz_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(data,)| data.0))
    }

    async fn save_preferences(
        &self,
        user_id: i64,
        prefs: &QuizPreferences,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_preferences (user_id, data)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(Json(prefs))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save preferences: {:?}", e);
            AppError::from(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl CompetitionStore for PgStore {
    async fn insert_competition(&self, new: NewCompetition) -> Result<Competition, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO competitions
                (id, title, description, type, competition_code, host_id, preferences, invited_emails)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COMPETITION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CompetitionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.competition_type.as_str())
            .bind(&new.competition_code)
            .bind(new.host_id)
            .bind(Json(&new.preferences))
            .bind(Json(&new.invited_emails))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!(
                        "Competition code '{}' already exists",
                        new.competition_code
                    ))
                } else {
                    tracing::error!("Failed to insert competition: {:?}", e);
                    AppError::from(e)
                }
            })?;

        sqlx::query("INSERT INTO competition_participants (competition_id, user_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(new.host_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_competition(&self, id: Uuid) -> Result<Option<Competition>, AppError> {
        let sql = format!("SELECT {COMPETITION_COLUMNS} FROM competitions WHERE id = $1");
        sqlx::query_as::<_, CompetitionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Competition::try_from)
            .transpose()
    }

    async fn find_competition_by_code(&self, code: &str) -> Result<Option<Competition>, AppError> {
        let sql =
            format!("SELECT {COMPETITION_COLUMNS} FROM competitions WHERE competition_code = $1");
        sqlx::query_as::<_, CompetitionRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(Competition::try_from)
            .transpose()
    }

    async fn competition_status(&self, id: Uuid) -> Result<Option<CompetitionStatus>, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM competitions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(status,)| {
            status
                .parse::<CompetitionStatus>()
                .map_err(|e| corrupt("status", e))
        })
            .transpose()
    }

    async fn add_participant(
        &self,
        competition_id: Uuid,
        user_id: i64,
    ) -> Result<JoinOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Holding the row lock blocks a concurrent activation until we commit.
        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM competitions WHERE id = $1 FOR SHARE")
                .bind(competition_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((status,)) = row else {
            return Err(AppError::NotFound("Competition not found".to_string()));
        };
        let status = status
            .parse::<CompetitionStatus>()
            .map_err(|e| corrupt("status", e))?;

        let (member,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM competition_participants
                WHERE competition_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(competition_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let outcome = if member {
            JoinOutcome::AlreadyJoined
        } else if status != CompetitionStatus::Waiting {
            JoinOutcome::Closed
        } else {
            let result = sqlx::query(
                r#"
                INSERT INTO competition_participants (competition_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (competition_id, user_id) DO NOTHING
                "#,
            )
            .bind(competition_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 1 {
                JoinOutcome::Joined
            } else {
                JoinOutcome::AlreadyJoined
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn is_participant(&self, competition_id: Uuid, user_id: i64) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM competition_participants
                WHERE competition_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(competition_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn participants(&self, competition_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT p.user_id, u.name, p.joined_at, p.score, p.correct_count, p.finished_at
            FROM competition_participants p
            JOIN users u ON p.user_id = u.id
            WHERE p.competition_id = $1
            ORDER BY p.joined_at ASC
            "#,
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Participant {
                user_id: r.user_id,
                name: r.name,
                joined_at: r.joined_at,
                score: r.score,
                correct_count: r.correct_count,
                finished_at: r.finished_at,
            })
            .collect())
    }

    async fn competitions_for_user(&self, user_id: i64) -> Result<Vec<Competition>, AppError> {
        let sql = format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions c
             WHERE c.host_id = $1
                OR EXISTS (SELECT 1 FROM competition_participants p
                           WHERE p.competition_id = c.id AND p.user_id = $1)
             ORDER BY c.created_at DESC"
        );
        let rows = sqlx::query_as::<_, CompetitionRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        competitions_from_rows(rows)
    }

    async fn active_competitions_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Competition>, AppError> {
        let sql = format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions c
             WHERE c.status IN ('waiting', 'active')
               AND (c.host_id = $1
                    OR EXISTS (SELECT 1 FROM competition_participants p
                               WHERE p.competition_id = c.id AND p.user_id = $1))
             ORDER BY c.created_at DESC"
        );
        let rows = sqlx::query_as::<_, CompetitionRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        competitions_from_rows(rows)
    }

    async fn open_public_competitions(
        &self,
        exclude_user: i64,
    ) -> Result<Vec<Competition>, AppError> {
        let sql = format!(
            "SELECT {COMPETITION_COLUMNS} FROM competitions c
             WHERE c.status = 'waiting' AND c.type = 'public'
               AND NOT EXISTS (SELECT 1 FROM competition_participants p
                               WHERE p.competition_id = c.id AND p.user_id = $1)
             ORDER BY c.created_at ASC
             LIMIT 50"
        );
        let rows = sqlx::query_as::<_, CompetitionRow>(&sql)
            .bind(exclude_user)
            .fetch_all(&self.pool)
            .await?;
        competitions_from_rows(rows)
    }

    async fn transition_competition(
        &self,
        id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE competitions SET
                status = $3,
                started_at = CASE WHEN $3 = 'active' THEN NOW() ELSE started_at END,
                ended_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE ended_at END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to transition competition {}: {:?}", id, e);
            AppError::from(e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn activate_competition(
        &self,
        id: Uuid,
        questions: &[Question],
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE competitions
            SET status = 'active', questions = $2, started_at = NOW()
            WHERE id = $1 AND status = 'waiting'
            "#,
        )
        .bind(id)
        .bind(Json(questions))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to activate competition {}: {:?}", id, e);
            AppError::from(e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn competition_questions(&self, id: Uuid) -> Result<Vec<Question>, AppError> {
        let row: Option<(Json<Vec<Question>>,)> =
            sqlx::query_as("SELECT questions FROM competitions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(q,)| q.0).unwrap_or_default())
    }

    async fn record_submission(
        &self,
        competition_id: Uuid,
        user_id: i64,
        score: f64,
        correct_count: i32,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE competition_participants
            SET score = $3, correct_count = $4, finished_at = NOW()
            WHERE competition_id = $1 AND user_id = $2 AND finished_at IS NULL
            "#,
        )
        .bind(competition_id)
        .bind(user_id)
        .bind(score)
        .bind(correct_count)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn insert_question(&self, req: CreateQuestionRequest) -> Result<Question, AppError> {
        let sql = format!(
            "INSERT INTO questions (type, content, options, answer, analysis, course, topic, difficulty, language)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {QUESTION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(req.question_type.as_str())
            .bind(&req.content)
            .bind(Json(&req.options))
            .bind(&req.answer)
            .bind(&req.analysis)
            .bind(&req.course)
            .bind(&req.topic)
            .bind(req.difficulty.as_str())
            .bind(req.language.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create question: {:?}", e);
                AppError::from(e)
            })?;
        row.try_into()
    }

    async fn draw_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, AppError> {
        if filter.question_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Postgres>::new("SELECT ");
        query_builder.push(QUESTION_COLUMNS);
        query_builder.push(" FROM questions WHERE LOWER(course) = LOWER(");
        query_builder.push_bind(&filter.course);
        query_builder.push(") AND difficulty = ");
        query_builder.push_bind(filter.difficulty.as_str());
        query_builder.push(" AND language = ");
        query_builder.push_bind(filter.language.as_str());

        if let Some(topic) = &filter.topic {
            query_builder.push(" AND LOWER(topic) = LOWER(");
            query_builder.push_bind(topic);
            query_builder.push(")");
        }

        query_builder.push(" AND type IN (");
        let mut separated = query_builder.separated(",");
        for question_type in &filter.question_types {
            separated.push_bind(question_type.as_str());
        }
        separated.push_unseparated(")");

        query_builder.push(" ORDER BY RANDOM() LIMIT ");
        query_builder.push_bind(filter.limit as i64);

        let rows: Vec<QuestionRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to draw questions: {:?}", e);
                AppError::from(e)
            })?;

        rows.into_iter().map(Question::try_from).collect()
    }
}

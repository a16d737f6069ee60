// src/models/competition.rs

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::preferences::QuizPreferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionType {
    #[default]
    Private,
    Public,
}

impl CompetitionType {
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitionType::Private => "private",
            CompetitionType::Public => "public",
        }
    }
}

impl FromStr for CompetitionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(CompetitionType::Private),
            "public" => Ok(CompetitionType::Public),
            other => Err(format!("unknown competition type '{other}'")),
        }
    }
}

/// Competition lifecycle: waiting -> active -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionStatus {
    Waiting,
    Active,
    Completed,
}

impl CompetitionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitionStatus::Waiting => "waiting",
            CompetitionStatus::Active => "active",
            CompetitionStatus::Completed => "completed",
        }
    }

    /// Waiting and active competitions still need the participant.
    pub fn is_open(self) -> bool {
        !matches!(self, CompetitionStatus::Completed)
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompetitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(CompetitionStatus::Waiting),
            "active" => Ok(CompetitionStatus::Active),
            "completed" => Ok(CompetitionStatus::Completed),
            other => Err(format!("unknown competition status '{other}'")),
        }
    }
}

/// A multiplayer quiz session identified by a 6-character code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub competition_type: CompetitionType,
    pub status: CompetitionStatus,
    pub competition_code: String,
    pub host_id: i64,
    pub preferences: QuizPreferences,
    pub invited_emails: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Insert payload; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewCompetition {
    pub title: String,
    pub description: String,
    pub competition_type: CompetitionType,
    pub competition_code: String,
    pub host_id: i64,
    pub preferences: QuizPreferences,
    pub invited_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub correct_count: Option<i32>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn has_submitted(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Competition-specific part of a "start competition" preference submission.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompetitionDraft {
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub competition_type: CompetitionType,
    /// Free text; only trimmed and de-duplicated.
    #[serde(default)]
    pub invited_emails: Vec<String>,
}

/// DTO for `POST /api/competitions`.
#[derive(Debug, Deserialize)]
pub struct CreateCompetitionRequest {
    pub preferences: QuizPreferences,
    #[serde(flatten)]
    pub competition: CompetitionDraft,
}

/// DTO for `POST /api/competitions/join`.
#[derive(Debug, Deserialize)]
pub struct JoinCompetitionRequest {
    pub code: String,
}

/// DTO for `POST /api/competitions/random`.
#[derive(Debug, Default, Deserialize)]
pub struct RandomMatchRequest {
    pub course: Option<String>,
}

/// DTO for `POST /api/competitions/{id}/submit`.
#[derive(Debug, Deserialize)]
pub struct SubmitCompetitionRequest {
    pub answers: HashMap<i64, String>,
}

/// Competition plus its participants, as returned to the lobby.
#[derive(Debug, Serialize)]
pub struct CompetitionDetail {
    #[serde(flatten)]
    pub competition: Competition,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Serialize)]
pub struct CompetitionStatusResponse {
    pub id: Uuid,
    pub status: CompetitionStatus,
    /// Seconds left on the competition countdown while one is running.
    pub remaining_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub name: String,
    pub score: f64,
    pub correct_count: i32,
    pub finished_at: DateTime<Utc>,
}

/// Ranks submitted participants by score, then by earliest submission.
pub fn leaderboard(participants: &[Participant]) -> Vec<LeaderboardEntry> {
    let mut finished: Vec<_> = participants
        .iter()
        .filter_map(|p| {
            Some((
                p,
                p.score?,
                p.correct_count.unwrap_or_default(),
                p.finished_at?,
            ))
        })
        .collect();

    finished.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.3.cmp(&b.3)));

    finished
        .into_iter()
        .enumerate()
        .map(|(i, (p, score, correct_count, finished_at))| LeaderboardEntry {
            rank: i + 1,
            user_id: p.user_id,
            name: p.name.clone(),
            score,
            correct_count,
            finished_at,
        })
        .collect()
}

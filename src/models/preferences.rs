// src/models/preferences.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::question::QuestionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Languages the question bank is authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Hindi,
    Chinese,
    Japanese,
    Arabic,
    Portuguese,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Spanish => "spanish",
            Language::French => "french",
            Language::German => "german",
            Language::Hindi => "hindi",
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Arabic => "arabic",
            Language::Portuguese => "portuguese",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Language::English,
            Language::Spanish,
            Language::French,
            Language::German,
            Language::Hindi,
            Language::Chinese,
            Language::Japanese,
            Language::Arabic,
            Language::Portuguese,
        ]
        .into_iter()
        .find(|l| l.as_str() == s)
        .ok_or_else(|| format!("unsupported language '{s}'"))
    }
}

/// Practice mode reveals each answer as it is given; exam mode only at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    #[default]
    Practice,
    Exam,
}

/// User-configured parameters controlling a generated quiz's content and rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QuizPreferences {
    #[validate(
        length(max = 200, message = "Course must be at most 200 characters."),
        custom(function = validate_not_blank, message = "Course is required.")
    )]
    pub course: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub topic: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub subtopic: String,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[serde(default)]
    pub language: Language,

    /// Set semantics: duplicates in the request collapse.
    #[validate(custom(
        function = validate_question_types,
        message = "Select at least one question type."
    ))]
    pub question_types: BTreeSet<QuestionType>,

    #[validate(range(min = 1, max = 50, message = "Question count must be between 1 and 50."))]
    pub question_count: u32,

    #[serde(default)]
    pub mode: QuizMode,

    #[serde(default)]
    pub time_limit_enabled: bool,

    /// Seconds allowed per question.
    #[validate(range(min = 1, max = 3600))]
    pub time_limit: Option<u32>,

    /// Seconds allowed for the whole quiz.
    #[validate(range(min = 1, max = 86400))]
    pub total_time_limit: Option<u32>,

    #[serde(default)]
    pub negative_marking: bool,

    /// Marks deducted per wrong answer when `negative_marking` is on.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 10.0, message = "Negative marks must be between 0 and 10."))]
    pub negative_marks: f64,
}

impl Default for QuizPreferences {
    fn default() -> Self {
        Self {
            course: String::new(),
            topic: String::new(),
            subtopic: String::new(),
            difficulty: Difficulty::default(),
            language: Language::default(),
            question_types: BTreeSet::from([QuestionType::Single]),
            question_count: 10,
            mode: QuizMode::default(),
            time_limit_enabled: false,
            time_limit: None,
            total_time_limit: None,
            negative_marking: false,
            negative_marks: 0.0,
        }
    }
}

impl QuizPreferences {
    /// Total countdown in seconds, only when time limits are switched on.
    pub fn total_countdown(&self) -> Option<u32> {
        self.time_limit_enabled
            .then_some(self.total_time_limit)
            .flatten()
    }

    /// Per-question window in seconds, only when time limits are switched on.
    pub fn question_window(&self) -> Option<u32> {
        self.time_limit_enabled.then_some(self.time_limit).flatten()
    }

    /// Penalty applied per wrong answer.
    pub fn penalty(&self) -> f64 {
        if self.negative_marking {
            self.negative_marks
        } else {
            0.0
        }
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validate_question_types(types: &BTreeSet<QuestionType>) -> Result<(), ValidationError> {
    if types.is_empty() {
        return Err(ValidationError::new("question_types_cannot_be_empty"));
    }
    Ok(())
}

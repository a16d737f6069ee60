// src/models/question.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::preferences::{Difficulty, Language, QuizPreferences};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Exactly one option is correct.
    Single,
    /// Several options are correct; answers are comma-separated keys.
    Multiple,
    TrueFalse,
    FillBlank,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(QuestionType::Single),
            "multiple" => Ok(QuestionType::Multiple),
            "true_false" => Ok(QuestionType::TrueFalse),
            "fill_blank" => Ok(QuestionType::FillBlank),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// A question from the bank, including its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub content: String,

    /// Empty for fill-in-the-blank questions.
    pub options: Vec<String>,

    pub answer: String,

    pub analysis: Option<String>,

    pub course: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub language: Language,
}

impl Question {
    /// Whether `given` matches the answer key.
    ///
    /// Multiple-choice keys compare as sets of comma-separated options; every
    /// other type compares trimmed and case-insensitively.
    pub fn is_correct(&self, given: &str) -> bool {
        match self.question_type {
            QuestionType::Multiple => option_set(given) == option_set(&self.answer),
            _ => given.trim().eq_ignore_ascii_case(self.answer.trim()),
        }
    }

    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            question_type: self.question_type,
            content: self.content.clone(),
            options: self.options.clone(),
        }
    }
}

fn option_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// DTO for sending question to client (excludes answer and analysis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<String>,
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
    #[validate(length(max = 2000))]
    pub analysis: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub course: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub language: Language,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() > 10 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}

/// What to draw from the bank for a quiz.
#[derive(Debug, Clone)]
pub struct QuestionFilter {
    pub course: String,
    pub topic: Option<String>,
    pub difficulty: Difficulty,
    pub language: Language,
    pub question_types: Vec<QuestionType>,
    pub limit: u32,
}

/// Case-insensitive comparison of course and topic names, folding the same
/// way Postgres `LOWER` does.
pub fn same_label(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl QuestionFilter {
    pub fn from_preferences(prefs: &QuizPreferences) -> Self {
        let topic = prefs.topic.trim();
        Self {
            course: prefs.course.trim().to_string(),
            topic: (!topic.is_empty()).then(|| topic.to_string()),
            difficulty: prefs.difficulty,
            language: prefs.language,
            question_types: prefs.question_types.iter().copied().collect(),
            limit: prefs.question_count,
        }
    }

    /// Course and topic match case-insensitively; everything else exactly.
    pub fn matches(&self, q: &Question) -> bool {
        same_label(&q.course, &self.course)
            && self
                .topic
                .as_deref()
                .is_none_or(|t| same_label(&q.topic, t))
            && q.difficulty == self.difficulty
            && q.language == self.language
            && self.question_types.contains(&q.question_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(question_type: QuestionType, answer: &str) -> Question {
        Question {
            id: 1,
            question_type,
            content: "?".to_string(),
            options: vec!["A".into(), "B".into(), "C".into()],
            answer: answer.to_string(),
            analysis: None,
            course: "Physics".to_string(),
            topic: "Optics".to_string(),
            difficulty: Difficulty::Easy,
            language: Language::English,
        }
    }

    #[test]
    fn test_single_choice_is_case_insensitive() {
        let q = question(QuestionType::Single, "B");
        assert!(q.is_correct(" b "));
        assert!(!q.is_correct("C"));
    }

    #[test]
    fn test_multiple_choice_ignores_order() {
        let q = question(QuestionType::Multiple, "A,C");
        assert!(q.is_correct("c, a"));
        assert!(!q.is_correct("A"));
        assert!(!q.is_correct("A,B,C"));
    }

    #[test]
    fn test_filter_matches_course_and_type() {
        let prefs = QuizPreferences {
            course: "physics".to_string(),
            difficulty: Difficulty::Easy,
            ..QuizPreferences::default()
        };
        let filter = QuestionFilter::from_preferences(&prefs);
        assert!(filter.topic.is_none());
        assert!(filter.matches(&question(QuestionType::Single, "A")));
        assert!(!filter.matches(&question(QuestionType::Multiple, "A")));
    }

    #[test]
    fn test_filter_folds_non_ascii_case() {
        let prefs = QuizPreferences {
            course: "économie".to_string(),
            topic: "ÉTUDES".to_string(),
            difficulty: Difficulty::Easy,
            ..QuizPreferences::default()
        };
        let filter = QuestionFilter::from_preferences(&prefs);
        let mut q = question(QuestionType::Single, "A");
        q.course = "Économie".to_string();
        q.topic = "études".to_string();
        assert!(filter.matches(&q));
    }

    #[test]
    fn test_public_question_hides_answer() {
        let public = serde_json::to_value(question(QuestionType::Single, "A").to_public()).unwrap();
        assert!(public.get("answer").is_none());
        assert_eq!(public["type"], "single");
    }
}

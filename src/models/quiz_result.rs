// src/models/quiz_result.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{preferences::QuizPreferences, question::Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Submitted,
    TimeExpired,
}

/// Per-question outcome shown on the results screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReview {
    pub question_id: i64,
    pub given: Option<String>,
    pub answer: String,
    pub analysis: Option<String>,
    pub correct: bool,
}

/// Derived result of a finished quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: f64,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub unanswered_count: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub reason: FinishReason,
    pub finished_at: DateTime<Utc>,
    pub review: Vec<QuestionReview>,
}

impl QuizResult {
    /// Grades `answers` against the questions' answer keys.
    ///
    /// Each correct answer is worth one mark. Wrong answers cost the
    /// preferences' penalty; blank or missing answers cost nothing. The score
    /// never drops below zero.
    pub fn grade(
        questions: &[Question],
        answers: &HashMap<i64, String>,
        prefs: &QuizPreferences,
        reason: FinishReason,
    ) -> Self {
        let mut correct_count = 0;
        let mut wrong_count = 0;
        let mut unanswered_count = 0;

        let review = questions
            .iter()
            .map(|q| {
                let given = answers
                    .get(&q.id)
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty());
                let correct = match given {
                    Some(a) if q.is_correct(a) => {
                        correct_count += 1;
                        true
                    }
                    Some(_) => {
                        wrong_count += 1;
                        false
                    }
                    None => {
                        unanswered_count += 1;
                        false
                    }
                };
                QuestionReview {
                    question_id: q.id,
                    given: given.map(str::to_string),
                    answer: q.answer.clone(),
                    analysis: q.analysis.clone(),
                    correct,
                }
            })
            .collect();

        let total_questions = questions.len() as u32;
        let score = (correct_count as f64 - wrong_count as f64 * prefs.penalty()).max(0.0);
        let percentage = if total_questions == 0 {
            0.0
        } else {
            correct_count as f64 / total_questions as f64 * 100.0
        };

        Self {
            score,
            correct_count,
            wrong_count,
            unanswered_count,
            total_questions,
            percentage,
            reason,
            finished_at: Utc::now(),
            review,
        }
    }
}

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::{DifficultyLevel, QuestionKind};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionOptionCreate {
    #[validate(length(min = 1, message = "option text must not be empty"))]
    pub(crate) text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
    pub(crate) kind: QuestionKind,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, message = "points must be at least 1"))]
    pub(crate) points: i32,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Vec<QuestionOptionCreate>,
    #[serde(default)]
    #[serde(alias = "correctText")]
    pub(crate) correct_text: Option<String>,
    #[serde(default)]
    #[serde(alias = "matchLeft")]
    pub(crate) match_left: Vec<String>,
    #[serde(default)]
    #[serde(alias = "matchRight")]
    pub(crate) match_right: Vec<String>,
}

impl QuestionCreate {
    /// Exactly one correctness definition must be populated and it must
    /// belong to the declared kind.
    pub(crate) fn validate_shape(&self) -> Result<(), String> {
        let has_options = !self.options.is_empty();
        let has_text = self
            .correct_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        let has_match = !self.match_left.is_empty() || !self.match_right.is_empty();

        match self.kind {
            QuestionKind::Single | QuestionKind::Multi => {
                if !has_options {
                    return Err("choice questions require options".into());
                }
                if has_text || has_match {
                    return Err("choice questions carry options only".into());
                }
                if !self.options.iter().any(|o| o.is_correct) {
                    return Err("at least one option must be marked correct".into());
                }
                if self.kind == QuestionKind::Single
                    && self.options.iter().filter(|o| o.is_correct).count() > 1
                {
                    return Err("single-choice questions allow one correct option".into());
                }
            }
            QuestionKind::Freetext => {
                if !has_text {
                    return Err("free-text questions require correct_text".into());
                }
                if has_options || has_match {
                    return Err("free-text questions carry correct_text only".into());
                }
            }
            QuestionKind::Matching => {
                if self.match_left.is_empty() || self.match_right.is_empty() {
                    return Err("matching questions require both item lists".into());
                }
                if has_options || has_text {
                    return Err("matching questions carry item lists only".into());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) kind: QuestionKind,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: i32,
    pub(crate) option_count: usize,
    pub(crate) created_at: String,
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}

fn default_points() -> i32 {
    1
}

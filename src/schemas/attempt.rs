use serde::{Deserialize, Serialize};

use crate::db::types::{DifficultyLevel, QuestionKind};

/// One answer as the client submits it. The `kind` tag must agree with the
/// question being answered; intake rejects a mismatch before anything is
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum AnswerPayload {
    Single {
        #[serde(default)]
        option_id: Option<String>,
    },
    Multi {
        #[serde(default)]
        option_ids: Vec<String>,
    },
    Freetext {
        text: String,
    },
    Matching {
        pairs: Vec<MatchPair>,
    },
}

/// `left` is the 1-based position in the left item list; `right` is the
/// letter label of the chosen right item (A, B, C, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MatchPair {
    pub(crate) left: u32,
    pub(crate) right: String,
}

impl AnswerPayload {
    pub(crate) fn kind(&self) -> QuestionKind {
        match self {
            AnswerPayload::Single { .. } => QuestionKind::Single,
            AnswerPayload::Multi { .. } => QuestionKind::Multi,
            AnswerPayload::Freetext { .. } => QuestionKind::Freetext,
            AnswerPayload::Matching { .. } => QuestionKind::Matching,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DeliveredOption {
    pub(crate) id: String,
    pub(crate) text: String,
}

/// A question as handed to the student: correctness fields stripped, only
/// what is needed to render and answer it.
#[derive(Debug, Serialize)]
pub(crate) struct DeliveredQuestion {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) kind: QuestionKind,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) options: Option<Vec<DeliveredOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) match_left: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) match_right: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStartResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) started_at: String,
    pub(crate) questions: Vec<DeliveredQuestion>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerAcceptedResponse {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptOutcomeResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) correct_count: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) score: i32,
    pub(crate) grade: i32,
    pub(crate) time_spent_minutes: i32,
    pub(crate) started_at: String,
    pub(crate) ended_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AvailabilityResponse {
    pub(crate) test_id: String,
    pub(crate) can_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
    pub(crate) attempts_used: i64,
    pub(crate) attempts_allowed: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) deadline: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptHistoryItem {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) attempt_number: i32,
    pub(crate) is_completed: bool,
    pub(crate) score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) grade: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ended_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetailResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) is_completed: bool,
    pub(crate) score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) grade: Option<i32>,
    pub(crate) started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ended_at: Option<String>,
    pub(crate) answers: Vec<AnsweredQuestion>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnsweredQuestion {
    pub(crate) question_id: String,
    pub(crate) payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: i32,
}

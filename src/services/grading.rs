use std::collections::{HashMap, HashSet};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AnswerOption, Question};
use crate::db::types::QuestionKind;
use crate::schemas::attempt::AnswerPayload;
use crate::services::admission::AttemptError;

/// A question's correctness definition, one variant per kind. Built once
/// from the stored question and dispatched exhaustively while grading.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnswerKey {
    Single { option_id: Option<String> },
    Multi { option_ids: HashSet<String> },
    Freetext { text: String },
    Matching { left: Vec<String>, right: Vec<String> },
}

impl AnswerKey {
    pub(crate) fn from_question(question: &Question, options: &[AnswerOption]) -> AnswerKey {
        match question.kind {
            QuestionKind::Single => AnswerKey::Single {
                option_id: options
                    .iter()
                    .find(|o| o.is_correct)
                    .map(|o| o.id.clone()),
            },
            QuestionKind::Multi => AnswerKey::Multi {
                option_ids: options
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| o.id.clone())
                    .collect(),
            },
            QuestionKind::Freetext => AnswerKey::Freetext {
                text: question.correct_text.clone().unwrap_or_default(),
            },
            QuestionKind::Matching => AnswerKey::Matching {
                left: question
                    .match_left
                    .as_ref()
                    .map(|l| l.0.clone())
                    .unwrap_or_default(),
                right: question
                    .match_right
                    .as_ref()
                    .map(|r| r.0.clone())
                    .unwrap_or_default(),
            },
        }
    }
}

/// Grades one answer against its key. A payload whose kind does not match
/// the key is simply wrong; no partial credit anywhere.
pub(crate) fn check_answer(key: &AnswerKey, payload: &AnswerPayload) -> bool {
    match (key, payload) {
        (AnswerKey::Single { option_id: key_id }, AnswerPayload::Single { option_id }) => {
            match (key_id, option_id) {
                (Some(key_id), Some(picked)) => key_id == picked,
                // A question with no correct option can never be answered
                // correctly, and an empty selection is never correct.
                _ => false,
            }
        }
        (AnswerKey::Multi { option_ids: key_ids }, AnswerPayload::Multi { option_ids }) => {
            let picked: HashSet<&str> = option_ids.iter().map(String::as_str).collect();
            let expected: HashSet<&str> = key_ids.iter().map(String::as_str).collect();
            !expected.is_empty() && picked == expected
        }
        (AnswerKey::Freetext { text: expected }, AnswerPayload::Freetext { text }) => {
            expected.trim().to_lowercase() == text.trim().to_lowercase()
        }
        (AnswerKey::Matching { left, right }, AnswerPayload::Matching { pairs }) => {
            // The correct pairing is positional: left[i] goes with right[i].
            let required = left.len().min(right.len());
            if pairs.len() != required {
                return false;
            }
            (0..required).all(|i| {
                pairs.iter().any(|pair| {
                    pair.left as usize == i + 1
                        && letter_to_index(&pair.right) == Some(i)
                })
            })
        }
        _ => false,
    }
}

/// A/B/C... labels for right-hand items, 1-letter, case-insensitive.
fn letter_to_index(letter: &str) -> Option<usize> {
    let trimmed = letter.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !first.is_ascii_uppercase() {
        return None;
    }
    Some((first as u8 - b'A') as usize)
}

/// Five-point band from the percentage of correct answers.
pub(crate) fn grade_band(percentage: f64) -> i32 {
    if percentage >= 85.0 {
        5
    } else if percentage >= 70.0 {
        4
    } else if percentage >= 50.0 {
        3
    } else {
        2
    }
}

#[derive(Debug)]
pub(crate) struct AttemptOutcome {
    pub(crate) correct_count: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) score: i32,
    pub(crate) grade: i32,
    pub(crate) time_spent_minutes: i32,
    pub(crate) started_at: time::PrimitiveDateTime,
    pub(crate) ended_at: time::PrimitiveDateTime,
}

/// Grades every stored answer, writes per-answer verdicts, and finalizes the
/// attempt in one transaction. The row lock plus the conditional UPDATE make
/// a second concurrent submit lose cleanly with `AlreadyCompleted`.
pub(crate) async fn complete_attempt(
    state: &AppState,
    attempt_id: &str,
    student_id: &str,
) -> Result<AttemptOutcome, AttemptError> {
    // Question data is immutable once attached, so it can be read outside
    // the completion transaction.
    let attempt = crate::repositories::attempts::find_owned(state.db(), attempt_id, student_id)
        .await?
        .ok_or(AttemptError::AttemptNotFound)?;
    if attempt.is_completed {
        return Err(AttemptError::AlreadyCompleted);
    }

    let questions =
        crate::repositories::questions::list_for_test(state.db(), &attempt.test_id).await?;
    let question_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
    let options =
        crate::repositories::questions::list_options_by_question_ids(state.db(), &question_ids)
            .await?;

    let mut options_by_question: HashMap<&str, Vec<&AnswerOption>> = HashMap::new();
    for option in &options {
        options_by_question
            .entry(option.question_id.as_str())
            .or_default()
            .push(option);
    }

    let keys: HashMap<&str, (AnswerKey, i32)> = questions
        .iter()
        .map(|q| {
            let opts: Vec<AnswerOption> = options_by_question
                .get(q.id.as_str())
                .map(|list| list.iter().map(|o| (*o).clone()).collect())
                .unwrap_or_default();
            (q.id.as_str(), (AnswerKey::from_question(q, &opts), q.points))
        })
        .collect();

    let mut tx = state.db().begin().await?;

    let locked = crate::repositories::attempts::lock_owned(&mut *tx, attempt_id, student_id)
        .await?
        .ok_or(AttemptError::AttemptNotFound)?;
    if locked.is_completed {
        return Err(AttemptError::AlreadyCompleted);
    }

    let answers = crate::repositories::attempts::list_answers_in_tx(&mut *tx, attempt_id).await?;

    let now = primitive_now_utc();
    let mut correct_count: i32 = 0;
    let mut score: i32 = 0;

    for answer in &answers {
        let Some((key, points)) = keys.get(answer.question_id.as_str()) else {
            // The question was detached or deleted after the attempt began.
            tracing::warn!(
                attempt_id,
                question_id = %answer.question_id,
                "skipping answer to question no longer on the test"
            );
            continue;
        };

        let is_correct = serde_json::from_value::<AnswerPayload>(answer.payload.0.clone())
            .map(|payload| check_answer(key, &payload))
            .unwrap_or(false);
        let points_earned = if is_correct { *points } else { 0 };

        crate::repositories::attempts::set_answer_grade(
            &mut *tx,
            &answer.id,
            is_correct,
            points_earned,
            now,
        )
        .await?;

        if is_correct {
            correct_count += 1;
        }
        score += points_earned;
    }

    // Unanswered questions count against the student.
    let total_questions = questions.len() as i32;
    let percentage = if total_questions == 0 {
        0.0
    } else {
        f64::from(correct_count) / f64::from(total_questions) * 100.0
    };
    let grade = grade_band(percentage);
    let time_spent_minutes = (now - locked.started_at).whole_minutes().max(0) as i32;

    let updated = crate::repositories::attempts::finalize(
        &mut *tx,
        attempt_id,
        crate::repositories::attempts::FinalizeAttempt {
            ended_at: now,
            score,
            grade,
            time_spent_minutes,
        },
    )
    .await?;
    if updated == 0 {
        return Err(AttemptError::AlreadyCompleted);
    }

    tx.commit().await?;

    Ok(AttemptOutcome {
        correct_count,
        total_questions,
        percentage,
        score,
        grade,
        time_spent_minutes,
        started_at: locked.started_at,
        ended_at: now,
    })
}

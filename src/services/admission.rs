use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{CourseTest, TestAttempt};
use crate::repositories::attempts::{self, CreateAttempt};

/// Why an attempt cannot proceed. Mapped to HTTP statuses at the handler
/// boundary.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AttemptError {
    #[error("test is not available to this student")]
    AccessDenied,
    #[error("test not found")]
    TestNotFound,
    #[error("attempt not found")]
    AttemptNotFound,
    #[error("deadline has passed")]
    DeadlineExpired,
    #[error("attempt limit reached ({used}/{allowed})")]
    QuotaExceeded { used: i64, allowed: i32 },
    #[error("attempt is already completed")]
    AlreadyCompleted,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Soft reasons the test cannot be started right now. Unlike the hard
/// failures these are reported, not thrown: the availability read model
/// returns them as `can_start = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Denial {
    DeadlineExpired,
    QuotaExceeded,
}

#[derive(Debug)]
pub(crate) struct Availability {
    pub(crate) binding: CourseTest,
    pub(crate) attempts_used: i64,
    pub(crate) denial: Option<Denial>,
}

/// The three admission gates, in order: reachability through an active
/// course binding, deadline, attempt quota. An unreachable or missing test
/// is a hard error; a passed deadline or exhausted quota is a denial.
pub(crate) async fn check_availability(
    state: &AppState,
    test_id: &str,
    student_id: &str,
) -> Result<Availability, AttemptError> {
    if crate::repositories::tests::find_by_id(state.db(), test_id)
        .await?
        .is_none()
    {
        return Err(AttemptError::TestNotFound);
    }

    let binding =
        crate::repositories::tests::find_binding_for_student(state.db(), test_id, student_id)
            .await?
            .ok_or(AttemptError::AccessDenied)?;

    let attempts_used = attempts::count_for_student(state.db(), test_id, student_id).await?;

    let denial = if binding
        .deadline
        .is_some_and(|deadline| primitive_now_utc() > deadline)
    {
        Some(Denial::DeadlineExpired)
    } else if attempts_used >= i64::from(binding.attempts_allowed) {
        Some(Denial::QuotaExceeded)
    } else {
        None
    };

    Ok(Availability {
        binding,
        attempts_used,
        denial,
    })
}

/// Admits the student and creates the attempt row. The unique index on
/// (test_id, student_id, attempt_number) turns two racing starts into one
/// winner; the loser re-checks the quota and takes the next number.
pub(crate) async fn start_attempt(
    state: &AppState,
    test_id: &str,
    student_id: &str,
) -> Result<TestAttempt, AttemptError> {
    const MAX_NUMBERING_RETRIES: u32 = 3;

    for _ in 0..=MAX_NUMBERING_RETRIES {
        let availability = check_availability(state, test_id, student_id).await?;
        match availability.denial {
            Some(Denial::DeadlineExpired) => return Err(AttemptError::DeadlineExpired),
            Some(Denial::QuotaExceeded) => {
                return Err(AttemptError::QuotaExceeded {
                    used: availability.attempts_used,
                    allowed: availability.binding.attempts_allowed,
                })
            }
            None => {}
        }

        let attempt_number = i32::try_from(availability.attempts_used).unwrap_or(i32::MAX) + 1;
        let created = attempts::insert(
            state.db(),
            CreateAttempt {
                id: &Uuid::new_v4().to_string(),
                test_id,
                student_id,
                attempt_number,
                started_at: primitive_now_utc(),
            },
        )
        .await;

        match created {
            Ok(attempt) => return Ok(attempt),
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!(
                    test_id,
                    student_id,
                    attempt_number,
                    "attempt number taken, retrying"
                );
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    // Every retry lost the numbering race; by now the quota is the honest
    // answer to report.
    let availability = check_availability(state, test_id, student_id).await?;
    Err(AttemptError::QuotaExceeded {
        used: availability.attempts_used,
        allowed: availability.binding.attempts_allowed,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

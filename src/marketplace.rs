//! The marketplace buy back: a student spends accumulated savings to reopen
//! an assignment they failed or let lapse. Savings are read from graded
//! scores, purchases are negative euro entries in the ledger, and the whole
//! reclaim is one transaction.

use log::info;
use sqlx::{SqliteConnection, SqlitePool};

use crate::assignment::get_assignment;
use crate::error::LessonError;
use crate::ledger::{self, LedgerReason};
use crate::schema::{Assignment, AssignmentStatus};
use crate::FAR_FUTURE_DEADLINE_MS;

/// What the student can still spend: the euro value earned through graded
/// assignments minus what earlier buy backs already consumed.
pub async fn available_savings(
    con: &mut SqliteConnection,
    student_id: i64,
) -> Result<f64, LessonError> {
    let earned: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT SUM(lesson.price * assignment.score / 100.0)
        FROM assignment
        INNER JOIN lesson ON lesson.id = assignment.lesson_id
        WHERE assignment.student_id = ? AND assignment.status = 'GRADED'
        "#,
    )
    .bind(student_id)
    .fetch_one(&mut *con)
    .await?;

    let spent =
        ledger::euro_sum_for_user_by_reason(con, student_id, LedgerReason::MarketplacePurchase)
            .await?;

    Ok(earned.unwrap_or(0.0) + spent)
}

/// Buys a failed or lapsed assignment back and resets it in place, so the
/// student can retake it as if it was freshly assigned.
pub async fn reclaim(
    db: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
    now: i64,
) -> Result<Assignment, LessonError> {
    let mut tx = db.begin().await?;

    let assignment = crate::assignment::fetch_assignment_row(&mut *tx, assignment_id).await?;
    if assignment.student_id != student_id {
        return Err(LessonError::forbidden("this assignment belongs to another student"));
    }

    // one buy back per assignment, ever; checked first so a reopened
    // assignment answers with the right error
    if ledger::exists_for_assignment(&mut tx, assignment_id, LedgerReason::MarketplacePurchase)
        .await?
    {
        return Err(LessonError::AlreadyPurchased);
    }

    let eligible = match AssignmentStatus::parse(&assignment.status)? {
        AssignmentStatus::Failed => true,
        AssignmentStatus::Pending => assignment.deadline <= now,
        _ => false,
    };
    if !eligible {
        return Err(LessonError::not_eligible(
            "only failed or lapsed assignments can be bought back",
        ));
    }

    let lesson = crate::catalog::fetch_lesson_row(&mut *tx, assignment.lesson_id).await?;
    let savings = available_savings(&mut tx, student_id).await?;
    if lesson.price > savings {
        return Err(LessonError::InsufficientSavings {
            required: lesson.price,
            available: savings,
        });
    }

    ledger::record(
        &mut tx,
        student_id,
        Some(assignment_id),
        0,
        -lesson.price,
        LedgerReason::MarketplacePurchase,
        Some(&format!("bought back '{}'", lesson.title)),
        now,
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE assignment
        SET status = 'PENDING', deadline = ?, answers = NULL, score = NULL,
            teacher_comments = NULL, points_awarded = NULL, extra_points = 0,
            graded_at = NULL, tries = 0, tap_count = 0
        WHERE id = ?
        "#,
    )
    .bind(FAR_FUTURE_DEADLINE_MS)
    .bind(assignment_id)
    .execute(&mut *tx)
    .await?;

    // the word taps start over as well
    sqlx::query("DELETE FROM word_tap WHERE assignment_id = ?")
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(
        "student {} bought back assignment {} for {:.2}",
        student_id, assignment_id, lesson.price
    );

    get_assignment(db, assignment_id).await
}

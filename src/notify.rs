//! The scheduled notifier boundary. Cron hits these entry points; they only
//! read assignment state and flip PENDING rows to FAILED once the deadline is
//! over. Mail itself is an external collaborator: `dispatch` records the
//! notification and never lets a failure bubble into the caller's work.

use log::{info, warn};
use sqlx::SqlitePool;

use crate::error::LessonError;

pub const KIND_ASSIGNED: &str = "ASSIGNED";
pub const KIND_GRADED: &str = "GRADED";
pub const KIND_FAILED: &str = "FAILED";
pub const KIND_REMINDER: &str = "DEADLINE_REMINDER";

/// Fire and forget. The log row stands in for the mail handover; if even
/// that fails we note it and move on, the surrounding work is already done.
pub async fn dispatch(
    db: &SqlitePool,
    user_id: i64,
    assignment_id: Option<i64>,
    kind: &str,
    detail: Option<String>,
    now: i64,
) {
    info!("notify user {} ({}): {:?}", user_id, kind, detail);
    let result = sqlx::query(
        "INSERT INTO notification_log(user_id, assignment_id, kind, detail, sent_at) VALUES (?,?,?,?,?)",
    )
    .bind(user_id)
    .bind(assignment_id)
    .bind(kind)
    .bind(&detail)
    .bind(now)
    .execute(db)
    .await;

    if let Err(e) = result {
        warn!("could not record the {} notification for user {} ({})", kind, user_id, e);
    }
}

/// What was recently sent to a user, newest first.
pub async fn recent_for_user(
    db: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<crate::schema::Notification>, LessonError> {
    let rows = sqlx::query_as::<_, crate::model::NotificationRow>(
        "SELECT * FROM notification_log WHERE user_id = ? ORDER BY id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| crate::schema::Notification {
            id: r.id,
            user_id: r.user_id,
            assignment_id: r.assignment_id,
            kind: r.kind,
            detail: r.detail,
            sent_at: r.sent_at,
        })
        .collect())
}

/// Flips every pending assignment whose deadline is over to FAILED. The
/// status guard in the update makes replays harmless.
pub async fn fail_overdue(db: &SqlitePool, now: i64) -> Result<u64, LessonError> {
    let overdue: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT id, student_id FROM assignment WHERE status = 'PENDING' AND deadline < ?",
    )
    .bind(now)
    .fetch_all(db)
    .await?;

    let mut failed = 0;
    for (assignment_id, student_id) in overdue {
        let result = sqlx::query(
            "UPDATE assignment SET status = 'FAILED' WHERE id = ? AND status = 'PENDING' AND deadline < ?",
        )
        .bind(assignment_id)
        .bind(now)
        .execute(db)
        .await?;

        if result.rows_affected() == 1 {
            failed += 1;
            dispatch(
                db,
                student_id,
                Some(assignment_id),
                KIND_FAILED,
                Some("the deadline has passed".to_string()),
                now,
            )
            .await;
        }
    }

    if failed > 0 {
        info!("{} assignments failed their deadline", failed);
    }
    Ok(failed)
}

/// Reminds students of deadlines inside the window. Already reminded
/// assignments are skipped, so a replayed cron never spams.
pub async fn remind_upcoming(
    db: &SqlitePool,
    window_ms: i64,
    now: i64,
) -> Result<u64, LessonError> {
    let upcoming: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT a.id, a.student_id FROM assignment a
        WHERE a.status = 'PENDING' AND a.deadline > ? AND a.deadline <= ?
          AND NOT EXISTS (
            SELECT 1 FROM notification_log n
            WHERE n.assignment_id = a.id AND n.kind = ?
          )
        "#,
    )
    .bind(now)
    .bind(now + window_ms)
    .bind(KIND_REMINDER)
    .fetch_all(db)
    .await?;

    let mut reminded = 0;
    for (assignment_id, student_id) in upcoming {
        dispatch(
            db,
            student_id,
            Some(assignment_id),
            KIND_REMINDER,
            Some("the deadline is coming up".to_string()),
            now,
        )
        .await;
        reminded += 1;
    }
    Ok(reminded)
}

/// Auto assigns every lesson whose scheduled date has arrived. Duplicate
/// pairs are skipped inside `auto_assign`, so this too can be re-triggered.
pub async fn run_scheduled_assignments(db: &SqlitePool, now: i64) -> Result<u64, LessonError> {
    let lesson_ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM lesson
        WHERE notification_mode = 'ASSIGN_ON_DATE'
          AND scheduled_assignment_date IS NOT NULL
          AND scheduled_assignment_date <= ?
        "#,
    )
    .bind(now)
    .fetch_all(db)
    .await?;

    let mut created = 0;
    for lesson_id in lesson_ids {
        created += crate::assignment::auto_assign(db, lesson_id, now).await?;
    }
    Ok(created)
}

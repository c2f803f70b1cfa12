//! The assignment record: one row per (lesson, student) pairing, moved along
//! the lifecycle PENDING -> COMPLETED -> GRADED, or PENDING -> FAILED once the
//! deadline lapses. The marketplace resets rows in place, it never clones them.

use log::info;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::LessonError;
use crate::ledger::{self, LedgerReason};
use crate::model::AssignmentRow;
use crate::schema::{Assignment, AssignmentStatus, NotificationMode};
use crate::DEFAULT_ASSIGN_WINDOW_MS;

pub(crate) fn assignment_from_row(row: AssignmentRow) -> Result<Assignment, LessonError> {
    let answers = match row.answers {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            LessonError::internal(format!("stored answers of assignment {} are corrupt ({})", row.id, e))
        })?),
        None => None,
    };
    Ok(Assignment {
        id: row.id,
        lesson_id: row.lesson_id,
        student_id: row.student_id,
        status: AssignmentStatus::parse(&row.status)?,
        deadline: row.deadline,
        original_deadline: row.original_deadline,
        start_date: row.start_date,
        answers,
        score: row.score,
        teacher_comments: row.teacher_comments,
        points_awarded: row.points_awarded,
        extra_points: row.extra_points,
        graded_at: row.graded_at,
        tries: row.tries,
        tap_count: row.tap_count,
    })
}

pub(crate) async fn fetch_assignment_row(
    con: &mut sqlx::SqliteConnection,
    id: i64,
) -> Result<AssignmentRow, LessonError> {
    sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignment WHERE id = ?")
        .bind(id)
        .fetch_optional(con)
        .await?
        .ok_or_else(|| LessonError::not_found(format!("assignment {} was not found", id)))
}

/// Binds a lesson to one student. The unique constraint on (lesson, student)
/// keeps a second active lifecycle from ever being created.
pub async fn assign_lesson(
    db: &SqlitePool,
    lesson_id: i64,
    student_id: i64,
    deadline: Option<i64>,
    start_date: Option<i64>,
    now: i64,
) -> Result<Assignment, LessonError> {
    // both sides of the pairing have to exist
    let mut con = db.acquire().await?;
    crate::catalog::fetch_lesson_row(&mut con, lesson_id).await?;
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM user WHERE id = ?")
        .bind(student_id)
        .fetch_optional(&mut *con)
        .await?;
    drop(con);
    match role.as_deref() {
        Some("STUDENT") => (),
        Some(_) => {
            return Err(LessonError::validation("lessons can only be assigned to students"))
        }
        None => return Err(LessonError::not_found(format!("user {} was not found", student_id))),
    }

    let start = start_date.unwrap_or(now);
    let deadline = deadline.unwrap_or(start + DEFAULT_ASSIGN_WINDOW_MS);
    if deadline < start {
        return Err(LessonError::validation("the deadline lies before the start date"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO assignment(lesson_id, student_id, status, deadline, original_deadline, start_date)
        VALUES (?,?,'PENDING',?,?,?)
        "#,
    )
    .bind(lesson_id)
    .bind(student_id)
    .bind(deadline)
    .bind(deadline)
    .bind(start)
    .execute(db)
    .await;

    let id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => {
            return Err(LessonError::validation(
                "this lesson is already assigned to the student",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    info!("lesson {} assigned to student {} (assignment {})", lesson_id, student_id, id);
    get_assignment(db, id).await
}

/// Creates an assignment for every student, skipping pairs that already
/// exist, so a replayed trigger never duplicates rows. Returns how many
/// assignments were actually created.
pub async fn auto_assign(db: &SqlitePool, lesson_id: i64, now: i64) -> Result<u64, LessonError> {
    let lesson = crate::catalog::get_lesson(db, lesson_id).await?;

    match lesson.notification_mode {
        NotificationMode::NotAssigned => return Ok(0),
        NotificationMode::AssignOnDate => {
            let scheduled = lesson.scheduled_assignment_date.ok_or_else(|| {
                LessonError::validation("the lesson has no scheduled assignment date")
            })?;
            if now < scheduled {
                return Ok(0);
            }
        }
        NotificationMode::AssignWithoutNotification | NotificationMode::AssignAndNotify => (),
    }

    let student_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM user WHERE role = 'STUDENT'")
        .fetch_all(db)
        .await?;

    let deadline = now + DEFAULT_ASSIGN_WINDOW_MS;
    let mut created: Vec<i64> = Vec::new();

    let mut tx = db.begin().await?;
    for student_id in student_ids {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO assignment(lesson_id, student_id, status, deadline, original_deadline, start_date)
            VALUES (?,?,'PENDING',?,?,?)
            "#,
        )
        .bind(lesson_id)
        .bind(student_id)
        .bind(deadline)
        .bind(deadline)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 1 {
            created.push(student_id);
        }
    }
    tx.commit().await?;

    info!("auto assigned lesson {} to {} students", lesson_id, created.len());

    if lesson.notification_mode == NotificationMode::AssignAndNotify {
        for student_id in &created {
            crate::notify::dispatch(
                db,
                *student_id,
                None,
                crate::notify::KIND_ASSIGNED,
                Some(format!("new lesson: {}", lesson.title)),
                now,
            )
            .await;
        }
    }

    Ok(created.len() as u64)
}

pub async fn get_assignment(db: &SqlitePool, id: i64) -> Result<Assignment, LessonError> {
    let mut con = db.acquire().await?;
    let row = fetch_assignment_row(&mut con, id).await?;
    assignment_from_row(row)
}

pub async fn list_for_student(
    db: &SqlitePool,
    student_id: i64,
) -> Result<Vec<Assignment>, LessonError> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM assignment WHERE student_id = ? ORDER BY deadline ASC",
    )
    .bind(student_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(assignment_from_row).collect()
}

pub async fn list_for_lesson(
    db: &SqlitePool,
    lesson_id: i64,
) -> Result<Vec<Assignment>, LessonError> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM assignment WHERE lesson_id = ? ORDER BY student_id ASC",
    )
    .bind(lesson_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(assignment_from_row).collect()
}

/// The grading mutation without the surrounding commit, so the whole write
/// set stays abortable. Returns the student to notify afterwards.
pub(crate) async fn grade_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    assignment_id: i64,
    teacher_id: i64,
    score: f64,
    comments: Option<&str>,
    extra_points: i64,
    now: i64,
) -> Result<i64, LessonError> {
    if !(0.0..=100.0).contains(&score) {
        return Err(LessonError::validation("the score must be between 0 and 100"));
    }

    let assignment = fetch_assignment_row(&mut *tx, assignment_id).await?;
    let lesson = crate::catalog::fetch_lesson_row(&mut *tx, assignment.lesson_id).await?;
    if lesson.teacher_id != teacher_id {
        return Err(LessonError::forbidden("this lesson belongs to another teacher"));
    }

    match AssignmentStatus::parse(&assignment.status)? {
        AssignmentStatus::Completed => (),
        AssignmentStatus::Graded => {
            return Err(LessonError::not_eligible("the assignment is already graded"))
        }
        _ => {
            return Err(LessonError::not_eligible(
                "only a submitted assignment can be graded",
            ))
        }
    }

    let points = score.round() as i64 + extra_points;
    let euros = lesson.price * score / 100.0;

    sqlx::query(
        r#"
        UPDATE assignment
        SET status = 'GRADED', score = ?, teacher_comments = ?, points_awarded = ?,
            extra_points = ?, graded_at = ?
        WHERE id = ?
        "#,
    )
    .bind(score)
    .bind(comments)
    .bind(points)
    .bind(extra_points)
    .bind(now)
    .bind(assignment_id)
    .execute(&mut **tx)
    .await?;

    ledger::record(
        tx,
        assignment.student_id,
        Some(assignment_id),
        points,
        euros,
        LedgerReason::AssignmentGraded,
        Some(&format!("graded with {:.0}%", score)),
        now,
    )
    .await?;

    Ok(assignment.student_id)
}

/// Teacher grades a submitted assignment. Score, points and the ledger entry
/// land in one transaction; the notification goes out after the commit and a
/// failure there only gets logged.
pub async fn grade(
    db: &SqlitePool,
    assignment_id: i64,
    teacher_id: i64,
    score: f64,
    comments: Option<&str>,
    extra_points: i64,
    now: i64,
) -> Result<Assignment, LessonError> {
    let mut tx = db.begin().await?;
    let student_id =
        grade_in_tx(&mut tx, assignment_id, teacher_id, score, comments, extra_points, now).await?;
    tx.commit().await?;

    crate::notify::dispatch(
        db,
        student_id,
        Some(assignment_id),
        crate::notify::KIND_GRADED,
        Some(format!("your work was graded with {:.0}%", score)),
        now,
    )
    .await;

    get_assignment(db, assignment_id).await
}

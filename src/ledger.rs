//! The append-only reward ledger. Every point or currency movement is one
//! `point_transaction` row; `record` is the only writer and it also applies
//! the delta to the denormalized `user.total_points` counter, inside the
//! transaction the caller already holds. Corrections are new offsetting rows.

use futures::future::join_all;
use log::debug;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::LessonError;
use crate::model::LedgerRow;
use crate::schema::{LeaderboardEntry, LedgerEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerReason {
    AssignmentGraded,
    ArkaningGame,
    FlipperMatch,
    NewsArticleTap,
    MarketplacePurchase,
    BadgeBonus,
    ManualAdjustment,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::AssignmentGraded => "ASSIGNMENT_GRADED",
            LedgerReason::ArkaningGame => "ARKANING_GAME",
            LedgerReason::FlipperMatch => "FLIPPER_MATCH",
            LedgerReason::NewsArticleTap => "NEWS_ARTICLE_TAP",
            LedgerReason::MarketplacePurchase => "MARKETPLACE_PURCHASE",
            LedgerReason::BadgeBonus => "BADGE_BONUS",
            LedgerReason::ManualAdjustment => "MANUAL_ADJUSTMENT",
        }
    }
}

/// Appends one ledger row and bumps the user counter by the same amount.
/// Takes the open transaction on purpose: a ledger write outside of one
/// could leave the counter and the ledger sum diverged.
pub async fn record(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    assignment_id: Option<i64>,
    points: i64,
    amount_euro: f64,
    reason: LedgerReason,
    note: Option<&str>,
    now: i64,
) -> Result<i64, LessonError> {
    let updated = sqlx::query("UPDATE user SET total_points = total_points + ? WHERE id = ?")
        .bind(points)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    if updated.rows_affected() != 1 {
        return Err(LessonError::not_found(format!("user {} was not found", user_id)));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO point_transaction(user_id, assignment_id, points, amount_euro, reason, note, created_at)
        VALUES (?,?,?,?,?,?,?)
        "#,
    )
    .bind(user_id)
    .bind(assignment_id)
    .bind(points)
    .bind(amount_euro)
    .bind(reason.as_str())
    .bind(note)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    debug!(
        "ledger: user {} {} {:+} points / {:+.2} euro",
        user_id,
        reason.as_str(),
        points,
        amount_euro
    );
    Ok(result.last_insert_rowid())
}

pub async fn points_sum_for_user(db: &SqlitePool, user_id: i64) -> Result<i64, LessonError> {
    let sum: Option<i64> =
        sqlx::query_scalar("SELECT SUM(points) FROM point_transaction WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(db)
            .await?;
    Ok(sum.unwrap_or(0))
}

pub async fn list_for_user(
    db: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<LedgerEntry>, LessonError> {
    let rows = sqlx::query_as::<_, LedgerRow>(
        "SELECT * FROM point_transaction WHERE user_id = ? ORDER BY id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| LedgerEntry {
            id: r.id,
            user_id: r.user_id,
            assignment_id: r.assignment_id,
            points: r.points,
            amount_euro: r.amount_euro,
            reason: r.reason,
            note: r.note,
            created_at: r.created_at,
        })
        .collect())
}

/// Whether an entry with this reason was already posted for the assignment.
pub async fn exists_for_assignment(
    con: &mut sqlx::SqliteConnection,
    assignment_id: i64,
    reason: LedgerReason,
) -> Result<bool, LessonError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM point_transaction WHERE assignment_id = ? AND reason = ?",
    )
    .bind(assignment_id)
    .bind(reason.as_str())
    .fetch_one(con)
    .await?;
    Ok(count > 0)
}

pub async fn euro_sum_for_user_by_reason(
    con: &mut sqlx::SqliteConnection,
    user_id: i64,
    reason: LedgerReason,
) -> Result<f64, LessonError> {
    let sum: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(amount_euro) FROM point_transaction WHERE user_id = ? AND reason = ?",
    )
    .bind(user_id)
    .bind(reason.as_str())
    .fetch_one(con)
    .await?;
    Ok(sum.unwrap_or(0.0))
}

/// Students ranked by their point total, savings fetched alongside.
pub async fn leaderboard(db: &SqlitePool, limit: i64) -> Result<Vec<LeaderboardEntry>, LessonError> {
    let rows = sqlx::query_as::<_, crate::model::UserRow>(
        "SELECT * FROM user WHERE role = 'STUDENT' ORDER BY total_points DESC, id ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    let entries = join_all(rows.into_iter().map(|user| async move {
        let mut con = db.acquire().await?;
        let savings = crate::marketplace::available_savings(&mut con, user.id).await?;
        Ok::<LeaderboardEntry, LessonError>(LeaderboardEntry {
            user_id: user.id,
            name: user.name,
            total_points: user.total_points,
            savings,
        })
    }))
    .await;

    entries.into_iter().collect()
}

use sqlx::sqlite::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod api;
pub mod assignment;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod http_res;
pub mod ledger;
pub mod marketplace;
mod model;
pub mod notify;
pub mod schema;
pub mod submission;

/// Shared state the http handlers pull their pool out of.
pub struct AppData {
    pub db: SqlitePool,
}

/// Assignments created without an explicit deadline get this window.
pub const DEFAULT_ASSIGN_WINDOW_MS: i64 = 36 * 60 * 60 * 1000;

/// Deadline sentinel a bought back assignment is reset to (2100-01-01 UTC).
pub const FAR_FUTURE_DEADLINE_MS: i64 = 4_102_444_800_000;

/// Points per euro, used wherever one currency is derived from the other.
pub const POINT_TO_EURO_RATE: f64 = 10.0;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::schema::{LessonConfig, NewLesson, NotificationMode};
    use sqlx::sqlite::SqlitePoolOptions;

    /// One connection so every statement of a test sees the same in-memory db.
    pub async fn migrate_test_db() -> SqlitePool {
        let con = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&con).await.unwrap();
        con
    }

    pub async fn create_teacher(db: &SqlitePool, name: &str) -> i64 {
        let (id, _key) = crate::auth::create_teacher(db, name).await.unwrap();
        id
    }

    pub async fn create_student(db: &SqlitePool, name: &str) -> i64 {
        let (id, _key) = crate::auth::create_student(db, name).await.unwrap();
        id
    }

    pub async fn create_lesson(
        db: &SqlitePool,
        teacher_id: i64,
        title: &str,
        price: f64,
        config: LessonConfig,
    ) -> crate::schema::Lesson {
        crate::catalog::create_lesson(
            db,
            teacher_id,
            NewLesson {
                title: title.to_string(),
                price,
                difficulty: 2,
                notification_mode: NotificationMode::NotAssigned,
                scheduled_assignment_date: None,
                config,
            },
        )
        .await
        .unwrap()
    }

    /// The one invariant every mutating test re-checks: the denormalized
    /// counter always equals the ledger sum.
    pub async fn assert_points_consistent(db: &SqlitePool, user_id: i64) {
        let total: i64 = sqlx::query_scalar("SELECT total_points FROM user WHERE id = ?")
            .bind(user_id)
            .fetch_one(db)
            .await
            .unwrap();
        let ledger_sum = crate::ledger::points_sum_for_user(db, user_id).await.unwrap();
        assert_eq!(
            total, ledger_sum,
            "user {} total_points diverged from the ledger",
            user_id
        );
    }
}

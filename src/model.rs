use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub api_key: String,
    pub total_points: i64,
    pub last_refresh: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct LessonRow {
    pub id: i64,
    pub teacher_id: i64,
    pub title: String,
    pub lesson_type: String,
    pub price: f64,
    pub difficulty: i64,
    pub notification_mode: String,
    pub scheduled_assignment_date: Option<i64>,
    pub config: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: i64,
    pub lesson_id: i64,
    pub student_id: i64,
    pub status: String,
    pub deadline: i64,
    pub original_deadline: i64,
    pub start_date: i64,
    pub answers: Option<String>,
    pub score: Option<f64>,
    pub teacher_comments: Option<String>,
    pub points_awarded: Option<i64>,
    pub extra_points: i64,
    pub graded_at: Option<i64>,
    pub tries: i64,
    pub tap_count: i64,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct LedgerRow {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: Option<i64>,
    pub points: i64,
    pub amount_euro: f64,
    pub reason: String,
    pub note: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct WordTapRow {
    pub assignment_id: i64,
    pub word: String,
    pub tap_count: i64,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct LyricAttemptRow {
    pub id: i64,
    pub assignment_id: i64,
    pub score: Option<f64>,
    pub time_taken_ms: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: Option<i64>,
    pub kind: String,
    pub detail: Option<String>,
    pub sent_at: i64,
}

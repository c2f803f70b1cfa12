use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LessonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonType {
    Standard,
    MultiChoice,
    Flashcard,
    Composer,
    Flipper,
    NewsArticle,
    Arkaning,
    LearningSession,
    Lyric,
}

impl LessonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Standard => "STANDARD",
            LessonType::MultiChoice => "MULTI_CHOICE",
            LessonType::Flashcard => "FLASHCARD",
            LessonType::Composer => "COMPOSER",
            LessonType::Flipper => "FLIPPER",
            LessonType::NewsArticle => "NEWS_ARTICLE",
            LessonType::Arkaning => "ARKANING",
            LessonType::LearningSession => "LEARNING_SESSION",
            LessonType::Lyric => "LYRIC",
        }
    }

    pub fn parse(s: &str) -> Result<LessonType, LessonError> {
        match s {
            "STANDARD" => Ok(LessonType::Standard),
            "MULTI_CHOICE" => Ok(LessonType::MultiChoice),
            "FLASHCARD" => Ok(LessonType::Flashcard),
            "COMPOSER" => Ok(LessonType::Composer),
            "FLIPPER" => Ok(LessonType::Flipper),
            "NEWS_ARTICLE" => Ok(LessonType::NewsArticle),
            "ARKANING" => Ok(LessonType::Arkaning),
            "LEARNING_SESSION" => Ok(LessonType::LearningSession),
            "LYRIC" => Ok(LessonType::Lyric),
            other => Err(LessonError::internal(format!(
                "unknown lesson type in database: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Graded,
    Failed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Graded => "GRADED",
            AssignmentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<AssignmentStatus, LessonError> {
        match s {
            "PENDING" => Ok(AssignmentStatus::Pending),
            "COMPLETED" => Ok(AssignmentStatus::Completed),
            "GRADED" => Ok(AssignmentStatus::Graded),
            "FAILED" => Ok(AssignmentStatus::Failed),
            other => Err(LessonError::internal(format!(
                "unknown assignment status in database: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationMode {
    NotAssigned,
    AssignWithoutNotification,
    AssignOnDate,
    AssignAndNotify,
}

impl NotificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationMode::NotAssigned => "NOT_ASSIGNED",
            NotificationMode::AssignWithoutNotification => "ASSIGN_WITHOUT_NOTIFICATION",
            NotificationMode::AssignOnDate => "ASSIGN_ON_DATE",
            NotificationMode::AssignAndNotify => "ASSIGN_AND_NOTIFY",
        }
    }

    pub fn parse(s: &str) -> Result<NotificationMode, LessonError> {
        match s {
            "NOT_ASSIGNED" => Ok(NotificationMode::NotAssigned),
            "ASSIGN_WITHOUT_NOTIFICATION" => Ok(NotificationMode::AssignWithoutNotification),
            "ASSIGN_ON_DATE" => Ok(NotificationMode::AssignOnDate),
            "ASSIGN_AND_NOTIFY" => Ok(NotificationMode::AssignAndNotify),
            other => Err(LessonError::internal(format!(
                "unknown notification mode in database: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashCard {
    pub id: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordQuestion {
    pub word: String,
    pub questions: Vec<String>,
}

/// The type specific lesson configuration. One variant per lesson type so the
/// submission dispatcher can match exhaustively instead of probing nullable
/// side records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonConfig {
    Standard,
    MultiChoice {
        questions: Vec<ChoiceQuestion>,
    },
    Flashcard {
        cards: Vec<FlashCard>,
    },
    #[serde(rename_all = "camelCase")]
    Composer {
        sentence: String,
        max_tries: i64,
        word_questions: Vec<WordQuestion>,
    },
    #[serde(rename_all = "camelCase")]
    Flipper {
        attempt_threshold: i64,
    },
    #[serde(rename_all = "camelCase")]
    NewsArticle {
        article: String,
        max_word_taps: i64,
    },
    #[serde(rename_all = "camelCase")]
    Arkaning {
        points_per_correct: i64,
        euros_per_correct: f64,
        lives: i64,
    },
    LearningSession {
        steps: Vec<String>,
    },
    Lyric {
        lyrics: String,
    },
}

impl LessonConfig {
    pub fn lesson_type(&self) -> LessonType {
        match self {
            LessonConfig::Standard => LessonType::Standard,
            LessonConfig::MultiChoice { .. } => LessonType::MultiChoice,
            LessonConfig::Flashcard { .. } => LessonType::Flashcard,
            LessonConfig::Composer { .. } => LessonType::Composer,
            LessonConfig::Flipper { .. } => LessonType::Flipper,
            LessonConfig::NewsArticle { .. } => LessonType::NewsArticle,
            LessonConfig::Arkaning { .. } => LessonType::Arkaning,
            LessonConfig::LearningSession { .. } => LessonType::LearningSession,
            LessonConfig::Lyric { .. } => LessonType::Lyric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub teacher_id: i64,
    pub title: String,
    pub lesson_type: LessonType,
    pub price: f64,
    pub difficulty: i64,
    pub notification_mode: NotificationMode,
    pub scheduled_assignment_date: Option<i64>,
    pub config: LessonConfig,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub title: String,
    pub price: f64,
    pub difficulty: i64,
    pub notification_mode: NotificationMode,
    pub scheduled_assignment_date: Option<i64>,
    pub config: LessonConfig,
}

/// Partial teacher edit. Fields that stay `None` keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonChanges {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub difficulty: Option<i64>,
    pub notification_mode: Option<NotificationMode>,
    pub scheduled_assignment_date: Option<i64>,
    pub config: Option<LessonConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub lesson_id: i64,
    pub student_id: i64,
    pub status: AssignmentStatus,
    pub deadline: i64,
    pub original_deadline: i64,
    pub start_date: i64,
    pub answers: Option<serde_json::Value>,
    pub score: Option<f64>,
    pub teacher_comments: Option<String>,
    pub points_awarded: Option<i64>,
    pub extra_points: i64,
    pub graded_at: Option<i64>,
    pub tries: i64,
    pub tap_count: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: Option<i64>,
    pub points: i64,
    pub amount_euro: f64,
    pub reason: String,
    pub note: Option<String>,
    pub created_at: i64,
}

/// What the reward endpoints hand back after one posted round.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDelta {
    pub points_delta: i64,
    pub euros_delta: f64,
    pub total_points: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapOutcome {
    pub points_delta: i64,
    pub euros_delta: f64,
    pub total_points: i64,
    pub tap_count: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricAttempt {
    pub id: i64,
    pub assignment_id: i64,
    pub score: Option<f64>,
    pub time_taken_ms: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTap {
    pub word: String,
    pub tap_count: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: Option<i64>,
    pub kind: String,
    pub detail: Option<String>,
    pub sent_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub name: String,
    pub total_points: i64,
    pub savings: f64,
}

// submission payloads, one shape per lesson type

#[derive(Debug, Deserialize)]
pub struct StandardAnswer {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MultiChoiceAnswers {
    pub answers: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardAnswers {
    pub cards: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub struct ComposerAnswer {
    pub words: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LearningSessionAck {
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricAttemptIn {
    pub score: Option<f64>,
    pub time_taken_ms: Option<i64>,
}

// request bodies of the HTTP surface

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    pub student_id: i64,
    pub deadline: Option<i64>,
    pub start_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBody {
    pub score: f64,
    pub teacher_comments: Option<String>,
    #[serde(default)]
    pub extra_points: i64,
}

#[derive(Debug, Deserialize)]
pub struct ArkaningBody {
    pub outcome: String,
}

#[derive(Debug, Deserialize)]
pub struct FlipperBody {
    pub attempts: i64,
    pub word: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsTapBody {
    pub word: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimBody {
    pub assignment_id: i64,
}

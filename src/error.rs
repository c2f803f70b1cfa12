//! The error taxonomy of the core. Business rule violations are detected
//! before any mutation, so returning one of these never leaves partial writes.

use actix_web::HttpResponse;

#[derive(Debug, PartialEq)]
pub enum LessonError {
    Validation { message: String },
    Unauthorized { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    DeadlinePassed,
    AlreadySubmitted,
    TapLimitReached { tap_count: i64 },
    AlreadyPurchased,
    InsufficientSavings { required: f64, available: f64 },
    NotEligible { message: String },
    Internal { message: String },
}

impl LessonError {
    pub fn validation(message: impl Into<String>) -> Self {
        LessonError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        LessonError::NotFound {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LessonError::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_eligible(message: impl Into<String>) -> Self {
        LessonError::NotEligible {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        LessonError::Internal {
            message: message.into(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            LessonError::Validation { message }
            | LessonError::Unauthorized { message }
            | LessonError::Forbidden { message }
            | LessonError::NotFound { message }
            | LessonError::NotEligible { message } => message.clone(),
            LessonError::DeadlinePassed => "the deadline for this assignment has passed".to_string(),
            LessonError::AlreadySubmitted => "this assignment was already submitted".to_string(),
            LessonError::TapLimitReached { tap_count } => {
                format!("the word tap limit is reached ({} taps)", tap_count)
            }
            LessonError::AlreadyPurchased => {
                "this assignment was already bought back".to_string()
            }
            LessonError::InsufficientSavings {
                required,
                available,
            } => format!(
                "not enough savings ({:.2} needed, {:.2} available)",
                required, available
            ),
            LessonError::Internal { message } => {
                // the detail stays server side
                log::warn!("internal error: {}", message);
                "something went wrong".to_string()
            }
        }
    }

    pub fn to_response(&self) -> HttpResponse {
        let body = serde_json::json!({ "error": self.message() });
        match self {
            LessonError::Unauthorized { .. } => HttpResponse::Unauthorized().json(body),
            LessonError::Forbidden { .. } => HttpResponse::Forbidden().json(body),
            LessonError::NotFound { .. } => HttpResponse::NotFound().json(body),
            LessonError::Internal { .. } => HttpResponse::InternalServerError().json(body),
            _ => HttpResponse::BadRequest().json(body),
        }
    }
}

impl std::fmt::Display for LessonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl From<sqlx::Error> for LessonError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => LessonError::NotFound {
                message: "the requested row was not found".to_string(),
            },
            e => LessonError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for LessonError {
    fn from(e: serde_json::Error) -> Self {
        LessonError::Validation {
            message: format!("malformed payload ({})", e),
        }
    }
}

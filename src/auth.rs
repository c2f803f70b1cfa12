//! Here is all we need for authentication
//!
//! Every request carries an api key in the Authorization header. Teacher keys
//! are prefixed with TEACH_, student keys are plain hashes. Keys expire when
//! they are not used within their refresh window; every authenticated request
//! slides the window forward.
//!
//! Impersonation is request context only: a teacher may add an Act-As header
//! naming a student, which yields an explicit `ActingAs` pair. Nothing about
//! it is ever written to the user row.

use actix_web::{HttpRequest, HttpResponse};
use log::info;
use sha256::digest;
use sqlx::SqlitePool;

use crate::error::LessonError;
use crate::model::UserRow;
use crate::{BadRequest, Forbidden, NotFound, Unauthorized};

/// How long a key may rest between requests before it goes stale.
pub const STUDENT_REFRESH_WINDOW_MS: i64 = 18_000 * 1000;
pub const TEACHER_REFRESH_WINDOW_MS: i64 = 36_000 * 1000;

/// The authenticated caller, with everything the handlers need to check
/// ownership.
#[derive(Debug)]
pub enum AuthUser {
    Teacher { id: i64, api_key: String },
    Student { id: i64, api_key: String },
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        match self {
            AuthUser::Teacher { id, .. } | AuthUser::Student { id, .. } => *id,
        }
    }
}

/// Who is really calling and on whose behalf the request acts. The two ids
/// are equal unless a teacher impersonates a student for this one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingAs {
    pub real_user_id: i64,
    pub effective_user_id: i64,
}

fn req2key(req: &HttpRequest) -> Result<String, HttpResponse> {
    let api_key_opt = req.headers().get(actix_web::http::header::AUTHORIZATION);
    let api_key = match api_key_opt {
        Some(v) => v,
        None => return Err(Unauthorized!("No api_key was supplied")),
    };

    match api_key.to_str() {
        Ok(s) => Ok(s.to_string()),
        Err(_) => Err(BadRequest!("There where none-ascii characters in the api key")),
    }
}

/**
 * Get the user from the database. While doing this the validity of the
 * session is checked and the refresh window slides forward.
 */
pub async fn get_user(req: &HttpRequest, db: &SqlitePool) -> Result<AuthUser, HttpResponse> {
    let api_key = req2key(req)?;
    let now = crate::now_ms();

    let user_opt = sqlx::query_as::<_, UserRow>("SELECT * FROM user WHERE api_key = ?")
        .bind(&api_key)
        .fetch_optional(db)
        .await;

    let user = match user_opt {
        Ok(Some(u)) => u,
        Ok(None) => return Err(NotFound!("The api_key was not found")),
        Err(e) => return Err(crate::InternalServer!(format!("Error while fetching user db ({e})"))),
    };

    let window = if user.role == "TEACHER" {
        TEACHER_REFRESH_WINDOW_MS
    } else {
        STUDENT_REFRESH_WINDOW_MS
    };
    if now - user.last_refresh > window {
        return Err(Forbidden!("Sorry, key was not refreshed"));
    }

    // reset last_refresh
    if let Err(e) = sqlx::query("UPDATE user SET last_refresh = ? WHERE id = ?")
        .bind(now)
        .bind(user.id)
        .execute(db)
        .await
    {
        return Err(crate::InternalServer!(format!(
            "There was an error while updating the refresh time ({e})"
        )));
    }

    if user.role == "TEACHER" {
        Ok(AuthUser::Teacher {
            id: user.id,
            api_key,
        })
    } else {
        Ok(AuthUser::Student {
            id: user.id,
            api_key,
        })
    }
}

/// Resolves the student a student scoped endpoint acts for. Students act for
/// themselves; a teacher has to name a student in the Act-As header.
pub async fn acting_student(
    req: &HttpRequest,
    db: &SqlitePool,
) -> Result<ActingAs, HttpResponse> {
    let user = get_user(req, db).await?;

    let act_as = match req.headers().get("Act-As") {
        Some(v) => match v.to_str() {
            Ok(s) => Some(s.to_string()),
            Err(_) => return Err(BadRequest!("There where none-ascii characters in the Act-As header")),
        },
        None => None,
    };

    match (user, act_as) {
        (AuthUser::Student { id, .. }, None) => Ok(ActingAs {
            real_user_id: id,
            effective_user_id: id,
        }),
        (AuthUser::Student { .. }, Some(_)) => {
            Err(Forbidden!("Only teachers can act as somebody else"))
        }
        (AuthUser::Teacher { .. }, None) => {
            Err(Forbidden!("This endpoint acts for a student, add an Act-As header"))
        }
        (AuthUser::Teacher { id, .. }, Some(target)) => {
            let student_id: i64 = match target.trim().parse() {
                Ok(v) => v,
                Err(_) => return Err(BadRequest!("The Act-As header has to be a user id")),
            };

            let role: Option<String> = match sqlx::query_scalar("SELECT role FROM user WHERE id = ?")
                .bind(student_id)
                .fetch_optional(db)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    return Err(crate::InternalServer!(format!(
                        "Error while fetching the Act-As user ({e})"
                    )))
                }
            };

            match role.as_deref() {
                Some("STUDENT") => {
                    info!("teacher {} acts as student {}", id, student_id);
                    Ok(ActingAs {
                        real_user_id: id,
                        effective_user_id: student_id,
                    })
                }
                Some(_) => Err(Forbidden!("You can only act as a student")),
                None => Err(NotFound!("The Act-As user was not found")),
            }
        }
    }
}

/// generate a random hash
fn gen_api_key() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes: [u8; 64] = [0; 64];
    rand::RngCore::fill_bytes(&mut rng, &mut bytes);
    let tmp: String = bytes.into_iter().map(|v| format!("{:x}", v)).collect();
    digest(tmp)
}

async fn insert_user(
    db: &SqlitePool,
    name: &str,
    role: &str,
    api_key: &str,
) -> Result<i64, LessonError> {
    if name.trim().is_empty() {
        return Err(LessonError::validation("the name must not be empty"));
    }
    let now = crate::now_ms();
    let result = sqlx::query(
        "INSERT INTO user(name, role, api_key, total_points, last_refresh, created_at) VALUES (?,?,?,0,?,?)",
    )
    .bind(name)
    .bind(role)
    .bind(api_key)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(result.last_insert_rowid())
}

/// create a student, handing back the id and the fresh api key
pub async fn create_student(db: &SqlitePool, name: &str) -> Result<(i64, String), LessonError> {
    let key = gen_api_key();
    let id = insert_user(db, name, "STUDENT", &key).await?;
    Ok((id, key))
}

/// create a teacher with a TEACH_ prefixed key
pub async fn create_teacher(db: &SqlitePool, name: &str) -> Result<(i64, String), LessonError> {
    let key = format!("TEACH_{}", gen_api_key());
    let id = insert_user(db, name, "TEACHER", &key).await?;
    Ok((id, key))
}

//! The http surface. Handlers are thin: resolve the caller, forward to the
//! core operation, map the result. Every error leaves as `{"error": ...}`
//! with the matching status code.

use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::{self, AuthUser};
use crate::schema::{
    ArkaningBody, AssignBody, FlipperBody, GradeBody, LessonChanges, NewLesson, NewsTapBody,
    ReclaimBody,
};
use crate::{AppData, Forbidden};

fn require_teacher(user: AuthUser) -> Result<i64, HttpResponse> {
    match user {
        AuthUser::Teacher { id, .. } => Ok(id),
        AuthUser::Student { .. } => Err(Forbidden!("Only teachers can do this")),
    }
}

pub async fn create_lesson(
    req: HttpRequest,
    data: web::Data<AppData>,
    body: web::Json<NewLesson>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let teacher_id = match require_teacher(user) {
        Ok(id) => id,
        Err(e) => return e,
    };

    match crate::catalog::create_lesson(&data.db, teacher_id, body.into_inner()).await {
        Ok(lesson) => HttpResponse::Ok().json(lesson),
        Err(e) => e.to_response(),
    }
}

pub async fn update_lesson(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<LessonChanges>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let teacher_id = match require_teacher(user) {
        Ok(id) => id,
        Err(e) => return e,
    };

    match crate::catalog::update_lesson(&data.db, path.into_inner(), teacher_id, body.into_inner())
        .await
    {
        Ok(lesson) => HttpResponse::Ok().json(lesson),
        Err(e) => e.to_response(),
    }
}

pub async fn delete_lesson(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let teacher_id = match require_teacher(user) {
        Ok(id) => id,
        Err(e) => return e,
    };

    match crate::catalog::delete_lesson(&data.db, path.into_inner(), teacher_id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({"success": true})),
        Err(e) => e.to_response(),
    }
}

/// A teacher may only hand out their own lessons.
async fn check_lesson_owner(
    db: &sqlx::SqlitePool,
    lesson_id: i64,
    teacher_id: i64,
) -> Result<(), HttpResponse> {
    match crate::catalog::get_lesson(db, lesson_id).await {
        Ok(lesson) if lesson.teacher_id == teacher_id => Ok(()),
        Ok(_) => Err(Forbidden!("This lesson belongs to another teacher")),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn assign_lesson(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<AssignBody>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let teacher_id = match require_teacher(user) {
        Ok(id) => id,
        Err(e) => return e,
    };
    let lesson_id = path.into_inner();
    if let Err(e) = check_lesson_owner(&data.db, lesson_id, teacher_id).await {
        return e;
    }

    let body = body.into_inner();
    match crate::assignment::assign_lesson(
        &data.db,
        lesson_id,
        body.student_id,
        body.deadline,
        body.start_date,
        crate::now_ms(),
    )
    .await
    {
        Ok(assignment) => HttpResponse::Ok().json(assignment),
        Err(e) => e.to_response(),
    }
}

pub async fn auto_assign(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let teacher_id = match require_teacher(user) {
        Ok(id) => id,
        Err(e) => return e,
    };
    let lesson_id = path.into_inner();
    if let Err(e) = check_lesson_owner(&data.db, lesson_id, teacher_id).await {
        return e;
    }

    match crate::assignment::auto_assign(&data.db, lesson_id, crate::now_ms()).await {
        Ok(created) => HttpResponse::Ok().json(serde_json::json!({"created": created})),
        Err(e) => e.to_response(),
    }
}

pub async fn get_assignment(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };

    let assignment = match crate::assignment::get_assignment(&data.db, path.into_inner()).await {
        Ok(a) => a,
        Err(e) => return e.to_response(),
    };

    // visible to the student it belongs to and to the lesson's teacher
    let allowed = match &user {
        AuthUser::Student { id, .. } => assignment.student_id == *id,
        AuthUser::Teacher { id, .. } => {
            match crate::catalog::get_lesson(&data.db, assignment.lesson_id).await {
                Ok(lesson) => lesson.teacher_id == *id,
                Err(e) => return e.to_response(),
            }
        }
    };
    if !allowed {
        return Forbidden!("This assignment is not yours to see");
    }

    HttpResponse::Ok().json(assignment)
}

pub async fn submit(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let acting = match auth::acting_student(&req, &data.db).await {
        Ok(a) => a,
        Err(e) => return e,
    };

    match crate::submission::submit(
        &data.db,
        path.into_inner(),
        acting.effective_user_id,
        body.into_inner(),
        crate::now_ms(),
    )
    .await
    {
        Ok(assignment) => HttpResponse::Ok().json(assignment),
        Err(e) => e.to_response(),
    }
}

pub async fn arkaning(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<ArkaningBody>,
) -> HttpResponse {
    let acting = match auth::acting_student(&req, &data.db).await {
        Ok(a) => a,
        Err(e) => return e,
    };

    match crate::submission::arkaning_round(
        &data.db,
        path.into_inner(),
        acting.effective_user_id,
        &body.outcome,
        crate::now_ms(),
    )
    .await
    {
        Ok(delta) => HttpResponse::Ok().json(delta),
        Err(e) => e.to_response(),
    }
}

pub async fn flipper(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<FlipperBody>,
) -> HttpResponse {
    let acting = match auth::acting_student(&req, &data.db).await {
        Ok(a) => a,
        Err(e) => return e,
    };

    match crate::submission::flipper_match(
        &data.db,
        path.into_inner(),
        acting.effective_user_id,
        body.attempts,
        body.word.as_deref(),
        crate::now_ms(),
    )
    .await
    {
        Ok(delta) => HttpResponse::Ok().json(delta),
        Err(e) => e.to_response(),
    }
}

pub async fn news_article(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<NewsTapBody>,
) -> HttpResponse {
    let acting = match auth::acting_student(&req, &data.db).await {
        Ok(a) => a,
        Err(e) => return e,
    };

    match crate::submission::news_article_tap(
        &data.db,
        path.into_inner(),
        acting.effective_user_id,
        body.word.as_deref(),
        crate::now_ms(),
    )
    .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => e.to_response(),
    }
}

pub async fn grade(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
    body: web::Json<GradeBody>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let teacher_id = match require_teacher(user) {
        Ok(id) => id,
        Err(e) => return e,
    };

    match crate::assignment::grade(
        &data.db,
        path.into_inner(),
        teacher_id,
        body.score,
        body.teacher_comments.as_deref(),
        body.extra_points,
        crate::now_ms(),
    )
    .await
    {
        Ok(assignment) => HttpResponse::Ok().json(assignment),
        Err(e) => e.to_response(),
    }
}

pub async fn marketplace_reclaim(
    req: HttpRequest,
    data: web::Data<AppData>,
    body: web::Json<ReclaimBody>,
) -> HttpResponse {
    let acting = match auth::acting_student(&req, &data.db).await {
        Ok(a) => a,
        Err(e) => return e,
    };

    match crate::marketplace::reclaim(
        &data.db,
        body.assignment_id,
        acting.effective_user_id,
        crate::now_ms(),
    )
    .await
    {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({"success": true})),
        Err(e) => e.to_response(),
    }
}

pub async fn user_ledger(
    req: HttpRequest,
    data: web::Data<AppData>,
    path: web::Path<i64>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    let user_id = path.into_inner();

    // students see their own movements, teachers everybody's
    if let AuthUser::Student { id, .. } = user {
        if id != user_id {
            return Forbidden!("This ledger is not yours to see");
        }
    }

    match crate::ledger::list_for_user(&data.db, user_id, 50).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => e.to_response(),
    }
}

pub async fn leaderboard(req: HttpRequest, data: web::Data<AppData>) -> HttpResponse {
    if let Err(e) = auth::get_user(&req, &data.db).await {
        return e;
    }

    match crate::ledger::leaderboard(&data.db, 25).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => e.to_response(),
    }
}

pub async fn cron_fail_overdue(req: HttpRequest, data: web::Data<AppData>) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    if let Err(e) = require_teacher(user) {
        return e;
    }

    match crate::notify::fail_overdue(&data.db, crate::now_ms()).await {
        Ok(failed) => HttpResponse::Ok().json(serde_json::json!({"failed": failed})),
        Err(e) => e.to_response(),
    }
}

pub async fn cron_reminders(req: HttpRequest, data: web::Data<AppData>) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    if let Err(e) = require_teacher(user) {
        return e;
    }

    // everything due within the next day
    let window = 24 * 60 * 60 * 1000;
    match crate::notify::remind_upcoming(&data.db, window, crate::now_ms()).await {
        Ok(reminded) => HttpResponse::Ok().json(serde_json::json!({"reminded": reminded})),
        Err(e) => e.to_response(),
    }
}

pub async fn cron_scheduled_assignments(
    req: HttpRequest,
    data: web::Data<AppData>,
) -> HttpResponse {
    let user = match auth::get_user(&req, &data.db).await {
        Ok(u) => u,
        Err(e) => return e,
    };
    if let Err(e) = require_teacher(user) {
        return e;
    }

    match crate::notify::run_scheduled_assignments(&data.db, crate::now_ms()).await {
        Ok(created) => HttpResponse::Ok().json(serde_json::json!({"created": created})),
        Err(e) => e.to_response(),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/lessons", web::post().to(create_lesson))
        .route("/lessons/{id}", web::patch().to(update_lesson))
        .route("/lessons/{id}", web::delete().to(delete_lesson))
        .route("/lessons/{id}/assign", web::post().to(assign_lesson))
        .route("/lessons/{id}/auto-assign", web::post().to(auto_assign))
        .route("/assignments/{id}", web::get().to(get_assignment))
        .route("/assignments/{id}/submit", web::post().to(submit))
        .route("/assignments/{id}/arkaning", web::post().to(arkaning))
        .route("/assignments/{id}/flipper", web::post().to(flipper))
        .route("/assignments/{id}/news-article", web::post().to(news_article))
        .route("/assignments/{id}/grade", web::patch().to(grade))
        .route("/marketplace/reclaim", web::post().to(marketplace_reclaim))
        .route("/users/{id}/ledger", web::get().to(user_ledger))
        .route("/leaderboard", web::get().to(leaderboard))
        .route("/cron/fail-overdue", web::post().to(cron_fail_overdue))
        .route("/cron/reminders", web::post().to(cron_reminders))
        .route(
            "/cron/scheduled-assignments",
            web::post().to(cron_scheduled_assignments),
        );
}

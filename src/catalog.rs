//! The lesson catalog. A lesson row carries its type specific configuration
//! as one tagged json column, so loading a lesson always yields a fully
//! typed `LessonConfig` that downstream code can match exhaustively.

use log::info;
use sqlx::SqlitePool;

use crate::error::LessonError;
use crate::model::LessonRow;
use crate::schema::{Lesson, LessonChanges, LessonConfig, NewLesson, NotificationMode};
use crate::submission::normalize_word;

pub(crate) fn lesson_from_row(row: LessonRow) -> Result<Lesson, LessonError> {
    let config: LessonConfig = serde_json::from_str(&row.config).map_err(|e| {
        LessonError::internal(format!("stored config of lesson {} is corrupt ({})", row.id, e))
    })?;
    Ok(Lesson {
        id: row.id,
        teacher_id: row.teacher_id,
        title: row.title,
        lesson_type: crate::schema::LessonType::parse(&row.lesson_type)?,
        price: row.price,
        difficulty: row.difficulty,
        notification_mode: NotificationMode::parse(&row.notification_mode)?,
        scheduled_assignment_date: row.scheduled_assignment_date,
        config,
        created_at: row.created_at,
    })
}

pub(crate) async fn fetch_lesson_row(
    con: &mut sqlx::SqliteConnection,
    id: i64,
) -> Result<LessonRow, LessonError> {
    sqlx::query_as::<_, LessonRow>("SELECT * FROM lesson WHERE id = ?")
        .bind(id)
        .fetch_optional(con)
        .await?
        .ok_or_else(|| LessonError::not_found(format!("lesson {} was not found", id)))
}

fn check_config(config: &LessonConfig) -> Result<(), LessonError> {
    match config {
        LessonConfig::Standard => Ok(()),
        LessonConfig::MultiChoice { questions } => {
            if questions.is_empty() {
                return Err(LessonError::validation("a multi choice lesson needs at least one question"));
            }
            for q in questions {
                if q.options.len() < 2 {
                    return Err(LessonError::validation(format!(
                        "question {} needs at least two options",
                        q.id
                    )));
                }
                if q.correct_option >= q.options.len() {
                    return Err(LessonError::validation(format!(
                        "question {} marks a correct option that does not exist",
                        q.id
                    )));
                }
            }
            Ok(())
        }
        LessonConfig::Flashcard { cards } => {
            if cards.is_empty() {
                return Err(LessonError::validation("a flashcard lesson needs at least one card"));
            }
            Ok(())
        }
        LessonConfig::Composer {
            sentence,
            max_tries,
            word_questions,
        } => {
            if sentence.trim().is_empty() {
                return Err(LessonError::validation("the hidden sentence must not be empty"));
            }
            if *max_tries < 1 {
                return Err(LessonError::validation("max_tries must be at least 1"));
            }
            // every word of the sentence needs at least one mini question
            for word in sentence.split_whitespace() {
                let normalized = normalize_word(word);
                if normalized.is_empty() {
                    continue;
                }
                let covered = word_questions
                    .iter()
                    .any(|wq| normalize_word(&wq.word) == normalized && !wq.questions.is_empty());
                if !covered {
                    return Err(LessonError::validation(format!(
                        "the word '{}' has no question attached",
                        word
                    )));
                }
            }
            Ok(())
        }
        LessonConfig::Flipper { attempt_threshold } => {
            if *attempt_threshold < 3 {
                return Err(LessonError::validation("the flipper attempt threshold must be at least 3"));
            }
            Ok(())
        }
        LessonConfig::NewsArticle {
            article,
            max_word_taps,
        } => {
            if article.trim().is_empty() {
                return Err(LessonError::validation("the article text must not be empty"));
            }
            if *max_word_taps < 1 {
                return Err(LessonError::validation("max_word_taps must be at least 1"));
            }
            Ok(())
        }
        LessonConfig::Arkaning {
            points_per_correct,
            euros_per_correct,
            lives,
        } => {
            if *points_per_correct < 0 || *euros_per_correct < 0.0 {
                return Err(LessonError::validation("rewards per correct round must not be negative"));
            }
            if *lives < 1 {
                return Err(LessonError::validation("an arkaning game needs at least one life"));
            }
            Ok(())
        }
        LessonConfig::LearningSession { steps } => {
            if steps.is_empty() {
                return Err(LessonError::validation("a learning session needs at least one step"));
            }
            Ok(())
        }
        LessonConfig::Lyric { lyrics } => {
            if lyrics.trim().is_empty() {
                return Err(LessonError::validation("the lyrics must not be empty"));
            }
            Ok(())
        }
    }
}

fn check_lesson_fields(
    title: &str,
    price: f64,
    difficulty: i64,
    notification_mode: NotificationMode,
    scheduled_assignment_date: Option<i64>,
) -> Result<(), LessonError> {
    if title.trim().is_empty() {
        return Err(LessonError::validation("the title must not be empty"));
    }
    if price < 0.0 {
        return Err(LessonError::validation("the price must not be negative"));
    }
    if !(1..=5).contains(&difficulty) {
        return Err(LessonError::validation("the difficulty must be between 1 and 5"));
    }
    if notification_mode == NotificationMode::AssignOnDate && scheduled_assignment_date.is_none() {
        return Err(LessonError::validation(
            "assigning on a date needs a scheduled assignment date",
        ));
    }
    Ok(())
}

pub async fn create_lesson(
    db: &SqlitePool,
    teacher_id: i64,
    new: NewLesson,
) -> Result<Lesson, LessonError> {
    check_lesson_fields(
        &new.title,
        new.price,
        new.difficulty,
        new.notification_mode,
        new.scheduled_assignment_date,
    )?;
    check_config(&new.config)?;

    let lesson_type = new.config.lesson_type();
    let config_json = serde_json::to_string(&new.config)
        .map_err(|e| LessonError::internal(format!("could not serialize the config ({})", e)))?;
    let now = crate::now_ms();

    let result = sqlx::query(
        r#"
        INSERT INTO lesson(teacher_id, title, lesson_type, price, difficulty,
                           notification_mode, scheduled_assignment_date, config, created_at)
        VALUES (?,?,?,?,?,?,?,?,?)
        "#,
    )
    .bind(teacher_id)
    .bind(&new.title)
    .bind(lesson_type.as_str())
    .bind(new.price)
    .bind(new.difficulty)
    .bind(new.notification_mode.as_str())
    .bind(new.scheduled_assignment_date)
    .bind(&config_json)
    .bind(now)
    .execute(db)
    .await?;

    let id = result.last_insert_rowid();
    info!("teacher {} created {} lesson {}", teacher_id, lesson_type.as_str(), id);
    get_lesson(db, id).await
}

pub async fn get_lesson(db: &SqlitePool, id: i64) -> Result<Lesson, LessonError> {
    let mut con = db.acquire().await?;
    let row = fetch_lesson_row(&mut con, id).await?;
    lesson_from_row(row)
}

pub async fn list_lessons_by_teacher(
    db: &SqlitePool,
    teacher_id: i64,
) -> Result<Vec<Lesson>, LessonError> {
    let rows = sqlx::query_as::<_, LessonRow>(
        "SELECT * FROM lesson WHERE teacher_id = ? ORDER BY created_at DESC",
    )
    .bind(teacher_id)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(lesson_from_row).collect()
}

/// Applies a partial edit. Only the owning teacher may change a lesson.
pub async fn update_lesson(
    db: &SqlitePool,
    lesson_id: i64,
    teacher_id: i64,
    changes: LessonChanges,
) -> Result<Lesson, LessonError> {
    let current = get_lesson(db, lesson_id).await?;
    if current.teacher_id != teacher_id {
        return Err(LessonError::forbidden("this lesson belongs to another teacher"));
    }

    let title = changes.title.unwrap_or(current.title);
    let price = changes.price.unwrap_or(current.price);
    let difficulty = changes.difficulty.unwrap_or(current.difficulty);
    let notification_mode = changes.notification_mode.unwrap_or(current.notification_mode);
    let scheduled = changes
        .scheduled_assignment_date
        .or(current.scheduled_assignment_date);
    let config = changes.config.unwrap_or(current.config);

    check_lesson_fields(&title, price, difficulty, notification_mode, scheduled)?;
    check_config(&config)?;

    let config_json = serde_json::to_string(&config)
        .map_err(|e| LessonError::internal(format!("could not serialize the config ({})", e)))?;

    sqlx::query(
        r#"
        UPDATE lesson SET title = ?, lesson_type = ?, price = ?, difficulty = ?,
                          notification_mode = ?, scheduled_assignment_date = ?, config = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(config.lesson_type().as_str())
    .bind(price)
    .bind(difficulty)
    .bind(notification_mode.as_str())
    .bind(scheduled)
    .bind(&config_json)
    .bind(lesson_id)
    .execute(db)
    .await?;

    get_lesson(db, lesson_id).await
}

/// Deletes a lesson. The assignments of the lesson go with it (cascade).
pub async fn delete_lesson(
    db: &SqlitePool,
    lesson_id: i64,
    teacher_id: i64,
) -> Result<(), LessonError> {
    let current = get_lesson(db, lesson_id).await?;
    if current.teacher_id != teacher_id {
        return Err(LessonError::forbidden("this lesson belongs to another teacher"));
    }

    sqlx::query("DELETE FROM lesson WHERE id = ?")
        .bind(lesson_id)
        .execute(db)
        .await?;
    info!("teacher {} deleted lesson {}", teacher_id, lesson_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChoiceQuestion, LessonType, WordQuestion};
    use crate::test_util::{create_lesson, create_student, create_teacher, migrate_test_db};

    #[actix_rt::test]
    async fn create_and_reload_lesson() {
        let db = migrate_test_db().await;
        let teacher = create_teacher(&db, "Frau Sommer").await;

        let lesson = create_lesson(
            &db,
            teacher,
            "Solar system quiz",
            12.0,
            LessonConfig::MultiChoice {
                questions: vec![ChoiceQuestion {
                    id: "q1".to_string(),
                    prompt: "Which planet is closest to the sun?".to_string(),
                    options: vec!["Venus".to_string(), "Mercury".to_string()],
                    correct_option: 1,
                }],
            },
        )
        .await;

        assert_eq!(lesson.lesson_type, LessonType::MultiChoice);

        let reloaded = get_lesson(&db, lesson.id).await.unwrap();
        assert_eq!(reloaded.config, lesson.config);
        assert_eq!(reloaded.price, 12.0);

        let listed = list_lessons_by_teacher(&db, teacher).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, lesson.id);
    }

    #[actix_rt::test]
    async fn flipper_threshold_below_three_is_rejected() {
        let db = migrate_test_db().await;
        let teacher = create_teacher(&db, "Frau Sommer").await;

        let result = super::create_lesson(
            &db,
            teacher,
            NewLesson {
                title: "Tile pairs".to_string(),
                price: 5.0,
                difficulty: 1,
                notification_mode: NotificationMode::NotAssigned,
                scheduled_assignment_date: None,
                config: LessonConfig::Flipper {
                    attempt_threshold: 2,
                },
            },
        )
        .await;

        assert!(matches!(result, Err(LessonError::Validation { .. })));
    }

    #[actix_rt::test]
    async fn composer_needs_a_question_per_word() {
        let db = migrate_test_db().await;
        let teacher = create_teacher(&db, "Frau Sommer").await;

        let result = super::create_lesson(
            &db,
            teacher,
            NewLesson {
                title: "Sentence builder".to_string(),
                price: 5.0,
                difficulty: 2,
                notification_mode: NotificationMode::NotAssigned,
                scheduled_assignment_date: None,
                config: LessonConfig::Composer {
                    sentence: "der Hund bellt".to_string(),
                    max_tries: 3,
                    word_questions: vec![WordQuestion {
                        word: "der".to_string(),
                        questions: vec!["article?".to_string()],
                    }],
                },
            },
        )
        .await;

        assert!(matches!(result, Err(LessonError::Validation { .. })));
    }

    #[actix_rt::test]
    async fn assign_on_date_requires_a_date() {
        let db = migrate_test_db().await;
        let teacher = create_teacher(&db, "Frau Sommer").await;

        let result = super::create_lesson(
            &db,
            teacher,
            NewLesson {
                title: "Scheduled reading".to_string(),
                price: 0.0,
                difficulty: 1,
                notification_mode: NotificationMode::AssignOnDate,
                scheduled_assignment_date: None,
                config: LessonConfig::Standard,
            },
        )
        .await;

        assert!(matches!(result, Err(LessonError::Validation { .. })));
    }

    #[actix_rt::test]
    async fn only_the_owner_can_edit() {
        let db = migrate_test_db().await;
        let owner = create_teacher(&db, "Frau Sommer").await;
        let other = create_teacher(&db, "Herr Winter").await;
        let lesson = create_lesson(&db, owner, "Essay", 3.0, LessonConfig::Standard).await;

        let result = update_lesson(
            &db,
            lesson.id,
            other,
            LessonChanges {
                title: Some("Hijacked".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(LessonError::Forbidden { .. })));

        let updated = update_lesson(
            &db,
            lesson.id,
            owner,
            LessonChanges {
                price: Some(9.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.price, 9.0);
        assert_eq!(updated.title, "Essay");
    }

    #[actix_rt::test]
    async fn deleting_a_lesson_cascades_to_assignments() {
        let db = migrate_test_db().await;
        let teacher = create_teacher(&db, "Frau Sommer").await;
        let student = create_student(&db, "Mia").await;
        let lesson = create_lesson(&db, teacher, "Essay", 3.0, LessonConfig::Standard).await;

        let assignment =
            crate::assignment::assign_lesson(&db, lesson.id, student, None, None, crate::now_ms())
                .await
                .unwrap();

        delete_lesson(&db, lesson.id, teacher).await.unwrap();

        let gone = crate::assignment::get_assignment(&db, assignment.id).await;
        assert!(matches!(gone, Err(LessonError::NotFound { .. })));
    }
}

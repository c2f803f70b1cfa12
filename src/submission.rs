//! Submission handling, polymorphic over the lesson type. The generic
//! `submit` dispatcher validates the type specific payload and flips the
//! assignment to COMPLETED; the game endpoints (arkaning, flipper, news
//! article) post per round rewards while the assignment is still PENDING.
//! Every reward posting pairs its ledger append with the counter bump inside
//! one transaction.

use log::debug;
use regex::Regex;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::assignment::{fetch_assignment_row, get_assignment};
use crate::error::LessonError;
use crate::ledger::{self, LedgerReason};
use crate::model::AssignmentRow;
use crate::schema::{
    Assignment, AssignmentStatus, ComposerAnswer, FlashcardAnswers, LearningSessionAck,
    LessonConfig, LessonType, LyricAttemptIn, MultiChoiceAnswers, RewardDelta, StandardAnswer,
    TapOutcome,
};
use crate::POINT_TO_EURO_RATE;

/// Penalty for a wrong arkaning round. Deliberately fixed, not part of the
/// lesson config (unlike the flipper curve).
pub const ARKANING_WRONG_PENALTY_POINTS: i64 = -50;
pub const ARKANING_WRONG_PENALTY_EUROS: f64 = -50.0;

/// News article tap rewards. First tap on a word pays more than a repeat.
pub const FIRST_TAP_POINTS: i64 = 5;
pub const REPEAT_TAP_POINTS: i64 = 1;

/// Lowercases and strips everything that is not a letter or digit, so that
/// "Hund," and "hund" count as the same word.
pub(crate) fn normalize_word(word: &str) -> String {
    let re = Regex::new(r"[^\p{Letter}\p{Number}]+").unwrap();
    re.replace_all(&word.to_lowercase(), "").to_string()
}

fn normalize_sentence(sentence: &str) -> String {
    sentence
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect::<Vec<String>>()
        .join(" ")
}

/// Loads assignment and config and runs the checks every handler shares:
/// the assignment belongs to the student, the lesson type matches the
/// endpoint, nothing was submitted yet and the deadline has not passed.
async fn load_for_submission(
    tx: &mut Transaction<'_, Sqlite>,
    assignment_id: i64,
    student_id: i64,
    expected_type: Option<LessonType>,
    now: i64,
) -> Result<(AssignmentRow, LessonConfig), LessonError> {
    let assignment = fetch_assignment_row(&mut *tx, assignment_id).await?;
    if assignment.student_id != student_id {
        return Err(LessonError::forbidden("this assignment belongs to another student"));
    }

    let lesson = crate::catalog::fetch_lesson_row(&mut *tx, assignment.lesson_id).await?;
    let config: LessonConfig = serde_json::from_str(&lesson.config).map_err(|e| {
        LessonError::internal(format!("stored config of lesson {} is corrupt ({})", lesson.id, e))
    })?;

    if let Some(expected) = expected_type {
        if config.lesson_type() != expected {
            return Err(LessonError::validation(format!(
                "this is not a {} assignment",
                expected.as_str()
            )));
        }
    }

    if AssignmentStatus::parse(&assignment.status)? != AssignmentStatus::Pending {
        return Err(LessonError::AlreadySubmitted);
    }
    // submitting exactly at the deadline is still fine
    if now > assignment.deadline {
        return Err(LessonError::DeadlinePassed);
    }

    Ok((assignment, config))
}

async fn complete(
    tx: &mut Transaction<'_, Sqlite>,
    assignment_id: i64,
    answers: Option<&serde_json::Value>,
    score: Option<f64>,
) -> Result<(), LessonError> {
    sqlx::query("UPDATE assignment SET status = 'COMPLETED', answers = ?, score = ? WHERE id = ?")
        .bind(answers.map(|a| a.to_string()))
        .bind(score)
        .bind(assignment_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The generic submit dispatcher. Validates the payload against the lesson
/// configuration and applies the PENDING -> COMPLETED transition.
pub async fn submit(
    db: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
    payload: serde_json::Value,
    now: i64,
) -> Result<Assignment, LessonError> {
    let mut tx = db.begin().await?;
    let (assignment, config) =
        load_for_submission(&mut tx, assignment_id, student_id, None, now).await?;

    match config {
        LessonConfig::Standard => {
            let answer: StandardAnswer = serde_json::from_value(payload.clone())?;
            if answer.text.trim().is_empty() {
                return Err(LessonError::validation("the answer text must not be empty"));
            }
            complete(&mut tx, assignment_id, Some(&payload), None).await?;
        }
        LessonConfig::MultiChoice { questions } => {
            let answer: MultiChoiceAnswers = serde_json::from_value(payload.clone())?;
            for question in &questions {
                match answer.answers.get(&question.id) {
                    None => {
                        return Err(LessonError::validation(format!(
                            "question {} was not answered",
                            question.id
                        )))
                    }
                    Some(option) if *option >= question.options.len() => {
                        return Err(LessonError::validation(format!(
                            "question {} got an option that does not exist",
                            question.id
                        )))
                    }
                    Some(_) => (),
                }
            }
            complete(&mut tx, assignment_id, Some(&payload), None).await?;
        }
        LessonConfig::Flashcard { cards } => {
            let answer: FlashcardAnswers = serde_json::from_value(payload.clone())?;
            for card in &cards {
                if !answer.cards.contains_key(&card.id) {
                    return Err(LessonError::validation(format!(
                        "card {} was not worked through",
                        card.id
                    )));
                }
            }
            // binary pass, the teacher reviews the aggregate only
            complete(&mut tx, assignment_id, Some(&payload), None).await?;
        }
        LessonConfig::Composer {
            sentence,
            max_tries,
            ..
        } => {
            let answer: ComposerAnswer = serde_json::from_value(payload.clone())?;
            if assignment.tries >= max_tries {
                return Err(LessonError::validation("there are no tries left"));
            }

            let target = normalize_sentence(&sentence);
            let attempt = answer
                .words
                .iter()
                .map(|w| normalize_word(w))
                .filter(|w| !w.is_empty())
                .collect::<Vec<String>>()
                .join(" ");

            if attempt != target {
                // the failed try still counts
                sqlx::query("UPDATE assignment SET tries = tries + 1 WHERE id = ?")
                    .bind(assignment_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                return Err(LessonError::validation(format!(
                    "the sentence does not match (try {} of {})",
                    assignment.tries + 1,
                    max_tries
                )));
            }
            complete(&mut tx, assignment_id, Some(&payload), None).await?;
        }
        LessonConfig::LearningSession { .. } => {
            let ack: LearningSessionAck = serde_json::from_value(payload.clone())?;
            if !ack.confirmed {
                return Err(LessonError::validation("the session has to be confirmed as done"));
            }
            complete(&mut tx, assignment_id, Some(&payload), None).await?;
        }
        LessonConfig::Lyric { .. } => {
            let attempt: LyricAttemptIn = serde_json::from_value(payload.clone())?;
            if let Some(score) = attempt.score {
                if !(0.0..=100.0).contains(&score) {
                    return Err(LessonError::validation("the score must be between 0 and 100"));
                }
            }

            sqlx::query(
                "INSERT INTO lyric_attempt(assignment_id, score, time_taken_ms, created_at) VALUES (?,?,?,?)",
            )
            .bind(assignment_id)
            .bind(attempt.score)
            .bind(attempt.time_taken_ms)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // a scored attempt also closes the assignment
            if attempt.score.is_some() {
                complete(&mut tx, assignment_id, None, attempt.score).await?;
            }
        }
        // the game types close with a summary payload; rewards were already
        // posted round by round through the dedicated endpoints
        LessonConfig::Flipper { .. }
        | LessonConfig::NewsArticle { .. }
        | LessonConfig::Arkaning { .. } => {
            complete(&mut tx, assignment_id, Some(&payload), None).await?;
        }
    }

    tx.commit().await?;
    debug!("assignment {} submitted by student {}", assignment_id, student_id);
    get_assignment(db, assignment_id).await
}

async fn total_points_of(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
) -> Result<i64, LessonError> {
    let total: i64 = sqlx::query_scalar("SELECT total_points FROM user WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(total)
}

/// One arkaning round. A correct round pays the configured reward, a wrong
/// one costs the fixed penalty; both land in the ledger.
pub async fn arkaning_round(
    db: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
    outcome: &str,
    now: i64,
) -> Result<RewardDelta, LessonError> {
    let mut tx = db.begin().await?;
    let (_, config) = load_for_submission(
        &mut tx,
        assignment_id,
        student_id,
        Some(LessonType::Arkaning),
        now,
    )
    .await?;

    let (points_per_correct, euros_per_correct) = match config {
        LessonConfig::Arkaning {
            points_per_correct,
            euros_per_correct,
            ..
        } => (points_per_correct, euros_per_correct),
        _ => return Err(LessonError::internal("config and lesson type diverged")),
    };

    let (points, euros, note) = match outcome {
        "correct" => (points_per_correct, euros_per_correct, "correct round"),
        "wrong" => (
            ARKANING_WRONG_PENALTY_POINTS,
            ARKANING_WRONG_PENALTY_EUROS,
            "wrong round",
        ),
        _ => {
            return Err(LessonError::validation(
                "the outcome must be 'correct' or 'wrong'",
            ))
        }
    };

    ledger::record(
        &mut tx,
        student_id,
        Some(assignment_id),
        points,
        euros,
        LedgerReason::ArkaningGame,
        Some(note),
        now,
    )
    .await?;
    let total_points = total_points_of(&mut tx, student_id).await?;
    tx.commit().await?;

    Ok(RewardDelta {
        points_delta: points,
        euros_delta: euros,
        total_points,
    })
}

/// Reward curve of one flipper match: quick matches pay well, grinding past
/// the threshold turns into a penalty.
fn flipper_euros(attempts: i64, threshold: i64) -> f64 {
    match attempts {
        1 => 10.0,
        2 => 5.0,
        a if a <= threshold => 1.0,
        a => -5.0 * (a - threshold) as f64,
    }
}

pub async fn flipper_match(
    db: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
    attempts: i64,
    word: Option<&str>,
    now: i64,
) -> Result<RewardDelta, LessonError> {
    if attempts < 1 {
        return Err(LessonError::validation("attempts must be at least 1"));
    }

    let mut tx = db.begin().await?;
    let (_, config) = load_for_submission(
        &mut tx,
        assignment_id,
        student_id,
        Some(LessonType::Flipper),
        now,
    )
    .await?;

    let threshold = match config {
        LessonConfig::Flipper { attempt_threshold } => attempt_threshold,
        _ => return Err(LessonError::internal("config and lesson type diverged")),
    };

    let euros = flipper_euros(attempts, threshold);
    let points = (euros * POINT_TO_EURO_RATE).round() as i64;
    let note = match word {
        Some(w) => format!("matched '{}' after {} attempts", w, attempts),
        None => format!("matched after {} attempts", attempts),
    };

    ledger::record(
        &mut tx,
        student_id,
        Some(assignment_id),
        points,
        euros,
        LedgerReason::FlipperMatch,
        Some(&note),
        now,
    )
    .await?;
    let total_points = total_points_of(&mut tx, student_id).await?;
    tx.commit().await?;

    Ok(RewardDelta {
        points_delta: points,
        euros_delta: euros,
        total_points,
    })
}

/// One vocabulary tap. The first tap on a word pays the base reward, repeats
/// pay less, and the per assignment cap rejects everything beyond it.
pub async fn news_article_tap(
    db: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
    word: Option<&str>,
    now: i64,
) -> Result<TapOutcome, LessonError> {
    let word = word.ok_or_else(|| LessonError::validation("a word is required"))?;
    let normalized = normalize_word(word);
    if normalized.is_empty() {
        return Err(LessonError::validation("the word contains no letters"));
    }

    let mut tx = db.begin().await?;
    let (assignment, config) = load_for_submission(
        &mut tx,
        assignment_id,
        student_id,
        Some(LessonType::NewsArticle),
        now,
    )
    .await?;

    let max_word_taps = match config {
        LessonConfig::NewsArticle { max_word_taps, .. } => max_word_taps,
        _ => return Err(LessonError::internal("config and lesson type diverged")),
    };

    if assignment.tap_count >= max_word_taps {
        return Err(LessonError::TapLimitReached {
            tap_count: assignment.tap_count,
        });
    }

    // one row per (assignment, word); the counter tells first from repeat
    let word_taps: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO word_tap(assignment_id, word, tap_count) VALUES (?,?,1)
        ON CONFLICT(assignment_id, word) DO UPDATE SET tap_count = tap_count + 1
        RETURNING tap_count
        "#,
    )
    .bind(assignment_id)
    .bind(&normalized)
    .fetch_one(&mut *tx)
    .await?;

    let points = if word_taps == 1 {
        FIRST_TAP_POINTS
    } else {
        REPEAT_TAP_POINTS
    };
    let euros = points as f64 / POINT_TO_EURO_RATE;

    ledger::record(
        &mut tx,
        student_id,
        Some(assignment_id),
        points,
        euros,
        LedgerReason::NewsArticleTap,
        Some(&format!("tap on '{}'", normalized)),
        now,
    )
    .await?;

    sqlx::query("UPDATE assignment SET tap_count = tap_count + 1 WHERE id = ?")
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    let total_points = total_points_of(&mut tx, student_id).await?;
    tx.commit().await?;

    Ok(TapOutcome {
        points_delta: points,
        euros_delta: euros,
        total_points,
        tap_count: assignment.tap_count + 1,
    })
}

/// Every recorded attempt of a lyric assignment, newest first. The teacher
/// reviews these alongside the final score.
pub async fn list_lyric_attempts(
    db: &SqlitePool,
    assignment_id: i64,
) -> Result<Vec<crate::schema::LyricAttempt>, LessonError> {
    let rows = sqlx::query_as::<_, crate::model::LyricAttemptRow>(
        "SELECT * FROM lyric_attempt WHERE assignment_id = ? ORDER BY id DESC",
    )
    .bind(assignment_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| crate::schema::LyricAttempt {
            id: r.id,
            assignment_id: r.assignment_id,
            score: r.score,
            time_taken_ms: r.time_taken_ms,
            created_at: r.created_at,
        })
        .collect())
}

/// Which words of a news article were looked up, and how often.
pub async fn tapped_words(
    db: &SqlitePool,
    assignment_id: i64,
) -> Result<Vec<crate::schema::WordTap>, LessonError> {
    let rows = sqlx::query_as::<_, crate::model::WordTapRow>(
        "SELECT * FROM word_tap WHERE assignment_id = ? ORDER BY word ASC",
    )
    .bind(assignment_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| crate::schema::WordTap {
            word: r.word,
            tap_count: r.tap_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChoiceQuestion, FlashCard, WordQuestion};
    use crate::test_util::*;

    async fn assignment_with_config(
        db: &SqlitePool,
        price: f64,
        config: LessonConfig,
    ) -> (i64, i64, Assignment) {
        let teacher = create_teacher(db, "Frau Sommer").await;
        let student = create_student(db, "Mia").await;
        let lesson = create_lesson(db, teacher, "Lesson", price, config).await;
        let assignment =
            crate::assignment::assign_lesson(db, lesson.id, student, None, None, crate::now_ms())
                .await
                .unwrap();
        (teacher, student, assignment)
    }

    #[actix_rt::test]
    async fn standard_submission_completes() {
        let db = migrate_test_db().await;
        let (_, student, assignment) =
            assignment_with_config(&db, 1.0, LessonConfig::Standard).await;

        let empty = submit(&db, assignment.id, student, serde_json::json!({"text": "  "}), crate::now_ms()).await;
        assert!(matches!(empty, Err(LessonError::Validation { .. })));

        let done = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"text": "my essay"}),
            crate::now_ms(),
        )
        .await
        .unwrap();
        assert_eq!(done.status, AssignmentStatus::Completed);

        // only one transition per lifecycle
        let again = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"text": "my essay"}),
            crate::now_ms(),
        )
        .await;
        assert_eq!(again.unwrap_err(), LessonError::AlreadySubmitted);
    }

    #[actix_rt::test]
    async fn the_deadline_boundary_is_inclusive() {
        let db = migrate_test_db().await;
        let teacher = create_teacher(&db, "Frau Sommer").await;
        let student = create_student(&db, "Mia").await;
        let lesson = create_lesson(&db, teacher, "Essay", 1.0, LessonConfig::Standard).await;

        let deadline = 500_000;
        let assignment = crate::assignment::assign_lesson(
            &db,
            lesson.id,
            student,
            Some(deadline),
            Some(100_000),
            100_000,
        )
        .await
        .unwrap();

        // one millisecond late is late
        let late = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"text": "x"}),
            deadline + 1,
        )
        .await;
        assert_eq!(late.unwrap_err(), LessonError::DeadlinePassed);

        // exactly on the deadline is still in time
        let on_time = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"text": "x"}),
            deadline,
        )
        .await
        .unwrap();
        assert_eq!(on_time.status, AssignmentStatus::Completed);
    }

    #[actix_rt::test]
    async fn submitting_for_someone_else_is_forbidden() {
        let db = migrate_test_db().await;
        let (_, _, assignment) = assignment_with_config(&db, 1.0, LessonConfig::Standard).await;
        let intruder = create_student(&db, "Ben").await;

        let result = submit(
            &db,
            assignment.id,
            intruder,
            serde_json::json!({"text": "x"}),
            crate::now_ms(),
        )
        .await;
        assert!(matches!(result, Err(LessonError::Forbidden { .. })));
    }

    #[actix_rt::test]
    async fn multi_choice_needs_every_question_answered() {
        let db = migrate_test_db().await;
        let config = LessonConfig::MultiChoice {
            questions: vec![
                ChoiceQuestion {
                    id: "q1".to_string(),
                    prompt: "1 + 1?".to_string(),
                    options: vec!["1".to_string(), "2".to_string()],
                    correct_option: 1,
                },
                ChoiceQuestion {
                    id: "q2".to_string(),
                    prompt: "2 + 2?".to_string(),
                    options: vec!["4".to_string(), "5".to_string()],
                    correct_option: 0,
                },
            ],
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let partial = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"answers": {"q1": 1}}),
            crate::now_ms(),
        )
        .await;
        assert!(matches!(partial, Err(LessonError::Validation { .. })));

        let full = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"answers": {"q1": 1, "q2": 0}}),
            crate::now_ms(),
        )
        .await
        .unwrap();
        assert_eq!(full.status, AssignmentStatus::Completed);
    }

    #[actix_rt::test]
    async fn flashcards_need_every_card_touched() {
        let db = migrate_test_db().await;
        let config = LessonConfig::Flashcard {
            cards: vec![
                FlashCard {
                    id: "c1".to_string(),
                    front: "dog".to_string(),
                    back: "Hund".to_string(),
                },
                FlashCard {
                    id: "c2".to_string(),
                    front: "cat".to_string(),
                    back: "Katze".to_string(),
                },
            ],
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let partial = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"cards": {"c1": true}}),
            crate::now_ms(),
        )
        .await;
        assert!(matches!(partial, Err(LessonError::Validation { .. })));

        let full = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"cards": {"c1": true, "c2": false}}),
            crate::now_ms(),
        )
        .await
        .unwrap();
        assert_eq!(full.status, AssignmentStatus::Completed);
        // binary pass, no numeric score
        assert_eq!(full.score, None);
    }

    #[actix_rt::test]
    async fn composer_counts_tries_and_caps_them() {
        let db = migrate_test_db().await;
        let config = LessonConfig::Composer {
            sentence: "Der Hund bellt".to_string(),
            max_tries: 2,
            word_questions: vec![
                WordQuestion {
                    word: "Der".to_string(),
                    questions: vec!["article?".to_string()],
                },
                WordQuestion {
                    word: "Hund".to_string(),
                    questions: vec!["animal?".to_string()],
                },
                WordQuestion {
                    word: "bellt".to_string(),
                    questions: vec!["verb?".to_string()],
                },
            ],
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let miss = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"words": ["der", "Hund", "schläft"]}),
            crate::now_ms(),
        )
        .await;
        assert!(matches!(miss, Err(LessonError::Validation { .. })));
        let after = crate::assignment::get_assignment(&db, assignment.id).await.unwrap();
        assert_eq!(after.tries, 1);

        // matching is case and whitespace insensitive
        let hit = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"words": ["  der", "HUND", "bellt. "]}),
            crate::now_ms(),
        )
        .await
        .unwrap();
        assert_eq!(hit.status, AssignmentStatus::Completed);
        assert_eq!(hit.tries, 1);
    }

    #[actix_rt::test]
    async fn composer_rejects_once_the_tries_are_used_up() {
        let db = migrate_test_db().await;
        let config = LessonConfig::Composer {
            sentence: "Hallo".to_string(),
            max_tries: 1,
            word_questions: vec![WordQuestion {
                word: "Hallo".to_string(),
                questions: vec!["greeting?".to_string()],
            }],
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let _ = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"words": ["Tschüss"]}),
            crate::now_ms(),
        )
        .await;

        let out_of_tries = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"words": ["Hallo"]}),
            crate::now_ms(),
        )
        .await;
        assert!(matches!(out_of_tries, Err(LessonError::Validation { .. })));
    }

    #[actix_rt::test]
    async fn lyric_attempts_land_in_the_side_table() {
        let db = migrate_test_db().await;
        let config = LessonConfig::Lyric {
            lyrics: "la la la".to_string(),
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        // an unscored attempt keeps the assignment open
        let open = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"score": null, "timeTakenMs": 40_000}),
            crate::now_ms(),
        )
        .await
        .unwrap();
        assert_eq!(open.status, AssignmentStatus::Pending);

        let closed = submit(
            &db,
            assignment.id,
            student,
            serde_json::json!({"score": 87.5, "timeTakenMs": 31_000}),
            crate::now_ms(),
        )
        .await
        .unwrap();
        assert_eq!(closed.status, AssignmentStatus::Completed);
        assert_eq!(closed.score, Some(87.5));

        let attempts = list_lyric_attempts(&db, assignment.id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        // newest first
        assert_eq!(attempts[0].score, Some(87.5));
        assert_eq!(attempts[1].score, None);
    }

    #[actix_rt::test]
    async fn arkaning_rounds_pay_and_punish() {
        let db = migrate_test_db().await;
        let config = LessonConfig::Arkaning {
            points_per_correct: 20,
            euros_per_correct: 2.0,
            lives: 3,
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let won = arkaning_round(&db, assignment.id, student, "correct", crate::now_ms())
            .await
            .unwrap();
        assert_eq!(won.points_delta, 20);
        assert_eq!(won.euros_delta, 2.0);
        assert_eq!(won.total_points, 20);

        let lost = arkaning_round(&db, assignment.id, student, "wrong", crate::now_ms())
            .await
            .unwrap();
        assert_eq!(lost.points_delta, -50);
        assert_eq!(lost.euros_delta, -50.0);
        assert_eq!(lost.total_points, -30);

        let nonsense = arkaning_round(&db, assignment.id, student, "maybe", crate::now_ms()).await;
        assert!(matches!(nonsense, Err(LessonError::Validation { .. })));

        assert_points_consistent(&db, student).await;
    }

    #[actix_rt::test]
    async fn game_endpoints_check_the_lesson_type() {
        let db = migrate_test_db().await;
        let (_, student, assignment) =
            assignment_with_config(&db, 1.0, LessonConfig::Standard).await;

        let result = arkaning_round(&db, assignment.id, student, "correct", crate::now_ms()).await;
        assert!(matches!(result, Err(LessonError::Validation { .. })));
    }

    #[actix_rt::test]
    async fn flipper_reward_curve() {
        assert_eq!(flipper_euros(1, 3), 10.0);
        assert_eq!(flipper_euros(2, 3), 5.0);
        assert_eq!(flipper_euros(3, 3), 1.0);
        assert_eq!(flipper_euros(5, 3), -10.0);
        assert_eq!(flipper_euros(4, 6), 1.0);
        assert_eq!(flipper_euros(9, 6), -15.0);
    }

    #[actix_rt::test]
    async fn flipper_matches_post_to_the_ledger() {
        let db = migrate_test_db().await;
        let config = LessonConfig::Flipper {
            attempt_threshold: 3,
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let quick = flipper_match(&db, assignment.id, student, 1, Some("sun"), crate::now_ms())
            .await
            .unwrap();
        assert_eq!(quick.euros_delta, 10.0);
        assert_eq!(quick.points_delta, 100);

        let slow = flipper_match(&db, assignment.id, student, 5, None, crate::now_ms())
            .await
            .unwrap();
        assert_eq!(slow.euros_delta, -10.0);
        assert_eq!(slow.points_delta, -100);
        assert_eq!(slow.total_points, 0);

        let zero = flipper_match(&db, assignment.id, student, 0, None, crate::now_ms()).await;
        assert!(matches!(zero, Err(LessonError::Validation { .. })));

        assert_points_consistent(&db, student).await;
    }

    #[actix_rt::test]
    async fn news_taps_hit_the_cap() {
        let db = migrate_test_db().await;
        let config = LessonConfig::NewsArticle {
            article: "Die Sonne scheint".to_string(),
            max_word_taps: 2,
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let first = news_article_tap(&db, assignment.id, student, Some("Sonne"), crate::now_ms())
            .await
            .unwrap();
        assert_eq!(first.points_delta, FIRST_TAP_POINTS);
        assert_eq!(first.tap_count, 1);

        // same word again, normalized, pays the repeat reward
        let repeat = news_article_tap(&db, assignment.id, student, Some("sonne!"), crate::now_ms())
            .await
            .unwrap();
        assert_eq!(repeat.points_delta, REPEAT_TAP_POINTS);
        assert_eq!(repeat.tap_count, 2);

        // the cap is reached, the counter stays where it is
        let capped = news_article_tap(&db, assignment.id, student, Some("scheint"), crate::now_ms()).await;
        assert_eq!(capped.unwrap_err(), LessonError::TapLimitReached { tap_count: 2 });

        let after = crate::assignment::get_assignment(&db, assignment.id).await.unwrap();
        assert_eq!(after.tap_count, 2);

        // both taps ended up on the same normalized word
        let taps = tapped_words(&db, assignment.id).await.unwrap();
        assert_eq!(
            taps,
            vec![crate::schema::WordTap {
                word: "sonne".to_string(),
                tap_count: 2,
            }]
        );

        assert_points_consistent(&db, student).await;
    }

    #[actix_rt::test]
    async fn news_taps_need_a_word() {
        let db = migrate_test_db().await;
        let config = LessonConfig::NewsArticle {
            article: "Die Sonne scheint".to_string(),
            max_word_taps: 5,
        };
        let (_, student, assignment) = assignment_with_config(&db, 1.0, config).await;

        let missing = news_article_tap(&db, assignment.id, student, None, crate::now_ms()).await;
        assert!(matches!(missing, Err(LessonError::Validation { .. })));

        let blank = news_article_tap(&db, assignment.id, student, Some("?!"), crate::now_ms()).await;
        assert!(matches!(blank, Err(LessonError::Validation { .. })));
    }
}

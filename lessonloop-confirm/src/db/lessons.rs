//! Lesson queries
//!
//! Read lessons by id and apply the confirmation state transitions. The
//! guards (`confirmation_status = 'pending' AND status = 'booked'`) live in
//! the WHERE clause of each UPDATE, not in a separate read, so whichever
//! update lands first wins and the loser observes zero rows affected.

use chrono::{DateTime, Utc};
use lessonloop_common::models::{ConfirmationStatus, Lesson, LessonStatus};
use lessonloop_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Denormalized context for a lesson the sweep auto-acknowledged,
/// enough to drive the downstream notification
#[derive(Debug, Clone, Serialize)]
pub struct SweptLesson {
    pub lesson_id: Uuid,
    pub learner_name: String,
    pub teacher_name: String,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Get lesson by id
pub async fn get_lesson(db: &SqlitePool, lesson_id: Uuid) -> Result<Lesson> {
    let row = sqlx::query("SELECT * FROM lessons WHERE id = ?")
        .bind(lesson_id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("lesson {}", lesson_id)))?;

    lesson_from_row(&row)
}

/// Attempt the `pending -> acknowledged` transition
///
/// Returns true if this call won the transition, false if the lesson was
/// missing or already resolved (the caller re-reads to tell those apart).
pub async fn try_acknowledge(
    db: &SqlitePool,
    lesson_id: Uuid,
    teacher_message: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE lessons
        SET confirmation_status = 'acknowledged',
            acknowledged_at = ?,
            teacher_message = ?
        WHERE id = ?
          AND confirmation_status = 'pending'
          AND status = 'booked'
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(teacher_message)
    .bind(lesson_id.to_string())
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Attempt the `pending -> declined` transition
///
/// Cancels the lesson and records the refund intent in the same
/// transaction, so a decline that commits always has its compensation
/// intent on disk before the ledger is called.
pub async fn try_decline(
    db: &SqlitePool,
    lesson_id: Uuid,
    decline_reason: &str,
    suggested_times: Option<&[DateTime<Utc>]>,
    refund_credits: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let suggested_json = suggested_times
        .map(|times| serde_json::to_string(times))
        .transpose()
        .map_err(|e| Error::Internal(format!("serialize suggested times: {}", e)))?;

    let mut tx = db.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE lessons
        SET confirmation_status = 'declined',
            status = 'cancelled',
            declined_at = ?,
            decline_reason = ?,
            suggested_times = ?
        WHERE id = ?
          AND confirmation_status = 'pending'
          AND status = 'booked'
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(decline_reason)
    .bind(suggested_json)
    .bind(lesson_id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() != 1 {
        tx.rollback().await?;
        return Ok(false);
    }

    // payer_id comes from the lesson row just declined
    let payer_id: String = sqlx::query("SELECT payer_id FROM lessons WHERE id = ?")
        .bind(lesson_id.to_string())
        .fetch_one(&mut *tx)
        .await?
        .get("payer_id");

    super::refunds::insert_intent(
        &mut tx,
        lesson_id,
        &payer_id,
        refund_credits,
        &format!("lesson-decline:{}", lesson_id),
        now,
    )
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Auto-acknowledge every lesson still pending past the cutoff
///
/// Single UPDATE ... RETURNING statement: selection and transition are one
/// atomic operation, so concurrent sweeps (or a sweep racing a teacher
/// action) each claim disjoint sets of lessons.
pub async fn sweep_stale(
    db: &SqlitePool,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<SweptLesson>> {
    let rows = sqlx::query(
        r#"
        UPDATE lessons
        SET confirmation_status = 'auto_acknowledged',
            acknowledged_at = ?,
            auto_acknowledged = 1
        WHERE confirmation_status = 'pending'
          AND status = 'booked'
          AND datetime(confirmation_requested_at) < datetime(?)
        RETURNING id, learner_name, teacher_name, subject, scheduled_at
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(cutoff.to_rfc3339())
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SweptLesson {
                lesson_id: parse_uuid(row.get("id"))?,
                learner_name: row.get("learner_name"),
                teacher_name: row.get("teacher_name"),
                subject: row.get("subject"),
                scheduled_at: parse_timestamp(&row.get::<String, _>("scheduled_at"))?,
            })
        })
        .collect()
}

/// Convert a database row into a Lesson
fn lesson_from_row(row: &SqliteRow) -> Result<Lesson> {
    let status_str: String = row.get("status");
    let status = LessonStatus::from_str(&status_str)
        .ok_or_else(|| Error::Internal(format!("unknown lesson status: {}", status_str)))?;

    let confirmation_str: String = row.get("confirmation_status");
    let confirmation_status = ConfirmationStatus::from_str(&confirmation_str).ok_or_else(|| {
        Error::Internal(format!("unknown confirmation status: {}", confirmation_str))
    })?;

    let suggested_times = row
        .get::<Option<String>, _>("suggested_times")
        .map(|json| {
            serde_json::from_str::<Vec<DateTime<Utc>>>(&json)
                .map_err(|e| Error::Internal(format!("parse suggested times: {}", e)))
        })
        .transpose()?;

    Ok(Lesson {
        id: parse_uuid(row.get("id"))?,
        teacher_id: parse_uuid(row.get("teacher_id"))?,
        teacher_name: row.get("teacher_name"),
        learner_id: parse_uuid(row.get("learner_id"))?,
        learner_name: row.get("learner_name"),
        payer_id: parse_uuid(row.get("payer_id"))?,
        subject: row.get("subject"),
        scheduled_at: parse_timestamp(&row.get::<String, _>("scheduled_at"))?,
        duration_minutes: row.get("duration_minutes"),
        status,
        confirmation_status,
        confirmation_requested_at: parse_timestamp(
            &row.get::<String, _>("confirmation_requested_at"),
        )?,
        acknowledged_at: parse_optional_timestamp(row.get("acknowledged_at"))?,
        declined_at: parse_optional_timestamp(row.get("declined_at"))?,
        teacher_message: row.get("teacher_message"),
        decline_reason: row.get("decline_reason"),
        suggested_times,
        auto_acknowledged: row.get::<i64, _>("auto_acknowledged") != 0,
    })
}

fn parse_uuid(s: String) -> Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| Error::Internal(format!("invalid uuid '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp '{}': {}", s, e)))
}

fn parse_optional_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(&s)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        // Single connection: each in-memory SQLite connection is its own db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Should open in-memory database");
        lessonloop_common::db::create_schema(&pool)
            .await
            .expect("Should create schema");
        pool
    }

    async fn insert_pending_lesson(pool: &SqlitePool, requested_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO lessons (id, teacher_id, teacher_name, learner_id, learner_name,
                                 payer_id, subject, scheduled_at, duration_minutes,
                                 confirmation_requested_at)
            VALUES (?, ?, 'Ada Teacher', ?, 'Lin Learner', ?, 'Algebra', ?, 60, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(Uuid::new_v4().to_string())
        .bind(Uuid::new_v4().to_string())
        .bind(Uuid::new_v4().to_string())
        .bind((requested_at + Duration::days(3)).to_rfc3339())
        .bind(requested_at.to_rfc3339())
        .execute(pool)
        .await
        .expect("Should insert lesson");
        id
    }

    #[tokio::test]
    async fn acknowledge_wins_only_once() {
        let pool = memory_pool().await;
        let id = insert_pending_lesson(&pool, Utc::now()).await;

        let first = try_acknowledge(&pool, id, Some("see you then"), Utc::now())
            .await
            .unwrap();
        let second = try_acknowledge(&pool, id, None, Utc::now()).await.unwrap();

        assert!(first);
        assert!(!second);

        let lesson = get_lesson(&pool, id).await.unwrap();
        assert_eq!(lesson.confirmation_status, ConfirmationStatus::Acknowledged);
        assert_eq!(lesson.teacher_message.as_deref(), Some("see you then"));
        assert!(lesson.acknowledged_at.is_some());
        assert!(lesson.declined_at.is_none());
    }

    #[tokio::test]
    async fn decline_cancels_lesson_and_records_intent() {
        let pool = memory_pool().await;
        let id = insert_pending_lesson(&pool, Utc::now()).await;

        let declined = try_decline(&pool, id, "scheduling conflict", None, 1, Utc::now())
            .await
            .unwrap();
        assert!(declined);

        let lesson = get_lesson(&pool, id).await.unwrap();
        assert_eq!(lesson.confirmation_status, ConfirmationStatus::Declined);
        assert_eq!(lesson.status, LessonStatus::Cancelled);
        assert_eq!(lesson.decline_reason.as_deref(), Some("scheduling conflict"));

        let intent = crate::db::refunds::get_intent(&pool, id)
            .await
            .unwrap()
            .expect("Intent row should exist");
        assert_eq!(intent.credits, 1);
        assert!(!intent.settled);
    }

    #[tokio::test]
    async fn decline_of_cancelled_lesson_is_rejected() {
        let pool = memory_pool().await;
        let id = insert_pending_lesson(&pool, Utc::now()).await;
        sqlx::query("UPDATE lessons SET status = 'cancelled' WHERE id = ?")
            .bind(id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let declined = try_decline(&pool, id, "too late", None, 1, Utc::now())
            .await
            .unwrap();
        assert!(!declined);
    }

    #[tokio::test]
    async fn sweep_honors_strict_cutoff() {
        let pool = memory_pool().await;
        let now = Utc::now();
        let stale = insert_pending_lesson(&pool, now - Duration::hours(25)).await;
        // 23h59m old: not yet past the 24h threshold
        let fresh = insert_pending_lesson(&pool, now - Duration::minutes(23 * 60 + 59)).await;

        let swept = sweep_stale(&pool, now - Duration::hours(24), now).await.unwrap();

        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].lesson_id, stale);

        let untouched = get_lesson(&pool, fresh).await.unwrap();
        assert_eq!(untouched.confirmation_status, ConfirmationStatus::Pending);
    }
}

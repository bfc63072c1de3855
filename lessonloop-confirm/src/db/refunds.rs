//! Refund intent queries
//!
//! The refund_intents table is the durable record of compensation owed on
//! decline: the primary key on lesson_id prevents double-refunding a
//! retried decline, and unsettled rows feed reconciliation.

use chrono::{DateTime, Utc};
use lessonloop_common::models::RefundIntent;
use lessonloop_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Record a refund intent inside the decline transaction
///
/// INSERT OR IGNORE: a retried decline (or a manual replay) never creates
/// a second intent for the same lesson.
pub async fn insert_intent(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: Uuid,
    payer_id: &str,
    credits: i64,
    note: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO refund_intents (lesson_id, payer_id, credits, note, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(lesson_id.to_string())
    .bind(payer_id)
    .bind(credits)
    .bind(note)
    .bind(now.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Mark an intent settled with the balance the ledger reported
pub async fn mark_settled(db: &SqlitePool, lesson_id: Uuid, new_balance: i64) -> Result<()> {
    sqlx::query(
        "UPDATE refund_intents SET settled = 1, new_balance = ?, last_error = NULL WHERE lesson_id = ?",
    )
    .bind(new_balance)
    .bind(lesson_id.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Record a failed ledger call against the intent for reconciliation
pub async fn record_failure(db: &SqlitePool, lesson_id: Uuid, error: &str) -> Result<()> {
    sqlx::query("UPDATE refund_intents SET last_error = ? WHERE lesson_id = ?")
        .bind(error)
        .bind(lesson_id.to_string())
        .execute(db)
        .await?;

    Ok(())
}

/// Get the refund intent for a lesson, if any
pub async fn get_intent(db: &SqlitePool, lesson_id: Uuid) -> Result<Option<RefundIntent>> {
    let row = sqlx::query("SELECT * FROM refund_intents WHERE lesson_id = ?")
        .bind(lesson_id.to_string())
        .fetch_optional(db)
        .await?;

    row.map(|r| intent_from_row(&r)).transpose()
}

/// List intents whose ledger call has not yet succeeded
pub async fn list_unsettled(db: &SqlitePool) -> Result<Vec<RefundIntent>> {
    let rows = sqlx::query(
        "SELECT * FROM refund_intents WHERE settled = 0 ORDER BY created_at",
    )
    .fetch_all(db)
    .await?;

    rows.iter().map(intent_from_row).collect()
}

fn intent_from_row(row: &SqliteRow) -> Result<RefundIntent> {
    let lesson_id: String = row.get("lesson_id");
    let payer_id: String = row.get("payer_id");
    let created_at: String = row.get("created_at");

    Ok(RefundIntent {
        lesson_id: Uuid::parse_str(&lesson_id)
            .map_err(|e| Error::Internal(format!("invalid uuid '{}': {}", lesson_id, e)))?,
        payer_id: Uuid::parse_str(&payer_id)
            .map_err(|e| Error::Internal(format!("invalid uuid '{}': {}", payer_id, e)))?,
        credits: row.get("credits"),
        note: row.get("note"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Internal(format!("invalid timestamp '{}': {}", created_at, e)))?,
        settled: row.get::<i64, _>("settled") != 0,
        new_balance: row.get("new_balance"),
        last_error: row.get("last_error"),
    })
}

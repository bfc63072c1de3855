//! Database initialization
//!
//! Creates the LessonLoop schema on first run and opens the shared SQLite
//! pool with WAL enabled for concurrent teacher actions and the sweep job.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer; teacher actions and
    // the escalation sweep overlap routinely
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Set busy timeout so racing conditional updates queue instead of erroring
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed default settings (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_lessons_table(pool).await?;
    create_refund_intents_table(pool).await?;
    create_settings_table(pool).await?;
    super::settings::init_default_settings(pool).await?;
    Ok(())
}

/// Lessons table
///
/// Timestamps are RFC 3339 TEXT in UTC; UUIDs are TEXT. `suggested_times`
/// is a JSON array of timestamps, NULL when the teacher offered none.
async fn create_lessons_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            teacher_name TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            learner_name TEXT NOT NULL,
            payer_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'booked',
            confirmation_status TEXT NOT NULL DEFAULT 'pending',
            confirmation_requested_at TEXT NOT NULL,
            acknowledged_at TEXT,
            declined_at TEXT,
            teacher_message TEXT,
            decline_reason TEXT,
            suggested_times TEXT,
            auto_acknowledged INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Covering index for the sweep's conditional select+update
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_lessons_confirmation
         ON lessons (confirmation_status, status, confirmation_requested_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Refund intents table
///
/// One row per declined lesson (lesson_id is the primary key, which is the
/// duplicate-refund guard). Unsettled rows are the reconciliation queue.
async fn create_refund_intents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS refund_intents (
            lesson_id TEXT PRIMARY KEY,
            payer_id TEXT NOT NULL,
            credits INTEGER NOT NULL,
            note TEXT NOT NULL,
            created_at TEXT NOT NULL,
            settled INTEGER NOT NULL DEFAULT 0,
            new_balance INTEGER,
            last_error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Settings table (key/value, seeded with defaults on first run)
async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

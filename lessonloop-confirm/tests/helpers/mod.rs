//! Shared test fixtures: in-memory database, seeded lessons, and fake
//! ledger/notifier collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lessonloop_common::db::Settings;
use lessonloop_common::{Error, Result};
use lessonloop_confirm::services::credits::CreditLedger;
use lessonloop_confirm::services::notifier::{
    AcknowledgedNotice, AutoAcknowledgedNotice, DeclinedNotice, Notifier,
};
use lessonloop_confirm::services::ConfirmationService;
use lessonloop_confirm::{build_router, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Open an in-memory database with the LessonLoop schema
///
/// Single connection: each in-memory SQLite connection is its own database,
/// so the pool must never hand out a second one.
pub async fn memory_pool() -> SqlitePool {
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

/// Insert a pending, booked lesson whose confirmation clock started at
/// `requested_at`; returns the lesson id
pub async fn seed_lesson(pool: &SqlitePool, requested_at: DateTime<Utc>) -> Uuid {
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

/// Fake credit ledger: records every call, can be switched to fail
pub struct FakeLedger {
    pub calls: Mutex<Vec<(Uuid, i64, String)>>,
    pub fail: AtomicBool,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn failing() -> Arc<Self> {
        let ledger = Self::new();
        ledger.fail.store(true, Ordering::SeqCst);
        ledger
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CreditLedger for FakeLedger {
    async fn add_credits(
        &self,
        payer_id: Uuid,
        amount: i64,
        reference_note: &str,
    ) -> Result<i64> {
        self.calls
            .lock()
            .unwrap()
            .push((payer_id, amount, reference_note.to_string()));

        if self.fail.load(Ordering::SeqCst) {
            Err(Error::CompensationFailed("ledger unavailable".to_string()))
        } else {
            Ok(amount)
        }
    }
}

/// Fake notifier: counts dispatches per notification kind
pub struct FakeNotifier {
    pub acknowledged: AtomicUsize,
    pub declined: AtomicUsize,
    pub auto_acknowledged: AtomicUsize,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            acknowledged: AtomicUsize::new(0),
            declined: AtomicUsize::new(0),
            auto_acknowledged: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn lesson_acknowledged(&self, _notice: AcknowledgedNotice) -> Result<()> {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lesson_declined(&self, _notice: DeclinedNotice) -> Result<()> {
        self.declined.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lesson_auto_acknowledged(&self, _notice: AutoAcknowledgedNotice) -> Result<()> {
        self.auto_acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build the service with default settings and the given fakes
pub fn build_service(
    pool: SqlitePool,
    ledger: Arc<FakeLedger>,
    notifier: Arc<FakeNotifier>,
) -> Arc<ConfirmationService> {
    Arc::new(ConfirmationService::new(
        pool,
        ledger,
        notifier,
        Settings::default(),
    ))
}

/// Build the full router backed by fakes
pub fn build_app(
    pool: SqlitePool,
    ledger: Arc<FakeLedger>,
    notifier: Arc<FakeNotifier>,
) -> axum::Router {
    let service = build_service(pool.clone(), ledger, notifier);
    build_router(AppState::new(pool, service))
}

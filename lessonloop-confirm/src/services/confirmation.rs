//! Lesson confirmation service
//!
//! Owns the three workflow operations: teacher acknowledge, teacher decline
//! (with credit compensation), and the auto-escalation sweep. The state
//! machine guards live in the conditional updates of `db::lessons`; this
//! layer sequences them with the ledger and notifier collaborators.
//!
//! Ordering guarantee on decline: the state transition and the refund
//! intent commit together, then the ledger is called. A ledger failure
//! leaves the lesson declined and the intent unsettled; the teacher's
//! decision is authoritative regardless of refund plumbing.

use chrono::{Duration, Utc};
use lessonloop_common::db::Settings;
use lessonloop_common::models::Lesson;
use lessonloop_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::lessons::{self, SweptLesson};
use crate::db::refunds;
use crate::services::credits::CreditLedger;
use crate::services::notifier::{
    AcknowledgedNotice, AutoAcknowledgedNotice, DeclinedNotice, Notifier,
};

/// Outcome of the compensation call made during a decline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    /// Ledger confirmed the credit is back on the payer's account
    Settled,
    /// Ledger call failed; the intent stays queued for reconciliation
    Pending,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Settled => "settled",
            RefundStatus::Pending => "pending",
        }
    }
}

/// Result of one escalation sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub auto_acknowledged_count: usize,
    pub lessons: Vec<SweptLesson>,
}

/// Confirmation workflow service
///
/// Stateless beyond the injected collaborators; safe to share behind an
/// Arc across concurrent requests and the sweep scheduler.
pub struct ConfirmationService {
    db: SqlitePool,
    ledger: Arc<dyn CreditLedger>,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
}

impl ConfirmationService {
    pub fn new(
        db: SqlitePool,
        ledger: Arc<dyn CreditLedger>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            ledger,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Teacher acknowledges a pending lesson
    pub async fn acknowledge(&self, lesson_id: Uuid, message: Option<String>) -> Result<Lesson> {
        let now = Utc::now();
        let won = lessons::try_acknowledge(&self.db, lesson_id, message.as_deref(), now).await?;

        if !won {
            return Err(self.rejection(lesson_id).await?);
        }

        let lesson = lessons::get_lesson(&self.db, lesson_id).await?;
        info!("Lesson {} acknowledged by teacher {}", lesson_id, lesson.teacher_id);

        let notice = AcknowledgedNotice {
            lesson_id,
            learner_name: lesson.learner_name.clone(),
            teacher_name: lesson.teacher_name.clone(),
            subject: lesson.subject.clone(),
            scheduled_at: lesson.scheduled_at,
            teacher_message: lesson.teacher_message.clone(),
            room_opens_at: lesson.scheduled_at
                - Duration::hours(self.settings.room_open_lead_hours),
        };
        self.dispatch(move |notifier| async move {
            notifier.lesson_acknowledged(notice).await
        });

        Ok(lesson)
    }

    /// Teacher declines a pending lesson
    ///
    /// Cancels the lesson, records the refund intent, then calls the
    /// credit ledger. Returns the lesson plus whether the refund settled.
    pub async fn decline(
        &self,
        lesson_id: Uuid,
        reason: &str,
        suggested_times: Option<Vec<chrono::DateTime<Utc>>>,
    ) -> Result<(Lesson, RefundStatus)> {
        if reason.trim().is_empty() {
            return Err(Error::MissingDeclineReason(format!(
                "decline of lesson {} requires a reason",
                lesson_id
            )));
        }

        let now = Utc::now();
        let won = lessons::try_decline(
            &self.db,
            lesson_id,
            reason,
            suggested_times.as_deref(),
            self.settings.refund_credits,
            now,
        )
        .await?;

        if !won {
            return Err(self.rejection(lesson_id).await?);
        }

        let lesson = lessons::get_lesson(&self.db, lesson_id).await?;
        info!(
            "Lesson {} declined by teacher {}: {}",
            lesson_id, lesson.teacher_id, reason
        );

        let refund_status = self.settle_refund(&lesson).await;

        let notice = DeclinedNotice {
            lesson_id,
            learner_name: lesson.learner_name.clone(),
            teacher_name: lesson.teacher_name.clone(),
            subject: lesson.subject.clone(),
            scheduled_at: lesson.scheduled_at,
            reason: reason.to_string(),
            suggested_times: lesson.suggested_times.clone().unwrap_or_default(),
            refund_status: refund_status.as_str().to_string(),
        };
        self.dispatch(move |notifier| async move { notifier.lesson_declined(notice).await });

        Ok((lesson, refund_status))
    }

    /// Auto-acknowledge every lesson still pending past the timeout
    pub async fn run_sweep(&self) -> Result<SweepOutcome> {
        let now = Utc::now();
        let cutoff = now - Duration::hours(self.settings.acknowledgment_timeout_hours);

        let swept = lessons::sweep_stale(&self.db, cutoff, now).await?;

        if swept.is_empty() {
            info!("Escalation sweep: no stale pending lessons");
        } else {
            info!("Escalation sweep: auto-acknowledged {} lesson(s)", swept.len());
        }

        for lesson in &swept {
            let notice = AutoAcknowledgedNotice {
                lesson_id: lesson.lesson_id,
                learner_name: lesson.learner_name.clone(),
                teacher_name: lesson.teacher_name.clone(),
                subject: lesson.subject.clone(),
                scheduled_at: lesson.scheduled_at,
            };
            self.dispatch(move |notifier| async move {
                notifier.lesson_auto_acknowledged(notice).await
            });
        }

        Ok(SweepOutcome {
            auto_acknowledged_count: swept.len(),
            lessons: swept,
        })
    }

    /// Call the credit ledger for a declined lesson's refund intent
    ///
    /// Failure never propagates: the intent row stays unsettled and is
    /// surfaced through /refunds/unsettled for reconciliation.
    async fn settle_refund(&self, lesson: &Lesson) -> RefundStatus {
        let note = format!("lesson-decline:{}", lesson.id);

        match self
            .ledger
            .add_credits(lesson.payer_id, self.settings.refund_credits, &note)
            .await
        {
            Ok(new_balance) => {
                if let Err(e) = refunds::mark_settled(&self.db, lesson.id, new_balance).await {
                    error!("Failed to mark refund settled for lesson {}: {}", lesson.id, e);
                    return RefundStatus::Pending;
                }
                info!(
                    "Refunded {} credit(s) to payer {} for lesson {} (balance {})",
                    self.settings.refund_credits, lesson.payer_id, lesson.id, new_balance
                );
                RefundStatus::Settled
            }
            Err(e) => {
                error!(
                    "Compensation failed for lesson {} payer {}: {}",
                    lesson.id, lesson.payer_id, e
                );
                if let Err(db_err) =
                    refunds::record_failure(&self.db, lesson.id, &e.to_string()).await
                {
                    error!(
                        "Failed to record refund failure for lesson {}: {}",
                        lesson.id, db_err
                    );
                }
                RefundStatus::Pending
            }
        }
    }

    /// Distinguish NotFound from an already-resolved lesson after a
    /// conditional update affected zero rows
    async fn rejection(&self, lesson_id: Uuid) -> Result<Error> {
        let lesson = lessons::get_lesson(&self.db, lesson_id).await?;
        Ok(Error::InvalidStateTransition(format!(
            "lesson {} is {} ({})",
            lesson_id,
            lesson.confirmation_status.as_str(),
            lesson.status.as_str()
        )))
    }

    /// Fire-and-forget notification dispatch
    fn dispatch<F, Fut>(&self, send: F)
    where
        F: FnOnce(Arc<dyn Notifier>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = send(notifier).await {
                warn!("Notification dispatch failed: {}", e);
            }
        });
    }
}

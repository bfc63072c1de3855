//! Notification dispatcher adapter
//!
//! Fire-and-forget learner notifications. Dispatch failures are logged and
//! never affect the state transition that triggered them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lessonloop_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const NOTIFIER_TIMEOUT_SECS: u64 = 10;

/// Notification sent when the teacher acknowledges a lesson
#[derive(Debug, Clone, Serialize)]
pub struct AcknowledgedNotice {
    pub lesson_id: Uuid,
    pub learner_name: String,
    pub teacher_name: String,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub teacher_message: Option<String>,
    /// When the virtual room opens ahead of the scheduled start
    pub room_opens_at: DateTime<Utc>,
}

/// Notification sent when the teacher declines a lesson
#[derive(Debug, Clone, Serialize)]
pub struct DeclinedNotice {
    pub lesson_id: Uuid,
    pub learner_name: String,
    pub teacher_name: String,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
    pub suggested_times: Vec<DateTime<Utc>>,
    /// "settled" once the credit is back on the account, "pending" while
    /// the refund awaits reconciliation
    pub refund_status: String,
}

/// Notification sent when the sweep auto-acknowledges a stale lesson
#[derive(Debug, Clone, Serialize)]
pub struct AutoAcknowledgedNotice {
    pub lesson_id: Uuid,
    pub learner_name: String,
    pub teacher_name: String,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Notification dispatch operations needed by the confirmation workflow
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn lesson_acknowledged(&self, notice: AcknowledgedNotice) -> Result<()>;
    async fn lesson_declined(&self, notice: DeclinedNotice) -> Result<()>;
    async fn lesson_auto_acknowledged(&self, notice: AutoAcknowledgedNotice) -> Result<()>;
}

/// HTTP client for the hosted notification dispatcher
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFIER_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    async fn post<T: Serialize>(&self, path: &str, payload: &T) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::NotificationFailed(format!("notifier request: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::NotificationFailed(format!(
                "notifier returned {} for {}",
                response.status(),
                path
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn lesson_acknowledged(&self, notice: AcknowledgedNotice) -> Result<()> {
        self.post("/notify/lesson-acknowledged", &notice).await
    }

    async fn lesson_declined(&self, notice: DeclinedNotice) -> Result<()> {
        self.post("/notify/lesson-declined", &notice).await
    }

    async fn lesson_auto_acknowledged(&self, notice: AutoAcknowledgedNotice) -> Result<()> {
        self.post("/notify/lesson-auto-acknowledged", &notice).await
    }
}

/// Log-only notifier used when no dispatcher URL is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn lesson_acknowledged(&self, notice: AcknowledgedNotice) -> Result<()> {
        info!(
            "Lesson {} acknowledged: {} with {} ({}), room opens {}",
            notice.lesson_id,
            notice.learner_name,
            notice.teacher_name,
            notice.subject,
            notice.room_opens_at
        );
        Ok(())
    }

    async fn lesson_declined(&self, notice: DeclinedNotice) -> Result<()> {
        info!(
            "Lesson {} declined by {}: '{}' ({} alternative(s) suggested, refund {})",
            notice.lesson_id,
            notice.teacher_name,
            notice.reason,
            notice.suggested_times.len(),
            notice.refund_status
        );
        Ok(())
    }

    async fn lesson_auto_acknowledged(&self, notice: AutoAcknowledgedNotice) -> Result<()> {
        info!(
            "Lesson {} auto-acknowledged: {} with {} at {}",
            notice.lesson_id,
            notice.learner_name,
            notice.teacher_name,
            notice.scheduled_at
        );
        Ok(())
    }
}
